//! Bookable units within a checkout.

use common::{Money, ProductId, SessionId, TripId};
use serde::{Deserialize, Serialize};
use store::{Enrollment, EnrollmentStatus, OrderLine, TripBooking, UnitOfWork};

use crate::error::BookingError;
use crate::ledger::{CapacityLedger, ReservationContext};
use crate::order::CreateOrderRequest;

/// One bookable unit inside an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationLine {
    /// A quantity of a stocked product.
    Product {
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    },
    /// One seat in a course session.
    CourseSeat { session_id: SessionId, price: Money },
    /// One seat on a trip.
    TripSeat { trip_id: TripId, price: Money },
}

/// What a successful [`ReservationLine::reserve`] claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    Product { product_id: ProductId, quantity: u32 },
    CourseSeat(Enrollment),
    TripSeat(TripBooking),
}

impl ReservationLine {
    /// Flattens a checkout request into lines: items, then courses, then
    /// trips, each group sorted by resource id.
    ///
    /// Reserving takes row locks in this order, so two checkouts touching
    /// the same resources always lock them in the same sequence.
    pub fn from_request(request: &CreateOrderRequest) -> Vec<ReservationLine> {
        let mut items: Vec<_> = request.items.iter().collect();
        items.sort_by_key(|item| item.product_id);
        let mut courses: Vec<_> = request.courses.iter().collect();
        courses.sort_by_key(|course| course.session_id);
        let mut trips: Vec<_> = request.trips.iter().collect();
        trips.sort_by_key(|trip| trip.trip_id);

        let products = items.into_iter().map(|item| ReservationLine::Product {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.price,
        });
        let seats = courses.into_iter().map(|course| ReservationLine::CourseSeat {
            session_id: course.session_id,
            price: course.price,
        });
        let trips = trips.into_iter().map(|trip| ReservationLine::TripSeat {
            trip_id: trip.trip_id,
            price: trip.price,
        });
        products.chain(seats).chain(trips).collect()
    }

    /// Returns the line's contribution to an order total.
    pub fn subtotal(&self) -> Money {
        match self {
            ReservationLine::Product {
                quantity,
                unit_price,
                ..
            } => unit_price.multiply(*quantity),
            ReservationLine::CourseSeat { price, .. } | ReservationLine::TripSeat { price, .. } => {
                *price
            }
        }
    }

    /// Reserves this line against the ledger inside `unit`.
    ///
    /// Product lines also write their immutable order line when the
    /// context names an order.
    pub async fn reserve<U: UnitOfWork>(
        &self,
        unit: &mut U,
        ctx: &ReservationContext,
    ) -> Result<Reservation, BookingError> {
        match self {
            ReservationLine::Product {
                product_id,
                quantity,
                unit_price,
            } => {
                CapacityLedger::new(&mut *unit)
                    .try_reserve_inventory(*product_id, *quantity)
                    .await?;
                if let Some(order_id) = ctx.order_id {
                    unit.insert_order_line(&OrderLine {
                        order_id,
                        product_id: *product_id,
                        quantity: *quantity,
                        unit_price: *unit_price,
                    })
                    .await?;
                }
                Ok(Reservation::Product {
                    product_id: *product_id,
                    quantity: *quantity,
                })
            }
            ReservationLine::CourseSeat { session_id, .. } => {
                let enrollment = CapacityLedger::new(unit)
                    .try_reserve_session(*session_id, ctx)
                    .await?;
                Ok(Reservation::CourseSeat(enrollment))
            }
            ReservationLine::TripSeat { trip_id, price } => {
                let booking = CapacityLedger::new(unit)
                    .try_reserve_trip(*trip_id, *price, ctx)
                    .await?;
                Ok(Reservation::TripSeat(booking))
            }
        }
    }
}

impl Reservation {
    /// Gives the claimed capacity back: restocks products, drops the
    /// enrollment, cancels the trip booking.
    ///
    /// Seats that were already freed are left untouched.
    pub async fn release<U: UnitOfWork>(&self, unit: &mut U) -> Result<(), BookingError> {
        let mut ledger = CapacityLedger::new(unit);
        match self {
            Reservation::Product {
                product_id,
                quantity,
            } => {
                ledger.release_inventory(*product_id, *quantity).await?;
            }
            Reservation::CourseSeat(enrollment) => {
                ledger
                    .release_session_seat(enrollment.id, EnrollmentStatus::Dropped)
                    .await?;
            }
            Reservation::TripSeat(booking) => {
                ledger.release_trip_seat(booking.id).await?;
            }
        }
        Ok(())
    }
}
