//! Capacity decisions for inventory, course-session seats and trip seats.
//!
//! The ledger owns no data. Each decision reads the resource row under a
//! lock, counts the rows that currently occupy it and performs the write,
//! all inside the caller's unit of work, so the check and the act cannot be
//! separated by another writer.

use chrono::{DateTime, Utc};
use common::{EnrollmentId, Money, OrderId, ProductId, SessionId, TripBookingId, TripId, UserId};
use store::{
    Enrollment, EnrollmentStatus, InventoryItem, TripBooking, TripBookingStatus, UnitOfWork,
};

use crate::error::{BookingError, Resource};

/// Who is reserving, for which order (if any), and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationContext {
    pub user_id: UserId,
    pub order_id: Option<OrderId>,
    pub at: DateTime<Utc>,
}

impl ReservationContext {
    /// A reservation made outside any order.
    pub fn standalone(user_id: UserId, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            order_id: None,
            at,
        }
    }

    pub fn for_order(user_id: UserId, order_id: OrderId, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            order_id: Some(order_id),
            at,
        }
    }
}

/// Current use of a seat-limited resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Utilization {
    pub used: i64,
    pub capacity: i64,
}

impl Utilization {
    /// Seats still free. Never negative, even if capacity was lowered below
    /// current use.
    pub fn available(&self) -> i64 {
        (self.capacity - self.used).max(0)
    }

    pub fn is_full(&self) -> bool {
        self.used >= self.capacity
    }
}

/// Read-and-decide view over one unit of work.
pub struct CapacityLedger<'u, U: UnitOfWork> {
    unit: &'u mut U,
}

impl<'u, U: UnitOfWork> CapacityLedger<'u, U> {
    pub fn new(unit: &'u mut U) -> Self {
        Self { unit }
    }

    /// Takes `quantity` units of stock for a product.
    pub async fn try_reserve_inventory(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<InventoryItem, BookingError> {
        let item = self
            .unit
            .lock_inventory(product_id)
            .await?
            .ok_or_else(|| BookingError::not_found("product", product_id))?;

        let requested = i64::from(quantity);
        if item.qty_on_hand < requested {
            return Err(BookingError::CapacityExceeded {
                resource: Resource::Inventory,
                id: product_id.to_string(),
                requested,
                available: item.qty_on_hand,
            });
        }

        let qty_on_hand = item.qty_on_hand - requested;
        self.unit.set_inventory_qty(product_id, qty_on_hand).await?;
        tracing::debug!(%product_id, quantity, qty_on_hand, "inventory reserved");

        Ok(InventoryItem {
            product_id,
            qty_on_hand,
        })
    }

    /// Returns `quantity` units of stock for a product.
    pub async fn release_inventory(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<InventoryItem, BookingError> {
        let item = self
            .unit
            .lock_inventory(product_id)
            .await?
            .ok_or_else(|| BookingError::not_found("product", product_id))?;

        let qty_on_hand = item.qty_on_hand + i64::from(quantity);
        self.unit.set_inventory_qty(product_id, qty_on_hand).await?;
        tracing::debug!(%product_id, quantity, qty_on_hand, "inventory released");

        Ok(InventoryItem {
            product_id,
            qty_on_hand,
        })
    }

    /// Claims one seat in a course session by inserting an active enrollment.
    pub async fn try_reserve_session(
        &mut self,
        session_id: SessionId,
        ctx: &ReservationContext,
    ) -> Result<Enrollment, BookingError> {
        let session = self
            .unit
            .lock_session(session_id)
            .await?
            .ok_or_else(|| BookingError::not_found("course session", session_id))?;

        if self
            .unit
            .find_active_enrollment(ctx.user_id, session_id)
            .await?
            .is_some()
        {
            return Err(BookingError::Conflict(
                "already enrolled in this session".to_string(),
            ));
        }

        let utilization = Utilization {
            used: self.unit.count_active_enrollments(session_id).await?,
            capacity: session.capacity,
        };
        if utilization.is_full() {
            return Err(BookingError::CapacityExceeded {
                resource: Resource::Session,
                id: session_id.to_string(),
                requested: 1,
                available: utilization.available(),
            });
        }

        let enrollment = Enrollment {
            id: EnrollmentId::new(),
            user_id: ctx.user_id,
            session_id,
            order_id: ctx.order_id,
            status: EnrollmentStatus::Enrolled,
            created_at: ctx.at,
        };
        self.unit.insert_enrollment(&enrollment).await?;
        tracing::debug!(
            %session_id,
            enrollment_id = %enrollment.id,
            used = utilization.used + 1,
            capacity = utilization.capacity,
            "session seat reserved"
        );

        Ok(enrollment)
    }

    /// Claims one seat on a trip by inserting a confirmed booking.
    pub async fn try_reserve_trip(
        &mut self,
        trip_id: TripId,
        paid_amount: Money,
        ctx: &ReservationContext,
    ) -> Result<TripBooking, BookingError> {
        let trip = self
            .unit
            .lock_trip(trip_id)
            .await?
            .filter(|trip| trip.active)
            .ok_or_else(|| BookingError::not_found("trip", trip_id))?;

        if self
            .unit
            .find_confirmed_booking(ctx.user_id, trip_id)
            .await?
            .is_some()
        {
            return Err(BookingError::Conflict(
                "already booked on this trip".to_string(),
            ));
        }

        let utilization = Utilization {
            used: self.unit.count_confirmed_bookings(trip_id).await?,
            capacity: trip.seats_total,
        };
        if utilization.is_full() {
            return Err(BookingError::CapacityExceeded {
                resource: Resource::Trip,
                id: trip_id.to_string(),
                requested: 1,
                available: utilization.available(),
            });
        }

        let booking = TripBooking {
            id: TripBookingId::new(),
            user_id: ctx.user_id,
            trip_id,
            order_id: ctx.order_id,
            status: TripBookingStatus::Confirmed,
            paid_amount,
            created_at: ctx.at,
        };
        self.unit.insert_trip_booking(&booking).await?;
        tracing::debug!(
            %trip_id,
            booking_id = %booking.id,
            used = utilization.used + 1,
            capacity = utilization.capacity,
            "trip seat reserved"
        );

        Ok(booking)
    }

    /// Frees the seat held by an enrollment by moving it to `terminal`.
    ///
    /// Returns `false` without writing if the enrollment no longer holds a
    /// seat, so repeated releases never double-count.
    pub async fn release_session_seat(
        &mut self,
        enrollment_id: EnrollmentId,
        terminal: EnrollmentStatus,
    ) -> Result<bool, BookingError> {
        let enrollment = self
            .unit
            .lock_enrollment(enrollment_id)
            .await?
            .ok_or_else(|| BookingError::not_found("enrollment", enrollment_id))?;

        if enrollment.status.is_terminal() {
            return Ok(false);
        }

        self.unit
            .update_enrollment_status(enrollment_id, terminal)
            .await?;
        tracing::debug!(%enrollment_id, session_id = %enrollment.session_id, status = %terminal, "session seat released");
        Ok(true)
    }

    /// Frees the seat held by a trip booking. Returns `false` if it was
    /// already cancelled.
    pub async fn release_trip_seat(
        &mut self,
        booking_id: TripBookingId,
    ) -> Result<bool, BookingError> {
        let booking = self
            .unit
            .lock_trip_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found("trip booking", booking_id))?;

        if !booking.status.is_active() {
            return Ok(false);
        }

        self.unit
            .update_trip_booking_status(booking_id, TripBookingStatus::Cancelled)
            .await?;
        tracing::debug!(%booking_id, trip_id = %booking.trip_id, "trip seat released");
        Ok(true)
    }

    pub async fn session_utilization(
        &mut self,
        session_id: SessionId,
    ) -> Result<Utilization, BookingError> {
        let session = self
            .unit
            .get_session(session_id)
            .await?
            .ok_or_else(|| BookingError::not_found("course session", session_id))?;
        Ok(Utilization {
            used: self.unit.count_active_enrollments(session_id).await?,
            capacity: session.capacity,
        })
    }

    pub async fn trip_utilization(&mut self, trip_id: TripId) -> Result<Utilization, BookingError> {
        let trip = self
            .unit
            .lock_trip(trip_id)
            .await?
            .ok_or_else(|| BookingError::not_found("trip", trip_id))?;
        Ok(Utilization {
            used: self.unit.count_confirmed_bookings(trip_id).await?,
            capacity: trip.seats_total,
        })
    }
}
