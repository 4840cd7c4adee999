//! Atomic checkout over the capacity ledger.

use std::sync::Arc;
use std::time::Instant;

use common::{Money, OrderId, UserId};
use store::{Order, OrderStatus, Store, UnitOfWork};

use super::{CreateOrderRequest, OrderDetails};
use crate::clock::{Clock, SystemClock};
use crate::error::BookingError;
use crate::ledger::ReservationContext;
use crate::reservation::{Reservation, ReservationLine};

/// Creates, reads and cancels orders, each inside one unit of work.
pub struct OrderTransaction<S: Store> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: Store> OrderTransaction<S> {
    /// Creates a transaction runner backed by the system clock.
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used to stamp new rows.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Places an order and reserves every line, or nothing at all.
    ///
    /// Lines are reserved items first, then courses, then trips, each group
    /// by resource id. The first failing line aborts the unit, including the
    /// order row, and its error is returned unchanged.
    #[tracing::instrument(skip(self, request), fields(%user_id))]
    pub async fn create_order(
        &self,
        user_id: UserId,
        request: CreateOrderRequest,
    ) -> Result<OrderId, BookingError> {
        let started = Instant::now();
        let result = self.place(user_id, &request).await;
        metrics::histogram!("order_transaction_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(order_id) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(%order_id, total = %request.total, "order created");
            }
            Err(err) => {
                metrics::counter!("order_rejections_total", "kind" => err.kind()).increment(1);
                tracing::warn!(kind = err.kind(), error = %err, "order rejected");
            }
        }
        result
    }

    async fn place(
        &self,
        user_id: UserId,
        request: &CreateOrderRequest,
    ) -> Result<OrderId, BookingError> {
        request.validate()?;

        let now = self.clock.now();
        let order = Order {
            id: OrderId::new(),
            user_id,
            total: request.total,
            status: OrderStatus::Pending,
            payment_ref: request.payment_ref.clone(),
            created_at: now,
        };

        let mut unit = self.store.begin().await?;
        if let Err(err) = unit.insert_order(&order).await {
            return Err(abort(unit, err.into()).await);
        }

        let lines = ReservationLine::from_request(request);
        let line_sum = lines
            .iter()
            .fold(Money::zero(), |sum, line| sum + line.subtotal());
        if line_sum != request.total {
            tracing::debug!(
                total = %request.total,
                %line_sum,
                "order total differs from its lines"
            );
        }

        let ctx = ReservationContext::for_order(user_id, order.id, now);
        for line in lines {
            if let Err(err) = line.reserve(&mut unit, &ctx).await {
                return Err(abort(unit, err).await);
            }
        }

        unit.commit().await?;
        Ok(order.id)
    }

    /// Loads an order with every row it owns.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<OrderDetails, BookingError> {
        let mut unit = self.store.begin().await?;
        let order = unit
            .lock_order(order_id)
            .await?
            .ok_or_else(|| BookingError::not_found("order", order_id))?;
        let lines = unit.order_lines(order_id).await?;
        let enrollments = unit.enrollments_for_order(order_id).await?;
        let trip_bookings = unit.trip_bookings_for_order(order_id).await?;
        unit.rollback().await?;

        Ok(OrderDetails {
            order,
            lines,
            enrollments,
            trip_bookings,
        })
    }

    /// Cancels a pending or paid order, giving back everything it holds.
    ///
    /// Products are restocked, enrollments dropped and trip bookings
    /// cancelled in the same unit that flips the order status.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<Order, BookingError> {
        let mut unit = self.store.begin().await?;
        let mut order = unit
            .lock_order(order_id)
            .await?
            .ok_or_else(|| BookingError::not_found("order", order_id))?;

        if !order.status.can_cancel() {
            return Err(BookingError::Conflict(format!(
                "order cannot be cancelled in {} state",
                order.status
            )));
        }

        // Same lock order as checkout: products, sessions, trips, each by id.
        let mut lines = unit.order_lines(order_id).await?;
        lines.sort_by_key(|line| line.product_id);
        let mut enrollments = unit.enrollments_for_order(order_id).await?;
        enrollments.sort_by_key(|enrollment| enrollment.session_id);
        let mut trip_bookings = unit.trip_bookings_for_order(order_id).await?;
        trip_bookings.sort_by_key(|booking| booking.trip_id);

        let held: Vec<Reservation> = lines
            .into_iter()
            .map(|line| Reservation::Product {
                product_id: line.product_id,
                quantity: line.quantity,
            })
            .chain(enrollments.into_iter().map(Reservation::CourseSeat))
            .chain(trip_bookings.into_iter().map(Reservation::TripSeat))
            .collect();

        for reservation in &held {
            reservation.release(&mut unit).await?;
        }
        unit.update_order_status(order_id, OrderStatus::Cancelled)
            .await?;
        unit.commit().await?;

        order.status = OrderStatus::Cancelled;
        tracing::info!(%order_id, released = held.len(), "order cancelled");
        Ok(order)
    }
}

/// Rolls `unit` back and hands back the error that caused it.
///
/// A failed rollback is only logged; the store discards the unit either way.
async fn abort<U: UnitOfWork>(unit: U, err: BookingError) -> BookingError {
    if let Err(rollback_err) = unit.rollback().await {
        tracing::warn!(error = %rollback_err, "rollback failed");
    }
    err
}
