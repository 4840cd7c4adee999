use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{EnrollmentId, OrderId, ProductId, RefundId, SessionId, TripBookingId, TripId, UserId};

use crate::{
    CourseSession, Enrollment, EnrollmentStatus, InventoryItem, Order, OrderLine, OrderStatus,
    Refund, RefundStatus, Result, Trip, TripBooking, TripBookingStatus,
};

/// Entry point of a store implementation.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    /// The atomic unit handed out by [`Store::begin`].
    type Unit: UnitOfWork + 'static;

    /// Opens a new atomic unit.
    ///
    /// Units on the same resource rows are serialised: once a unit has
    /// locked a row (see the `lock_*` methods), any other unit locking the
    /// same row waits until the first commits or rolls back.
    async fn begin(&self) -> Result<Self::Unit>;
}

/// A group of reads and writes that commit or roll back together.
///
/// Dropping a unit without calling [`UnitOfWork::commit`] rolls it back.
/// Methods prefixed `lock_` take a row lock held until the unit ends.
#[async_trait]
pub trait UnitOfWork: Send {
    // Orders

    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<Order>>;

    async fn update_order_status(&mut self, order_id: OrderId, status: OrderStatus) -> Result<()>;

    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<()>;

    async fn order_lines(&mut self, order_id: OrderId) -> Result<Vec<OrderLine>>;

    // Inventory

    async fn lock_inventory(&mut self, product_id: ProductId) -> Result<Option<InventoryItem>>;

    /// Overwrites the stock level. Fails with `CheckViolation` if negative.
    async fn set_inventory_qty(&mut self, product_id: ProductId, qty_on_hand: i64) -> Result<()>;

    // Course sessions and enrollments

    async fn get_session(&mut self, session_id: SessionId) -> Result<Option<CourseSession>>;

    async fn lock_session(&mut self, session_id: SessionId) -> Result<Option<CourseSession>>;

    /// Counts enrollments with status `enrolled` for the session.
    async fn count_active_enrollments(&mut self, session_id: SessionId) -> Result<i64>;

    async fn find_active_enrollment(
        &mut self,
        user_id: UserId,
        session_id: SessionId,
    ) -> Result<Option<Enrollment>>;

    /// Fails with `UniqueViolation` if the user already holds an active
    /// enrollment for the session.
    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<()>;

    async fn lock_enrollment(&mut self, enrollment_id: EnrollmentId)
    -> Result<Option<Enrollment>>;

    async fn update_enrollment_status(
        &mut self,
        enrollment_id: EnrollmentId,
        status: EnrollmentStatus,
    ) -> Result<()>;

    async fn enrollments_for_order(&mut self, order_id: OrderId) -> Result<Vec<Enrollment>>;

    // Trips and trip bookings

    async fn lock_trip(&mut self, trip_id: TripId) -> Result<Option<Trip>>;

    /// Counts bookings with status `confirmed` for the trip.
    async fn count_confirmed_bookings(&mut self, trip_id: TripId) -> Result<i64>;

    async fn find_confirmed_booking(
        &mut self,
        user_id: UserId,
        trip_id: TripId,
    ) -> Result<Option<TripBooking>>;

    /// Fails with `UniqueViolation` if the user already holds a confirmed
    /// booking for the trip.
    async fn insert_trip_booking(&mut self, booking: &TripBooking) -> Result<()>;

    async fn lock_trip_booking(&mut self, booking_id: TripBookingId)
    -> Result<Option<TripBooking>>;

    async fn update_trip_booking_status(
        &mut self,
        booking_id: TripBookingId,
        status: TripBookingStatus,
    ) -> Result<()>;

    async fn trip_bookings_for_order(&mut self, order_id: OrderId) -> Result<Vec<TripBooking>>;

    // Refunds

    async fn insert_refund(&mut self, refund: &Refund) -> Result<()>;

    async fn lock_refund(&mut self, refund_id: RefundId) -> Result<Option<Refund>>;

    async fn find_pending_refund(&mut self, enrollment_id: EnrollmentId)
    -> Result<Option<Refund>>;

    async fn update_refund_status(
        &mut self,
        refund_id: RefundId,
        status: RefundStatus,
        processed_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    // Completion

    /// Makes every write of this unit visible to other units.
    async fn commit(self) -> Result<()>;

    /// Discards every write of this unit.
    async fn rollback(self) -> Result<()>;
}
