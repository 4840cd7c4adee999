use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    EnrollmentId, OrderId, ProductId, RefundId, SessionId, TripBookingId, TripId, UserId,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    CourseSession, Enrollment, EnrollmentStatus, InventoryItem, Order, OrderLine, OrderStatus,
    Refund, RefundStatus, Result, StoreError, Trip, TripBooking, TripBookingStatus,
    store::{Store, UnitOfWork},
};

pub(crate) const ENROLLMENT_UNIQUE_INDEX: &str = "enrollments_one_active_per_user_session";
pub(crate) const TRIP_BOOKING_UNIQUE_INDEX: &str = "trip_bookings_one_confirmed_per_user_trip";
pub(crate) const INVENTORY_CHECK: &str = "inventory_qty_non_negative";

#[derive(Debug, Clone, Default)]
struct MemoryState {
    orders: HashMap<OrderId, Order>,
    order_lines: Vec<OrderLine>,
    inventory: HashMap<ProductId, InventoryItem>,
    sessions: HashMap<SessionId, CourseSession>,
    enrollments: HashMap<EnrollmentId, Enrollment>,
    trips: HashMap<TripId, Trip>,
    trip_bookings: HashMap<TripBookingId, TripBooking>,
    refunds: HashMap<RefundId, Refund>,
}

/// In-memory store implementation for tests and local runs.
///
/// A single writer lock is held for the whole life of a unit, so units
/// never interleave. Writes go to a staged copy of the state that replaces
/// the shared state on commit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    // Catalog seeding. Catalog management lives outside the booking engine,
    // so these bypass units entirely.

    pub async fn add_session(&self, session: CourseSession) {
        self.state
            .lock()
            .await
            .sessions
            .insert(session.id, session);
    }

    pub async fn add_trip(&self, trip: Trip) {
        self.state.lock().await.trips.insert(trip.id, trip);
    }

    pub async fn set_stock(&self, product_id: ProductId, qty_on_hand: i64) {
        self.state.lock().await.inventory.insert(
            product_id,
            InventoryItem {
                product_id,
                qty_on_hand,
            },
        );
    }

    // Inspection helpers

    pub async fn stock(&self, product_id: ProductId) -> Option<i64> {
        self.state
            .lock()
            .await
            .inventory
            .get(&product_id)
            .map(|item| item.qty_on_hand)
    }

    pub async fn order(&self, order_id: OrderId) -> Option<Order> {
        self.state.lock().await.orders.get(&order_id).cloned()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    pub async fn order_line_count(&self) -> usize {
        self.state.lock().await.order_lines.len()
    }

    pub async fn enrollment(&self, enrollment_id: EnrollmentId) -> Option<Enrollment> {
        self.state
            .lock()
            .await
            .enrollments
            .get(&enrollment_id)
            .cloned()
    }

    pub async fn enrollment_count(&self) -> usize {
        self.state.lock().await.enrollments.len()
    }

    pub async fn active_enrollment_count(&self, session_id: SessionId) -> usize {
        self.state
            .lock()
            .await
            .enrollments
            .values()
            .filter(|e| e.session_id == session_id && e.status.is_active())
            .count()
    }

    pub async fn trip_booking(&self, booking_id: TripBookingId) -> Option<TripBooking> {
        self.state
            .lock()
            .await
            .trip_bookings
            .get(&booking_id)
            .cloned()
    }

    pub async fn confirmed_booking_count(&self, trip_id: TripId) -> usize {
        self.state
            .lock()
            .await
            .trip_bookings
            .values()
            .filter(|b| b.trip_id == trip_id && b.status.is_active())
            .count()
    }

    pub async fn refund(&self, refund_id: RefundId) -> Option<Refund> {
        self.state.lock().await.refunds.get(&refund_id).cloned()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Unit = MemoryUnit;

    async fn begin(&self) -> Result<MemoryUnit> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = (*guard).clone();
        Ok(MemoryUnit { guard, staged })
    }
}

/// Atomic unit over an [`InMemoryStore`].
pub struct MemoryUnit {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.staged.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.staged.orders.get(&order_id).cloned())
    }

    async fn update_order_status(&mut self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        if let Some(order) = self.staged.orders.get_mut(&order_id) {
            order.status = status;
        }
        Ok(())
    }

    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<()> {
        self.staged.order_lines.push(line.clone());
        Ok(())
    }

    async fn order_lines(&mut self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        Ok(self
            .staged
            .order_lines
            .iter()
            .filter(|line| line.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn lock_inventory(&mut self, product_id: ProductId) -> Result<Option<InventoryItem>> {
        Ok(self.staged.inventory.get(&product_id).cloned())
    }

    async fn set_inventory_qty(&mut self, product_id: ProductId, qty_on_hand: i64) -> Result<()> {
        if qty_on_hand < 0 {
            return Err(StoreError::CheckViolation {
                constraint: INVENTORY_CHECK.to_string(),
            });
        }
        if let Some(item) = self.staged.inventory.get_mut(&product_id) {
            item.qty_on_hand = qty_on_hand;
        }
        Ok(())
    }

    async fn get_session(&mut self, session_id: SessionId) -> Result<Option<CourseSession>> {
        Ok(self.staged.sessions.get(&session_id).cloned())
    }

    async fn lock_session(&mut self, session_id: SessionId) -> Result<Option<CourseSession>> {
        Ok(self.staged.sessions.get(&session_id).cloned())
    }

    async fn count_active_enrollments(&mut self, session_id: SessionId) -> Result<i64> {
        let count = self
            .staged
            .enrollments
            .values()
            .filter(|e| e.session_id == session_id && e.status.is_active())
            .count();
        Ok(count as i64)
    }

    async fn find_active_enrollment(
        &mut self,
        user_id: UserId,
        session_id: SessionId,
    ) -> Result<Option<Enrollment>> {
        Ok(self
            .staged
            .enrollments
            .values()
            .find(|e| e.user_id == user_id && e.session_id == session_id && e.status.is_active())
            .cloned())
    }

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<()> {
        if enrollment.status.is_active() {
            let duplicate = self.staged.enrollments.values().any(|e| {
                e.user_id == enrollment.user_id
                    && e.session_id == enrollment.session_id
                    && e.status.is_active()
            });
            if duplicate {
                return Err(StoreError::UniqueViolation {
                    constraint: ENROLLMENT_UNIQUE_INDEX.to_string(),
                });
            }
        }
        self.staged
            .enrollments
            .insert(enrollment.id, enrollment.clone());
        Ok(())
    }

    async fn lock_enrollment(
        &mut self,
        enrollment_id: EnrollmentId,
    ) -> Result<Option<Enrollment>> {
        Ok(self.staged.enrollments.get(&enrollment_id).cloned())
    }

    async fn update_enrollment_status(
        &mut self,
        enrollment_id: EnrollmentId,
        status: EnrollmentStatus,
    ) -> Result<()> {
        if let Some(enrollment) = self.staged.enrollments.get_mut(&enrollment_id) {
            enrollment.status = status;
        }
        Ok(())
    }

    async fn enrollments_for_order(&mut self, order_id: OrderId) -> Result<Vec<Enrollment>> {
        let mut enrollments: Vec<_> = self
            .staged
            .enrollments
            .values()
            .filter(|e| e.order_id == Some(order_id))
            .cloned()
            .collect();
        enrollments.sort_by_key(|e| e.created_at);
        Ok(enrollments)
    }

    async fn lock_trip(&mut self, trip_id: TripId) -> Result<Option<Trip>> {
        Ok(self.staged.trips.get(&trip_id).cloned())
    }

    async fn count_confirmed_bookings(&mut self, trip_id: TripId) -> Result<i64> {
        let count = self
            .staged
            .trip_bookings
            .values()
            .filter(|b| b.trip_id == trip_id && b.status.is_active())
            .count();
        Ok(count as i64)
    }

    async fn find_confirmed_booking(
        &mut self,
        user_id: UserId,
        trip_id: TripId,
    ) -> Result<Option<TripBooking>> {
        Ok(self
            .staged
            .trip_bookings
            .values()
            .find(|b| b.user_id == user_id && b.trip_id == trip_id && b.status.is_active())
            .cloned())
    }

    async fn insert_trip_booking(&mut self, booking: &TripBooking) -> Result<()> {
        if booking.status.is_active() {
            let duplicate = self.staged.trip_bookings.values().any(|b| {
                b.user_id == booking.user_id && b.trip_id == booking.trip_id && b.status.is_active()
            });
            if duplicate {
                return Err(StoreError::UniqueViolation {
                    constraint: TRIP_BOOKING_UNIQUE_INDEX.to_string(),
                });
            }
        }
        self.staged
            .trip_bookings
            .insert(booking.id, booking.clone());
        Ok(())
    }

    async fn lock_trip_booking(
        &mut self,
        booking_id: TripBookingId,
    ) -> Result<Option<TripBooking>> {
        Ok(self.staged.trip_bookings.get(&booking_id).cloned())
    }

    async fn update_trip_booking_status(
        &mut self,
        booking_id: TripBookingId,
        status: TripBookingStatus,
    ) -> Result<()> {
        if let Some(booking) = self.staged.trip_bookings.get_mut(&booking_id) {
            booking.status = status;
        }
        Ok(())
    }

    async fn trip_bookings_for_order(&mut self, order_id: OrderId) -> Result<Vec<TripBooking>> {
        let mut bookings: Vec<_> = self
            .staged
            .trip_bookings
            .values()
            .filter(|b| b.order_id == Some(order_id))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }

    async fn insert_refund(&mut self, refund: &Refund) -> Result<()> {
        self.staged.refunds.insert(refund.id, refund.clone());
        Ok(())
    }

    async fn lock_refund(&mut self, refund_id: RefundId) -> Result<Option<Refund>> {
        Ok(self.staged.refunds.get(&refund_id).cloned())
    }

    async fn find_pending_refund(
        &mut self,
        enrollment_id: EnrollmentId,
    ) -> Result<Option<Refund>> {
        Ok(self
            .staged
            .refunds
            .values()
            .find(|r| r.enrollment_id == enrollment_id && r.status.is_pending())
            .cloned())
    }

    async fn update_refund_status(
        &mut self,
        refund_id: RefundId,
        status: RefundStatus,
        processed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if let Some(refund) = self.staged.refunds.get_mut(&refund_id) {
            refund.status = status;
            refund.processed_at = processed_at;
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let MemoryUnit { mut guard, staged } = self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
