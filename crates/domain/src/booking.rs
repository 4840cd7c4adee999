//! Reservations made outside a checkout.

use std::sync::Arc;

use common::{Money, SessionId, TripId, UserId};
use store::{Enrollment, Store, TripBooking, UnitOfWork};

use crate::clock::{Clock, SystemClock};
use crate::error::BookingError;
use crate::ledger::{CapacityLedger, ReservationContext, Utilization};

/// Direct enrollments and trip bookings with no owning order.
///
/// Each call is its own unit of work and follows the same ledger rules as a
/// checkout line.
pub struct BookingService<S: Store> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: Store> BookingService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[tracing::instrument(skip(self))]
    pub async fn enroll(
        &self,
        user_id: UserId,
        session_id: SessionId,
    ) -> Result<Enrollment, BookingError> {
        let ctx = ReservationContext::standalone(user_id, self.clock.now());
        let mut unit = self.store.begin().await?;
        let enrollment = CapacityLedger::new(&mut unit)
            .try_reserve_session(session_id, &ctx)
            .await?;
        unit.commit().await?;

        tracing::info!(enrollment_id = %enrollment.id, "enrolled");
        Ok(enrollment)
    }

    #[tracing::instrument(skip(self))]
    pub async fn book_trip(
        &self,
        user_id: UserId,
        trip_id: TripId,
        paid_amount: Money,
    ) -> Result<TripBooking, BookingError> {
        if paid_amount.is_negative() {
            return Err(BookingError::Validation(
                "paid amount cannot be negative".to_string(),
            ));
        }

        let ctx = ReservationContext::standalone(user_id, self.clock.now());
        let mut unit = self.store.begin().await?;
        let booking = CapacityLedger::new(&mut unit)
            .try_reserve_trip(trip_id, paid_amount, &ctx)
            .await?;
        unit.commit().await?;

        tracing::info!(booking_id = %booking.id, "trip booked");
        Ok(booking)
    }

    pub async fn session_utilization(
        &self,
        session_id: SessionId,
    ) -> Result<Utilization, BookingError> {
        let mut unit = self.store.begin().await?;
        let utilization = CapacityLedger::new(&mut unit)
            .session_utilization(session_id)
            .await?;
        unit.rollback().await?;
        Ok(utilization)
    }

    pub async fn trip_utilization(&self, trip_id: TripId) -> Result<Utilization, BookingError> {
        let mut unit = self.store.begin().await?;
        let utilization = CapacityLedger::new(&mut unit)
            .trip_utilization(trip_id)
            .await?;
        unit.rollback().await?;
        Ok(utilization)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, Utc};
    use common::CourseId;
    use store::{CourseSession, InMemoryStore, Trip};

    use super::*;
    use crate::error::Resource;

    #[tokio::test]
    async fn enroll_fills_a_session_then_reports_capacity() {
        let store = InMemoryStore::new();
        let session_id = SessionId::new();
        store
            .add_session(CourseSession {
                id: session_id,
                course_id: CourseId::new(),
                starts_at: Utc::now() + Duration::days(7),
                capacity: 2,
            })
            .await;
        let bookings = BookingService::new(store.clone());

        let first = bookings.enroll(UserId::new(), session_id).await.unwrap();
        bookings.enroll(UserId::new(), session_id).await.unwrap();
        let err = bookings.enroll(UserId::new(), session_id).await.unwrap_err();

        assert!(first.order_id.is_none());
        assert!(matches!(
            err,
            BookingError::CapacityExceeded {
                resource: Resource::Session,
                available: 0,
                ..
            }
        ));
        let utilization = bookings.session_utilization(session_id).await.unwrap();
        assert_eq!(utilization.used, 2);
        assert!(utilization.is_full());
    }

    #[tokio::test]
    async fn second_enroll_by_same_user_conflicts() {
        let store = InMemoryStore::new();
        let session_id = SessionId::new();
        store
            .add_session(CourseSession {
                id: session_id,
                course_id: CourseId::new(),
                starts_at: Utc::now() + Duration::days(7),
                capacity: 5,
            })
            .await;
        let bookings = BookingService::new(store.clone());
        let user_id = UserId::new();
        bookings.enroll(user_id, session_id).await.unwrap();

        let err = bookings.enroll(user_id, session_id).await.unwrap_err();

        assert_eq!(err.to_string(), "Conflict: already enrolled in this session");
        assert_eq!(store.active_enrollment_count(session_id).await, 1);
    }

    #[tokio::test]
    async fn inactive_trip_is_not_bookable() {
        let store = InMemoryStore::new();
        let trip_id = TripId::new();
        store
            .add_trip(Trip {
                id: trip_id,
                title: "Wreck week".to_string(),
                seats_total: 10,
                starts_on: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
                ends_on: NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
                active: false,
            })
            .await;
        let bookings = BookingService::new(store);

        let err = bookings
            .book_trip(UserId::new(), trip_id, Money::from_cents(100_000))
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::NotFound { entity: "trip", .. }));
    }

    #[tokio::test]
    async fn negative_paid_amount_is_rejected() {
        let bookings = BookingService::new(InMemoryStore::new());
        let err = bookings
            .book_trip(UserId::new(), TripId::new(), Money::from_cents(-5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }
}
