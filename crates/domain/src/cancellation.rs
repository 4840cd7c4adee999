//! Owner-initiated cancellation of enrollments and trip bookings.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::{EnrollmentId, TripBookingId, UserId};
use store::{
    Enrollment, EnrollmentStatus, Store, TripBooking, TripBookingStatus, UnitOfWork,
};

use crate::clock::{Clock, SystemClock};
use crate::error::BookingError;
use crate::ledger::CapacityLedger;

/// Default notice required before a session starts.
pub const DEFAULT_NOTICE_HOURS: i64 = 24;

/// Minimum notice an owner must give to cancel an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancellationPolicy {
    min_notice: Duration,
}

impl Default for CancellationPolicy {
    fn default() -> Self {
        Self::from_hours(DEFAULT_NOTICE_HOURS)
    }
}

impl CancellationPolicy {
    pub fn new(min_notice: Duration) -> Self {
        Self { min_notice }
    }

    pub fn from_hours(hours: i64) -> Self {
        Self::new(Duration::hours(hours))
    }

    pub fn notice_hours(&self) -> i64 {
        self.min_notice.num_hours()
    }

    /// True when strictly more than the notice window remains before
    /// `starts_at`. Exactly the window is too late.
    pub fn can_cancel(&self, starts_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        starts_at - now > self.min_notice
    }
}

/// Cancels reservations on behalf of their owner.
pub struct CancellationService<S: Store> {
    store: S,
    policy: CancellationPolicy,
    clock: Arc<dyn Clock>,
}

impl<S: Store> CancellationService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            policy: CancellationPolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_policy(mut self, policy: CancellationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &CancellationPolicy {
        &self.policy
    }

    /// Cancels an enrollment, freeing its seat.
    ///
    /// Checks run in order: existence, ownership, terminal status, then the
    /// notice window against the session start.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_enrollment(
        &self,
        enrollment_id: EnrollmentId,
        user_id: UserId,
    ) -> Result<Enrollment, BookingError> {
        let mut unit = self.store.begin().await?;
        let mut enrollment = unit
            .lock_enrollment(enrollment_id)
            .await?
            .ok_or_else(|| BookingError::not_found("enrollment", enrollment_id))?;

        if enrollment.user_id != user_id {
            return Err(BookingError::Authorization(
                "enrollment belongs to another user".to_string(),
            ));
        }

        match enrollment.status {
            EnrollmentStatus::Enrolled => {}
            EnrollmentStatus::Cancelled => {
                return Err(BookingError::Conflict(
                    "enrollment already cancelled".to_string(),
                ));
            }
            EnrollmentStatus::Dropped => {
                return Err(BookingError::Conflict(
                    "enrollment already cancelled (dropped)".to_string(),
                ));
            }
        }

        let session = unit
            .get_session(enrollment.session_id)
            .await?
            .ok_or_else(|| BookingError::not_found("course session", enrollment.session_id))?;
        if !self.policy.can_cancel(session.starts_at, self.clock.now()) {
            return Err(BookingError::Conflict(format!(
                "cannot cancel - starts within {} hours",
                self.policy.notice_hours()
            )));
        }

        CapacityLedger::new(&mut unit)
            .release_session_seat(enrollment_id, EnrollmentStatus::Cancelled)
            .await?;
        unit.commit().await?;

        enrollment.status = EnrollmentStatus::Cancelled;
        metrics::counter!("enrollments_cancelled_total").increment(1);
        tracing::info!(%enrollment_id, session_id = %enrollment.session_id, "enrollment cancelled");
        Ok(enrollment)
    }

    /// Cancels a trip booking, freeing its seat. Trips have no notice window.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_trip_booking(
        &self,
        booking_id: TripBookingId,
        user_id: UserId,
    ) -> Result<TripBooking, BookingError> {
        let mut unit = self.store.begin().await?;
        let mut booking = unit
            .lock_trip_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found("trip booking", booking_id))?;

        if booking.user_id != user_id {
            return Err(BookingError::Authorization(
                "trip booking belongs to another user".to_string(),
            ));
        }

        if !booking.status.is_active() {
            return Err(BookingError::Conflict(
                "trip booking already cancelled".to_string(),
            ));
        }

        CapacityLedger::new(&mut unit)
            .release_trip_seat(booking_id)
            .await?;
        unit.commit().await?;

        booking.status = TripBookingStatus::Cancelled;
        tracing::info!(%booking_id, trip_id = %booking.trip_id, "trip booking cancelled");
        Ok(booking)
    }
}
