//! Refund requests and their approve/reject decision.

use std::sync::Arc;

use common::{EnrollmentId, Money, RefundId, UserId};
use serde::{Deserialize, Serialize};
use store::{EnrollmentStatus, Refund, RefundStatus, Store, UnitOfWork};

use crate::clock::{Clock, SystemClock};
use crate::error::BookingError;
use crate::ledger::CapacityLedger;

/// An administrative decision on a pending refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundAction {
    Approve,
    Reject,
}

impl RefundAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundAction::Approve => "approve",
            RefundAction::Reject => "reject",
        }
    }

    fn outcome(&self) -> RefundStatus {
        match self {
            RefundAction::Approve => RefundStatus::Approved,
            RefundAction::Reject => RefundStatus::Rejected,
        }
    }
}

/// Drives refunds from `pending` to `approved` or `rejected`.
///
/// Approval cancels the linked enrollment in the same unit of work; it is
/// the only way a refund touches seat capacity.
pub struct RefundWorkflow<S: Store> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: Store> RefundWorkflow<S> {
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

    /// Opens a pending refund against one of the user's active enrollments.
    #[tracing::instrument(skip(self, reason))]
    pub async fn request_refund(
        &self,
        user_id: UserId,
        enrollment_id: EnrollmentId,
        amount: Money,
        reason: String,
    ) -> Result<Refund, BookingError> {
        if !amount.is_positive() {
            return Err(BookingError::Validation(
                "refund amount must be greater than zero".to_string(),
            ));
        }
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(BookingError::Validation(
                "refund reason is required".to_string(),
            ));
        }

        let mut unit = self.store.begin().await?;
        let enrollment = unit
            .lock_enrollment(enrollment_id)
            .await?
            .ok_or_else(|| BookingError::not_found("enrollment", enrollment_id))?;

        if enrollment.user_id != user_id {
            return Err(BookingError::Authorization(
                "enrollment belongs to another user".to_string(),
            ));
        }
        if !enrollment.status.is_active() {
            return Err(BookingError::Conflict(format!(
                "enrollment is {}",
                enrollment.status
            )));
        }
        if unit.find_pending_refund(enrollment_id).await?.is_some() {
            return Err(BookingError::Conflict(
                "a refund is already pending for this enrollment".to_string(),
            ));
        }

        let session = unit
            .get_session(enrollment.session_id)
            .await?
            .ok_or_else(|| BookingError::not_found("course session", enrollment.session_id))?;

        let refund = Refund {
            id: RefundId::new(),
            user_id,
            enrollment_id,
            course_id: session.course_id,
            amount,
            reason,
            status: RefundStatus::Pending,
            created_at: self.clock.now(),
            processed_at: None,
        };
        unit.insert_refund(&refund).await?;
        unit.commit().await?;

        tracing::info!(refund_id = %refund.id, amount = %refund.amount, "refund requested");
        Ok(refund)
    }

    /// Approves a pending refund and cancels its enrollment.
    pub async fn approve(&self, refund_id: RefundId) -> Result<Refund, BookingError> {
        self.apply(refund_id, RefundAction::Approve).await
    }

    /// Rejects a pending refund. The enrollment is left alone.
    pub async fn reject(&self, refund_id: RefundId) -> Result<Refund, BookingError> {
        self.apply(refund_id, RefundAction::Reject).await
    }

    /// Applies a decision to a pending refund.
    ///
    /// Any refund that already left `pending` is a conflict naming its
    /// current status.
    #[tracing::instrument(skip(self))]
    pub async fn apply(
        &self,
        refund_id: RefundId,
        action: RefundAction,
    ) -> Result<Refund, BookingError> {
        let mut unit = self.store.begin().await?;
        let mut refund = unit
            .lock_refund(refund_id)
            .await?
            .ok_or_else(|| BookingError::not_found("refund", refund_id))?;

        if !refund.status.is_pending() {
            return Err(BookingError::Conflict(format!(
                "refund has already been {}",
                refund.status
            )));
        }

        let now = self.clock.now();
        let status = action.outcome();
        unit.update_refund_status(refund_id, status, Some(now))
            .await?;

        if action == RefundAction::Approve {
            let released = CapacityLedger::new(&mut unit)
                .release_session_seat(refund.enrollment_id, EnrollmentStatus::Cancelled)
                .await?;
            if !released {
                tracing::debug!(enrollment_id = %refund.enrollment_id, "enrollment already terminal");
            }
        }
        unit.commit().await?;

        refund.status = status;
        refund.processed_at = Some(now);
        metrics::counter!("refunds_decided_total", "action" => action.as_str()).increment(1);
        tracing::info!(%refund_id, status = %status, "refund decided");
        Ok(refund)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use common::{CourseId, SessionId};
    use store::{CourseSession, Enrollment, InMemoryStore};

    use super::*;
    use crate::clock::FixedClock;
    use crate::ledger::ReservationContext;

    struct Fixture {
        store: InMemoryStore,
        refunds: RefundWorkflow<InMemoryStore>,
        user_id: UserId,
        course_id: CourseId,
        enrollment: Enrollment,
    }

    async fn fixture() -> Fixture {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap();
        let store = InMemoryStore::new();
        let course_id = CourseId::new();
        let session_id = SessionId::new();
        store
            .add_session(CourseSession {
                id: session_id,
                course_id,
                starts_at: now + Duration::days(14),
                capacity: 6,
            })
            .await;
        let user_id = UserId::new();
        let mut unit = store.begin().await.unwrap();
        let enrollment = CapacityLedger::new(&mut unit)
            .try_reserve_session(session_id, &ReservationContext::standalone(user_id, now))
            .await
            .unwrap();
        unit.commit().await.unwrap();

        let refunds = RefundWorkflow::new(store.clone()).with_clock(Arc::new(FixedClock(now)));
        Fixture {
            store,
            refunds,
            user_id,
            course_id,
            enrollment,
        }
    }

    async fn requested(fx: &Fixture) -> Refund {
        fx.refunds
            .request_refund(
                fx.user_id,
                fx.enrollment.id,
                Money::from_cents(25_000),
                "medical".to_string(),
            )
            .await
            .unwrap()
    }

    #[test]
    fn action_serializes_lowercase() {
        let action: RefundAction = serde_json::from_str(r#""approve""#).unwrap();
        assert_eq!(action, RefundAction::Approve);
        assert_eq!(serde_json::to_string(&RefundAction::Reject).unwrap(), r#""reject""#);
    }

    #[tokio::test]
    async fn request_carries_the_course() {
        let fx = fixture().await;
        let refund = requested(&fx).await;

        assert_eq!(refund.status, RefundStatus::Pending);
        assert_eq!(refund.course_id, fx.course_id);
        assert!(refund.processed_at.is_none());
    }

    #[tokio::test]
    async fn request_validation() {
        let fx = fixture().await;

        let err = fx
            .refunds
            .request_refund(fx.user_id, fx.enrollment.id, Money::zero(), "x".to_string())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");

        let err = fx
            .refunds
            .request_refund(
                fx.user_id,
                fx.enrollment.id,
                Money::from_cents(100),
                "   ".to_string(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");

        let err = fx
            .refunds
            .request_refund(
                UserId::new(),
                fx.enrollment.id,
                Money::from_cents(100),
                "x".to_string(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "authorization");
    }

    #[tokio::test]
    async fn only_one_pending_refund_per_enrollment() {
        let fx = fixture().await;
        requested(&fx).await;

        let err = fx
            .refunds
            .request_refund(
                fx.user_id,
                fx.enrollment.id,
                Money::from_cents(100),
                "again".to_string(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::Conflict(_)));
    }

    #[tokio::test]
    async fn approve_cancels_enrollment_once() {
        let fx = fixture().await;
        let refund = requested(&fx).await;

        let approved = fx.refunds.approve(refund.id).await.unwrap();
        assert_eq!(approved.status, RefundStatus::Approved);
        assert!(approved.processed_at.is_some());
        assert_eq!(
            fx.store.enrollment(fx.enrollment.id).await.unwrap().status,
            EnrollmentStatus::Cancelled
        );

        let err = fx.refunds.approve(refund.id).await.unwrap_err();
        assert_eq!(err.to_string(), "Conflict: refund has already been approved");
        assert_eq!(
            fx.store.refund(refund.id).await.unwrap().status,
            RefundStatus::Approved
        );
    }

    #[tokio::test]
    async fn reject_leaves_enrollment_active() {
        let fx = fixture().await;
        let refund = requested(&fx).await;

        let rejected = fx
            .refunds
            .apply(refund.id, RefundAction::Reject)
            .await
            .unwrap();

        assert_eq!(rejected.status, RefundStatus::Rejected);
        assert_eq!(
            fx.store.enrollment(fx.enrollment.id).await.unwrap().status,
            EnrollmentStatus::Enrolled
        );
        let err = fx.refunds.approve(refund.id).await.unwrap_err();
        assert_eq!(err.to_string(), "Conflict: refund has already been rejected");
    }

    #[tokio::test]
    async fn approve_skips_an_already_cancelled_enrollment() {
        let fx = fixture().await;
        let refund = requested(&fx).await;
        let mut unit = fx.store.begin().await.unwrap();
        unit.update_enrollment_status(fx.enrollment.id, EnrollmentStatus::Dropped)
            .await
            .unwrap();
        unit.commit().await.unwrap();

        fx.refunds.approve(refund.id).await.unwrap();

        assert_eq!(
            fx.store.enrollment(fx.enrollment.id).await.unwrap().status,
            EnrollmentStatus::Dropped
        );
    }

    #[tokio::test]
    async fn processed_refund_cannot_be_decided() {
        let fx = fixture().await;
        let refund = requested(&fx).await;
        let mut unit = fx.store.begin().await.unwrap();
        unit.update_refund_status(refund.id, RefundStatus::Processed, Some(Utc::now()))
            .await
            .unwrap();
        unit.commit().await.unwrap();

        let err = fx.refunds.reject(refund.id).await.unwrap_err();

        assert_eq!(err.to_string(), "Conflict: refund has already been processed");
    }

    #[tokio::test]
    async fn unknown_refund_is_not_found() {
        let fx = fixture().await;
        let err = fx.refunds.approve(RefundId::new()).await.unwrap_err();
        assert!(matches!(err, BookingError::NotFound { entity: "refund", .. }));
    }
}
