//! Refund request and decision endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{EnrollmentId, Money, RefundId};
use domain::RefundAction;
use serde::Deserialize;
use store::{Refund, Store};

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;
use crate::extract::{CurrentUser, JsonBody};

#[derive(Deserialize)]
pub struct RefundRequest {
    pub enrollment_id: EnrollmentId,
    pub amount_cents: i64,
    pub reason: String,
}

#[derive(Deserialize)]
pub struct RefundDecision {
    pub action: RefundAction,
}

/// POST /refunds: the caller asks for a refund of one of their enrollments.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    JsonBody(req): JsonBody<RefundRequest>,
) -> Result<(StatusCode, Json<Refund>), ApiError> {
    let refund = state
        .refunds
        .request_refund(
            user_id,
            req.enrollment_id,
            Money::from_cents(req.amount_cents),
            req.reason,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(refund)))
}

/// POST /refunds/{id}/actions: approve or reject a pending refund.
#[tracing::instrument(skip(state, req))]
pub async fn decide<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<RefundDecision>,
) -> Result<Json<Refund>, ApiError> {
    let refund_id: RefundId = parse_id("refund", &id)?;
    let refund = state.refunds.apply(refund_id, req.action).await?;
    Ok(Json(refund))
}
