//! Course-session enrollment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{EnrollmentId, SessionId};
use serde::Deserialize;
use store::{Enrollment, Store};

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;
use crate::extract::{CurrentUser, JsonBody};

#[derive(Deserialize)]
pub struct EnrollRequest {
    pub session_id: SessionId,
}

/// POST /enrollments: enroll the caller in a session outside any order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    JsonBody(req): JsonBody<EnrollRequest>,
) -> Result<(StatusCode, Json<Enrollment>), ApiError> {
    let enrollment = state.bookings.enroll(user_id, req.session_id).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// POST /enrollments/{id}/cancel: owner cancellation, subject to the notice
/// window.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Enrollment>, ApiError> {
    let enrollment_id: EnrollmentId = parse_id("enrollment", &id)?;
    let enrollment = state
        .cancellations
        .cancel_enrollment(enrollment_id, user_id)
        .await?;
    Ok(Json(enrollment))
}
