//! Trip booking endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Money, TripBookingId, TripId};
use serde::Deserialize;
use store::{Store, TripBooking};

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;
use crate::extract::{CurrentUser, JsonBody};

#[derive(Deserialize)]
pub struct BookTripRequest {
    pub trip_id: TripId,
    #[serde(default)]
    pub paid_cents: i64,
}

/// POST /trip-bookings
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    JsonBody(req): JsonBody<BookTripRequest>,
) -> Result<(StatusCode, Json<TripBooking>), ApiError> {
    let booking = state
        .bookings
        .book_trip(user_id, req.trip_id, Money::from_cents(req.paid_cents))
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// POST /trip-bookings/{id}/cancel
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<TripBooking>, ApiError> {
    let booking_id: TripBookingId = parse_id("trip booking", &id)?;
    let booking = state
        .cancellations
        .cancel_trip_booking(booking_id, user_id)
        .await?;
    Ok(Json(booking))
}
