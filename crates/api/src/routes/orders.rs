//! Checkout endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::OrderId;
use domain::{CreateOrderRequest, OrderDetails};
use serde::Serialize;
use store::{Order, Store};

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;
use crate::extract::{CurrentUser, JsonBody};

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    pub order_id: String,
    pub status: String,
}

/// POST /orders: place an order for products, course seats and trip seats.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    JsonBody(req): JsonBody<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let order_id = state.orders.create_order(user_id, req).await?;

    let response = OrderCreatedResponse {
        order_id: order_id.to_string(),
        status: "pending".to_string(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /orders/{id}: the order with its lines, enrollments and trip bookings.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderDetails>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let details = state.orders.get_order(order_id).await?;
    Ok(Json(details))
}

/// POST /orders/{id}/cancel: administrative cancellation of a pending or
/// paid order.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let order = state.orders.cancel_order(order_id).await?;
    Ok(Json(order))
}
