//! HTTP API server for the dive shop booking engine.
//!
//! Exposes checkout, enrollment, trip booking and refund endpoints, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{
    BookingService, CancellationPolicy, CancellationService, OrderTransaction, RefundWorkflow,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub orders: OrderTransaction<S>,
    pub bookings: BookingService<S>,
    pub cancellations: CancellationService<S>,
    pub refunds: RefundWorkflow<S>,
}

impl<S: Store + Clone> AppState<S> {
    /// Builds every service over clones of one store.
    pub fn new(store: S, policy: CancellationPolicy) -> Self {
        Self {
            orders: OrderTransaction::new(store.clone()),
            bookings: BookingService::new(store.clone()),
            cancellations: CancellationService::new(store.clone()).with_policy(policy),
            refunds: RefundWorkflow::new(store),
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/enrollments", post(routes::enrollments::create::<S>))
        .route(
            "/enrollments/{id}/cancel",
            post(routes::enrollments::cancel::<S>),
        )
        .route("/trip-bookings", post(routes::trip_bookings::create::<S>))
        .route(
            "/trip-bookings/{id}/cancel",
            post(routes::trip_bookings::cancel::<S>),
        )
        .route("/refunds", post(routes::refunds::create::<S>))
        .route("/refunds/{id}/actions", post(routes::refunds::decide::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
