//! HTTP API server with observability for the order engine.
//!
//! Exposes catalog, order placement, fulfillment and payment callback
//! endpoints, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use engine::{EngineConfig, InMemoryNotifier, InMemoryPaymentGateway, OrderEngine};
use metrics_exporter_prometheus::PrometheusHandle;
use store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/products", post(routes::products::create::<S>))
        .route(
            "/products/{id}",
            get(routes::products::get::<S>).patch(routes::products::update::<S>),
        )
        .route("/products/{id}/restock", post(routes::products::restock::<S>))
        .route("/orders", post(routes::orders::place::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/track/{tracking}", get(routes::orders::track::<S>))
        .route(
            "/orders/{id}/transitions",
            post(routes::orders::transition::<S>),
        )
        .route("/orders/{id}/return", post(routes::orders::request_return::<S>))
        .route("/orders/{id}/payment", post(routes::orders::record_payment::<S>))
        .route("/users/{id}/orders", get(routes::orders::list_for_user::<S>))
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

/// Creates the application state over `store` with in-memory collaborators.
pub fn create_default_state<S: OrderStore + 'static>(
    store: S,
    config: EngineConfig,
) -> Arc<AppState<S>> {
    let engine = OrderEngine::new(
        store,
        Arc::new(InMemoryNotifier::new()),
        Arc::new(InMemoryPaymentGateway::new()),
        config,
    );
    Arc::new(AppState { engine })
}
