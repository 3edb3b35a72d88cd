//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: the inventory services shared by all handlers
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use roomstock_infra::InventoryStore;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router over `store` (public entrypoint used by `main.rs`).
pub fn build_app<S: InventoryStore>(store: Arc<S>) -> Router {
    let services = Arc::new(services::AppServices::new(store));

    // Protected routes: require a principal.
    let protected = routes::router::<S>()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::principal_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
