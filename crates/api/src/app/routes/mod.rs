use axum::{Router, routing::get};

use roomstock_infra::InventoryStore;

pub mod compartments;
pub mod items;
pub mod rooms;
pub mod storage_units;
pub mod system;

/// Router for all endpoints that need an authenticated principal.
pub fn router<S: InventoryStore>() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/items", items::router::<S>())
        .nest("/rooms", rooms::router::<S>())
        .nest("/storage-units", storage_units::router::<S>())
        .nest("/compartments", compartments::router::<S>())
}
