use std::sync::Arc;

use axum::{
    Json, Router,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use roomstock_auth::Role;
use roomstock_core::CompartmentId;
use roomstock_infra::InventoryStore;
use roomstock_inventory::{CompartmentPatch, NewCompartment};

use crate::app::errors::{self, ApiResult};
use crate::app::{dto, services::AppServices};
use crate::authz::require_role;
use crate::context::PrincipalContext;

type Services<S> = Extension<Arc<AppServices<S>>>;

pub fn router<S: InventoryStore>() -> Router {
    Router::new()
        .route("/", get(list_compartments::<S>).post(create_compartment::<S>))
        .route(
            "/:id",
            get(get_compartment::<S>)
                .put(update_compartment::<S>)
                .delete(delete_compartment::<S>),
        )
}

fn compartment_id(
    path: Result<Path<String>, PathRejection>,
) -> Result<CompartmentId, axum::response::Response> {
    errors::parse_id(&errors::path_param(path)?, "compartment")
}

pub async fn list_compartments<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::CompartmentListQuery>, QueryRejection>,
) -> ApiResult {
    require_role(&principal, Role::Viewer)?;
    let query = errors::query_params(query)?;

    let compartments = services
        .layout
        .list_compartments(query.storage_unit_id)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::OK, Json(compartments)).into_response())
}

pub async fn create_compartment<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewCompartment>, JsonRejection>,
) -> ApiResult {
    require_role(&principal, Role::Editor)?;
    let attrs = errors::json_body(body)?;

    let compartment = services
        .layout
        .create_compartment(attrs)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::CREATED, Json(compartment)).into_response())
}

pub async fn get_compartment<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult {
    require_role(&principal, Role::Viewer)?;
    let id = compartment_id(path)?;

    let compartment = services
        .layout
        .get_compartment(id)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::OK, Json(compartment)).into_response())
}

pub async fn update_compartment<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<CompartmentPatch>, JsonRejection>,
) -> ApiResult {
    require_role(&principal, Role::Editor)?;
    let id = compartment_id(path)?;
    let patch = errors::json_body(body)?;

    let compartment = services
        .layout
        .update_compartment(id, patch)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::OK, Json(compartment)).into_response())
}

pub async fn delete_compartment<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult {
    require_role(&principal, Role::Admin)?;
    let id = compartment_id(path)?;

    services
        .layout
        .delete_compartment(id)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
