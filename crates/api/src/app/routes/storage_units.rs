use std::sync::Arc;

use axum::{
    Json, Router,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

use roomstock_auth::Role;
use roomstock_core::StorageUnitId;
use roomstock_infra::InventoryStore;
use roomstock_inventory::{NewStorageUnit, StorageUnitPatch};

use crate::app::errors::{self, ApiResult};
use crate::app::{dto, services::AppServices};
use crate::authz::require_role;
use crate::context::PrincipalContext;

type Services<S> = Extension<Arc<AppServices<S>>>;

pub fn router<S: InventoryStore>() -> Router {
    Router::new()
        .route("/", get(list_storage_units::<S>).post(create_storage_unit::<S>))
        .route(
            "/:id",
            get(get_storage_unit::<S>)
                .put(update_storage_unit::<S>)
                .delete(delete_storage_unit::<S>),
        )
        .route("/:id/relocate-items", post(relocate_items::<S>))
}

fn unit_id(
    path: Result<Path<String>, PathRejection>,
) -> Result<StorageUnitId, axum::response::Response> {
    errors::parse_id(&errors::path_param(path)?, "storage unit")
}

pub async fn list_storage_units<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::StorageUnitListQuery>, QueryRejection>,
) -> ApiResult {
    require_role(&principal, Role::Viewer)?;
    let query = errors::query_params(query)?;

    let units = services
        .layout
        .list_storage_units(query.room_id)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::OK, Json(units)).into_response())
}

pub async fn create_storage_unit<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewStorageUnit>, JsonRejection>,
) -> ApiResult {
    require_role(&principal, Role::Editor)?;
    let attrs = errors::json_body(body)?;

    let unit = services
        .layout
        .create_storage_unit(attrs)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::CREATED, Json(unit)).into_response())
}

pub async fn get_storage_unit<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult {
    require_role(&principal, Role::Viewer)?;
    let id = unit_id(path)?;

    let unit = services
        .layout
        .get_storage_unit(id)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::OK, Json(unit)).into_response())
}

pub async fn update_storage_unit<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<StorageUnitPatch>, JsonRejection>,
) -> ApiResult {
    require_role(&principal, Role::Editor)?;
    let id = unit_id(path)?;
    let patch = errors::json_body(body)?;

    let unit = services
        .layout
        .update_storage_unit(id, patch)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::OK, Json(unit)).into_response())
}

pub async fn delete_storage_unit<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult {
    require_role(&principal, Role::Editor)?;
    let id = unit_id(path)?;

    services
        .layout
        .delete_storage_unit(id)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Move every active item placed directly in this unit to another unit.
pub async fn relocate_items<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<dto::RelocateItemsRequest>, JsonRejection>,
) -> ApiResult {
    require_role(&principal, Role::Editor)?;
    let source = unit_id(path)?;
    let body = errors::json_body(body)?;

    let moved = services
        .items
        .bulk_relocate(source, body.to_storage_unit_id, body.reason, principal.user_id())
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::OK, Json(json!({ "moved_count": moved }))).into_response())
}
