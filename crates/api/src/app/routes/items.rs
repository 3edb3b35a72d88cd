use std::sync::Arc;

use axum::{
    Json, Router,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use roomstock_auth::Role;
use roomstock_core::ItemId;
use roomstock_infra::InventoryStore;
use roomstock_inventory::{ItemListQuery, ItemPatch, SearchQuery};

use crate::app::errors::{self, ApiResult};
use crate::app::{dto, services::AppServices};
use crate::authz::require_role;
use crate::context::PrincipalContext;

type Services<S> = Extension<Arc<AppServices<S>>>;

pub fn router<S: InventoryStore>() -> Router {
    Router::new()
        .route("/", get(list_items::<S>).post(create_item::<S>))
        .route("/search", get(search_items::<S>))
        .route("/batch-delete", post(batch_delete::<S>))
        .route("/batch-move", post(batch_move::<S>))
        .route(
            "/:id",
            get(get_item::<S>)
                .put(update_item::<S>)
                .delete(delete_item::<S>),
        )
        .route("/:id/move", post(move_item::<S>))
        .route("/:id/history", get(item_history::<S>))
}

fn item_id(path: Result<Path<String>, PathRejection>) -> Result<ItemId, axum::response::Response> {
    errors::parse_id(&errors::path_param(path)?, "item")
}

pub async fn search_items<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult {
    require_role(&principal, Role::Editor)?;
    let query = errors::query_params(query)?;

    let page = services
        .search
        .search(&query)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::OK, Json(page)).into_response())
}

pub async fn list_items<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<ItemListQuery>, QueryRejection>,
) -> ApiResult {
    require_role(&principal, Role::Editor)?;
    let query = errors::query_params(query)?;

    let page = services
        .items
        .list(&query)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::OK, Json(dto::item_page_to_json(page, &query))).into_response())
}

pub async fn create_item<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::CreateItemRequest>, JsonRejection>,
) -> ApiResult {
    require_role(&principal, Role::Editor)?;
    let body = errors::json_body(body)?;

    let item = services
        .items
        .create(body.attrs, body.location)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::CREATED, Json(item)).into_response())
}

pub async fn get_item<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult {
    require_role(&principal, Role::Editor)?;
    let id = item_id(path)?;

    let item = services
        .items
        .get(id)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::OK, Json(item)).into_response())
}

pub async fn update_item<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<ItemPatch>, JsonRejection>,
) -> ApiResult {
    require_role(&principal, Role::Editor)?;
    let id = item_id(path)?;
    let patch = errors::json_body(body)?;

    let item = services
        .items
        .update(id, patch)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::OK, Json(item)).into_response())
}

pub async fn move_item<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<dto::MoveItemRequest>, JsonRejection>,
) -> ApiResult {
    require_role(&principal, Role::Editor)?;
    let id = item_id(path)?;
    let body = errors::json_body(body)?;

    let item = services
        .items
        .move_item(id, body.destination(), principal.user_id(), body.reason)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::OK, Json(item)).into_response())
}

pub async fn delete_item<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult {
    require_role(&principal, Role::Editor)?;
    let id = item_id(path)?;

    services
        .items
        .soft_delete(id)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn item_history<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult {
    require_role(&principal, Role::Editor)?;
    let id = item_id(path)?;

    let movements = services
        .items
        .history(id)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::OK, Json(movements)).into_response())
}

pub async fn batch_delete<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::BatchDeleteRequest>, JsonRejection>,
) -> ApiResult {
    require_role(&principal, Role::Editor)?;
    let body = errors::json_body(body)?;

    let deleted = services
        .items
        .batch_soft_delete(&body.item_ids)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::OK, Json(dto::batch_result_to_json(deleted, false))).into_response())
}

pub async fn batch_move<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::BatchMoveRequest>, JsonRejection>,
) -> ApiResult {
    require_role(&principal, Role::Editor)?;
    let body = errors::json_body(body)?;

    let moved = services
        .items
        .batch_move(
            &body.item_ids,
            body.to_storage_unit_id,
            body.reason,
            principal.user_id(),
        )
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::OK, Json(dto::batch_result_to_json(moved, true))).into_response())
}
