use std::sync::Arc;

use axum::{
    Json, Router,
    extract::rejection::{JsonRejection, PathRejection},
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use roomstock_auth::Role;
use roomstock_core::RoomId;
use roomstock_infra::InventoryStore;
use roomstock_inventory::{NewRoom, RoomPatch};

use crate::app::errors::{self, ApiResult};
use crate::app::{dto, services::AppServices};
use crate::authz::require_role;
use crate::context::PrincipalContext;

type Services<S> = Extension<Arc<AppServices<S>>>;

pub fn router<S: InventoryStore>() -> Router {
    Router::new()
        .route("/", get(list_rooms::<S>).post(create_room::<S>))
        .route(
            "/:id",
            get(get_room::<S>)
                .put(update_room::<S>)
                .delete(delete_room::<S>),
        )
}

fn room_id(path: Result<Path<String>, PathRejection>) -> Result<RoomId, axum::response::Response> {
    errors::parse_id(&errors::path_param(path)?, "room")
}

pub async fn list_rooms<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    require_role(&principal, Role::Viewer)?;

    let rooms = services
        .layout
        .list_rooms()
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::OK, Json(rooms)).into_response())
}

pub async fn create_room<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewRoom>, JsonRejection>,
) -> ApiResult {
    require_role(&principal, Role::Editor)?;
    let attrs = errors::json_body(body)?;

    let room = services
        .layout
        .create_room(attrs)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::CREATED, Json(room)).into_response())
}

pub async fn get_room<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult {
    require_role(&principal, Role::Viewer)?;
    let id = room_id(path)?;

    let room = services
        .layout
        .get_room(id)
        .await
        .map_err(errors::service_error_to_response)?;
    let storage_units = services
        .layout
        .list_storage_units(Some(id))
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::OK, Json(dto::RoomWithUnits { room, storage_units })).into_response())
}

pub async fn update_room<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<RoomPatch>, JsonRejection>,
) -> ApiResult {
    require_role(&principal, Role::Editor)?;
    let id = room_id(path)?;
    let patch = errors::json_body(body)?;

    let room = services
        .layout
        .update_room(id, patch)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok((StatusCode::OK, Json(room)).into_response())
}

pub async fn delete_room<S: InventoryStore>(
    Extension(services): Services<S>,
    Extension(principal): Extension<PrincipalContext>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult {
    require_role(&principal, Role::Admin)?;
    let id = room_id(path)?;

    services
        .layout
        .delete_room(id)
        .await
        .map_err(errors::service_error_to_response)?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
