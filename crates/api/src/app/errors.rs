use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Json, Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use roomstock_core::DomainError;
use roomstock_infra::ServiceError;

/// Handler result: both arms are ready-made responses.
pub type ApiResult = Result<Response, Response>;

pub fn service_error_to_response(err: ServiceError) -> Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::Store(e) => {
            tracing::error!(error = %e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "storage failure")
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> Response {
    let message = err.to_string();
    match err {
        DomainError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::InvalidLocation(_) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_location", message)
        }
        DomainError::Validation(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", message)
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path segment into one of the typed ids.
pub fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, Response> {
    raw.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}

pub fn path_param(path: Result<Path<String>, PathRejection>) -> Result<String, Response> {
    path.map(|Path(raw)| raw)
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_path", e.body_text()))
}

pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|Json(value)| value)
        .map_err(|e| json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_body", e.body_text()))
}

pub fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, Response> {
    query
        .map(|Query(value)| value)
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_query", e.body_text()))
}
