//! API-side role gate.
//!
//! Handlers call [`require_role`] before touching a service; the services
//! themselves stay role-agnostic.

use axum::{http::StatusCode, response::Response};

use roomstock_auth::{Role, authorize};

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

pub fn require_role(principal: &PrincipalContext, required: Role) -> Result<(), Response> {
    authorize(principal.principal(), required)
        .map_err(|e| json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}
