use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use roomstock_auth::{Principal, Role};
use roomstock_core::UserId;

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

/// Identity of the caller, set by the authentication gateway.
pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
/// Role of the caller: `viewer`, `editor` or `admin`.
pub const PRINCIPAL_ROLE_HEADER: &str = "x-principal-role";

/// Turn the gateway's trusted principal headers into a [`PrincipalContext`].
///
/// Requests without a usable principal never reach a handler.
pub async fn principal_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let principal = extract_principal(req.headers())
        .map_err(|message| json_error(StatusCode::UNAUTHORIZED, "unauthenticated", message))?;

    req.extensions_mut().insert(PrincipalContext::new(principal));

    Ok(next.run(req).await)
}

fn extract_principal(headers: &HeaderMap) -> Result<Principal, String> {
    let id: UserId = header_str(headers, PRINCIPAL_ID_HEADER)?
        .parse()
        .map_err(|_| format!("{PRINCIPAL_ID_HEADER} is not a valid id"))?;

    let role: Role = header_str(headers, PRINCIPAL_ROLE_HEADER)?
        .parse()
        .map_err(|e| format!("{PRINCIPAL_ROLE_HEADER}: {e}"))?;

    Ok(Principal::new(id, role))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, String> {
    let value = headers
        .get(name)
        .ok_or_else(|| format!("missing {name} header"))?
        .to_str()
        .map_err(|_| format!("{name} is not valid ASCII"))?
        .trim();

    if value.is_empty() {
        return Err(format!("missing {name} header"));
    }
    Ok(value)
}
