use thiserror::Error;

use crate::{Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("requires {required} role or higher (have {actual})")]
    Forbidden { required: Role, actual: Role },

    #[error("unknown role '{0}'")]
    UnknownRole(String),
}

/// Check that `principal` holds `required` or a higher role.
///
/// Pure policy check: no IO, no panics.
pub fn authorize(principal: &Principal, required: Role) -> Result<(), AuthzError> {
    if principal.role.grants(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden {
            required,
            actual: principal.role,
        })
    }
}
