use roomstock_auth::{Principal, Role};
use roomstock_core::UserId;

/// Principal context for a request (authenticated identity + role).
///
/// Inserted by the principal middleware; every protected handler can rely
/// on it being present.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn user_id(&self) -> UserId {
        self.principal.id
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
