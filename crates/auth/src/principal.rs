use serde::{Deserialize, Serialize};

use roomstock_core::UserId;

use crate::Role;

/// An authenticated principal: who is acting and with which role.
///
/// Token validation happens upstream; by the time a `Principal` exists its
/// identity has been established.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }
}
