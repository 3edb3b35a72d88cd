//! `roomstock-auth`: role-based authorization boundary.
//!
//! Decoupled from HTTP and storage: callers hand in an already
//! authenticated [`Principal`] and ask whether it may act.

pub mod authorize;
pub mod principal;
pub mod roles;

pub use authorize::{authorize, AuthzError};
pub use principal::Principal;
pub use roles::Role;
