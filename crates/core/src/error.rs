//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Deterministic, per-request failures only. Storage and transport failures
/// are modelled by the layers that own them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A referenced item, unit, compartment or room does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A location rule was violated: both/neither reference set, a
    /// relocation whose source equals its destination, or removing a layout
    /// node that still holds active items.
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    /// An attribute failed validation (e.g. negative quantity, empty name).
    #[error("validation failed: {0}")]
    Validation(String),
}

impl DomainError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_location(msg: impl Into<String>) -> Self {
        Self::InvalidLocation(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
