//! `roomstock-core`: shared domain building blocks.
//!
//! Identifiers, the domain error model and the small entity/value-object
//! traits used by the inventory domain. No IO lives here.

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CompartmentId, ItemId, MovementId, RoomId, StorageUnitId, UserId};
pub use value_object::ValueObject;
