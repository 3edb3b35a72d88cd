//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity and are compared by their attributes. An
/// item's `Location` and a storage unit's `Placement` are value objects: to
/// change one, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
