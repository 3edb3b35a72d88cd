//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Rooms, storage units, compartments and items are entities: two values
/// with the same id are the same thing even when their attributes differ.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
