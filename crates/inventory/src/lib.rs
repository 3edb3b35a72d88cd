//! Inventory domain: rooms, storage units, compartments and the items placed
//! in them.
//!
//! Pure domain logic (no IO, no HTTP, no storage). The infrastructure crate
//! persists these types and enforces the cross-row rules that need a store.

pub mod item;
pub mod layout;
pub mod location;
pub mod movement;
pub mod search;

mod serde_ext;

pub use item::{Item, ItemPatch, ItemStatus, NewItem};
pub use layout::{
    Compartment, CompartmentPatch, NewCompartment, NewRoom, NewStorageUnit, Placement, Room,
    RoomPatch, StorageUnit, StorageUnitPatch, StorageUnitType,
};
pub use location::{Location, LocationRef};
pub use movement::ItemMovement;
pub use search::{
    ItemListQuery, Page, ResolvedPlacement, SearchHit, SearchPage, SearchQuery, Window,
};
