use std::collections::HashMap;

use thiserror::Error;

use roomstock_core::{CompartmentId, ItemId, RoomId, StorageUnitId};
use roomstock_inventory::search::{Page, Window};
use roomstock_inventory::{
    Compartment, Item, ItemMovement, ItemStatus, Location, ResolvedPlacement, Room, StorageUnit,
};

/// Storage-level failure.
///
/// These are infrastructure errors (connectivity, constraint violations,
/// undecodable rows) as opposed to domain errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error in {operation}: {message}")]
    Database { operation: String, message: String },

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// How project tags take part in a text search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProjectMatch {
    /// Tags are not consulted.
    #[default]
    None,
    /// The store matches tags against the search text itself.
    InQuery,
    /// Tags were matched by the caller; these items match regardless of
    /// the other text columns.
    Ids(Vec<ItemId>),
}

/// Store-level search filter. Text is a raw substring; the store decides
/// how to match it case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    pub text: Option<String>,
    pub room_id: Option<RoomId>,
    pub storage_unit_id: Option<StorageUnitId>,
    pub status: ItemStatus,
    pub projects: ProjectMatch,
}

/// Scope for loading project tags when the store cannot match inside them.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TagScope {
    pub room_id: Option<RoomId>,
    pub storage_unit_id: Option<StorageUnitId>,
    pub status: ItemStatus,
}

/// Exact-placement listing filter.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ItemListFilter {
    pub storage_unit_id: Option<StorageUnitId>,
    pub compartment_id: Option<CompartmentId>,
    pub status: ItemStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPage {
    pub items: Vec<Item>,
    pub total: u64,
}

/// A node of the layout tree together with everything beneath it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LayoutScope {
    Room(RoomId),
    StorageUnit(StorageUnitId),
    Compartment(CompartmentId),
}

/// Persistent inventory state.
///
/// Reads go straight to the store. Every mutation runs inside a [`StoreTx`]
/// obtained from [`InventoryStore::begin`].
#[async_trait::async_trait]
pub trait InventoryStore: Send + Sync + 'static {
    type Tx: StoreTx;

    /// Whether the store can substring-match inside an item's project tags
    /// as part of a query. When `false` the caller matches tags itself.
    fn supports_structured_substring_match(&self) -> bool;

    async fn begin(&self) -> StoreResult<Self::Tx>;

    async fn get_item(&self, id: ItemId) -> StoreResult<Option<Item>>;

    /// Items ordered by name, ties by insertion order. `total` counts the
    /// whole filtered set regardless of the window.
    async fn list_items(&self, filter: ItemListFilter, window: Window)
    -> StoreResult<ItemPage>;

    /// Items matching `filter`, ordered by name, ties by insertion order.
    async fn search_items(&self, filter: &ItemFilter, page: Page) -> StoreResult<ItemPage>;

    /// Ids and tags of every item in scope with a non-empty project list.
    async fn tagged_items(&self, scope: TagScope) -> StoreResult<Vec<(ItemId, Vec<String>)>>;

    /// Resolve each location to its compartment, effective storage unit and
    /// room. Locations whose rows no longer exist resolve to what remains.
    async fn resolve_placements(
        &self,
        locations: &[Location],
    ) -> StoreResult<HashMap<Location, ResolvedPlacement>>;

    /// Ledger entries for an item, newest first.
    async fn movements_for(&self, item_id: ItemId) -> StoreResult<Vec<ItemMovement>>;

    async fn get_room(&self, id: RoomId) -> StoreResult<Option<Room>>;

    async fn list_rooms(&self) -> StoreResult<Vec<Room>>;

    async fn get_storage_unit(&self, id: StorageUnitId) -> StoreResult<Option<StorageUnit>>;

    async fn list_storage_units(&self, room_id: Option<RoomId>) -> StoreResult<Vec<StorageUnit>>;

    async fn get_compartment(&self, id: CompartmentId) -> StoreResult<Option<Compartment>>;

    async fn list_compartments(
        &self,
        storage_unit_id: Option<StorageUnitId>,
    ) -> StoreResult<Vec<Compartment>>;
}

/// A unit of work. Dropping it without [`StoreTx::commit`] rolls back.
#[async_trait::async_trait]
pub trait StoreTx: Send + Sized {
    /// Load an item and hold it against concurrent writers until commit.
    async fn lock_item(&mut self, id: ItemId) -> StoreResult<Option<Item>>;

    /// Active items placed directly in `unit` (not in its compartments),
    /// locked like [`StoreTx::lock_item`].
    async fn lock_active_items_in_unit(&mut self, unit: StorageUnitId) -> StoreResult<Vec<Item>>;

    // Layout rows read through a transaction stay key-locked until it ends,
    // so a concurrent delete of the node waits for the reader.

    async fn get_room(&mut self, id: RoomId) -> StoreResult<Option<Room>>;

    async fn get_storage_unit(&mut self, id: StorageUnitId) -> StoreResult<Option<StorageUnit>>;

    async fn get_compartment(&mut self, id: CompartmentId) -> StoreResult<Option<Compartment>>;

    /// Lock the node at `scope` and every layout row beneath it for deletion.
    /// Waits out transactions that read any of them; `false` if the node is
    /// gone.
    async fn lock_layout(&mut self, scope: LayoutScope) -> StoreResult<bool>;

    async fn insert_item(&mut self, item: &Item) -> StoreResult<()>;

    /// Overwrite every column of an existing item row.
    async fn update_item(&mut self, item: &Item) -> StoreResult<()>;

    async fn insert_movement(&mut self, movement: &ItemMovement) -> StoreResult<()>;

    /// Active items anywhere under `scope`.
    async fn count_active_items(&mut self, scope: LayoutScope) -> StoreResult<u64>;

    /// Hard-delete soft-deleted items anywhere under `scope`. Movement rows
    /// are kept.
    async fn purge_deleted_items(&mut self, scope: LayoutScope) -> StoreResult<u64>;

    async fn insert_room(&mut self, room: &Room) -> StoreResult<()>;

    async fn update_room(&mut self, room: &Room) -> StoreResult<()>;

    async fn insert_storage_unit(&mut self, unit: &StorageUnit) -> StoreResult<()>;

    async fn update_storage_unit(&mut self, unit: &StorageUnit) -> StoreResult<()>;

    async fn insert_compartment(&mut self, compartment: &Compartment) -> StoreResult<()>;

    async fn update_compartment(&mut self, compartment: &Compartment) -> StoreResult<()>;

    /// Delete a layout node and, by cascade, everything beneath it.
    /// Items must have been removed from the subtree first.
    async fn delete_layout(&mut self, scope: LayoutScope) -> StoreResult<()>;

    async fn commit(self) -> StoreResult<()>;

    async fn rollback(self) -> StoreResult<()>;
}
