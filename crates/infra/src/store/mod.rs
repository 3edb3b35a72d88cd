//! Persistence boundary for rooms, storage units, compartments, items and
//! the movement ledger.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryInventoryStore, InMemoryTx};
pub use postgres::{PostgresInventoryStore, PostgresTx};
pub use r#trait::{
    InventoryStore, ItemFilter, ItemListFilter, ItemPage, LayoutScope, ProjectMatch, StoreError,
    StoreResult, StoreTx, TagScope,
};
