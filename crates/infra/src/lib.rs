//! Infrastructure layer: storage adapters, configuration and the inventory
//! services built on them.

pub mod config;
pub mod error;
pub mod guard;
pub mod layout;
pub mod repository;
pub mod search;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use error::{ServiceError, ServiceResult};
pub use layout::LayoutService;
pub use repository::ItemRepository;
pub use search::SearchResolver;
pub use store::{InMemoryInventoryStore, InventoryStore, PostgresInventoryStore, StoreError};
