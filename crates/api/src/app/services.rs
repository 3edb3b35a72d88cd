use std::sync::Arc;

use roomstock_infra::{InventoryStore, ItemRepository, LayoutService, SearchResolver};

/// Services shared by every handler, all backed by the same store.
pub struct AppServices<S> {
    pub items: ItemRepository<S>,
    pub search: SearchResolver<S>,
    pub layout: LayoutService<S>,
}

impl<S: InventoryStore> AppServices<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            items: ItemRepository::new(Arc::clone(&store)),
            search: SearchResolver::new(Arc::clone(&store)),
            layout: LayoutService::new(store),
        }
    }
}
