//! Item search with location enrichment.

use std::sync::Arc;

use tracing::{debug, instrument};

use roomstock_inventory::search::matches_project;
use roomstock_inventory::{Location, SearchPage, SearchQuery};

use crate::error::ServiceResult;
use crate::store::{InventoryStore, ItemFilter, ProjectMatch, TagScope};

/// Searches items and resolves where each hit lives.
///
/// Project tags are matched in the store when it can substring-match inside
/// a list. Otherwise the tags of every item in scope are loaded and matched
/// here, and the matching ids are handed back to the store so they are
/// counted and paginated together with the column matches.
pub struct SearchResolver<S> {
    store: Arc<S>,
}

impl<S> Clone for SearchResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: InventoryStore> SearchResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, query), fields(status = %query.status, limit = query.limit, offset = query.offset), err)]
    pub async fn search(&self, query: &SearchQuery) -> ServiceResult<SearchPage> {
        let page = query.page()?;
        let needle = query.needle();

        let projects = match needle {
            None => ProjectMatch::None,
            Some(_) if self.store.supports_structured_substring_match() => ProjectMatch::InQuery,
            Some(needle) => {
                // TODO: index project tags so this does not scan every tagged item per search.
                let tagged = self
                    .store
                    .tagged_items(TagScope {
                        room_id: query.room_id,
                        storage_unit_id: query.storage_unit_id,
                        status: query.status,
                    })
                    .await?;
                let scanned = tagged.len();
                let ids: Vec<_> = tagged
                    .into_iter()
                    .filter(|(_, tags)| matches_project(tags, needle))
                    .map(|(id, _)| id)
                    .collect();
                debug!(scanned, matched = ids.len(), "project tags matched in memory");
                ProjectMatch::Ids(ids)
            }
        };

        let filter = ItemFilter {
            text: needle.map(str::to_owned),
            room_id: query.room_id,
            storage_unit_id: query.storage_unit_id,
            status: query.status,
            projects,
        };
        let found = self.store.search_items(&filter, page).await?;

        let locations: Vec<Location> = found.items.iter().map(|item| item.location).collect();
        let placements = self.store.resolve_placements(&locations).await?;
        let items = found
            .items
            .into_iter()
            .map(|item| {
                placements
                    .get(&item.location)
                    .cloned()
                    .unwrap_or_default()
                    .into_hit(item)
            })
            .collect();

        Ok(SearchPage {
            items,
            total: found.total,
            limit: page.limit,
            offset: page.offset,
        })
    }
}
