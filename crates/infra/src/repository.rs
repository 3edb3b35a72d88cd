//! Item lifecycle: create, edit, move, soft delete and the movement ledger.
//!
//! Every mutation runs in one store transaction. Moves write the ledger
//! entry and the relocated item row together, so either both land or
//! neither does.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use roomstock_core::{DomainError, ItemId, StorageUnitId, UserId};
use roomstock_inventory::{
    Item, ItemListQuery, ItemMovement, ItemPatch, Location, LocationRef, NewItem,
};

use crate::error::ServiceResult;
use crate::guard::check_location;
use crate::store::{InventoryStore, ItemListFilter, ItemPage, StoreTx};

/// Upper bound on ids accepted by the batch operations.
pub const MAX_BATCH_SIZE: usize = 100;

pub struct ItemRepository<S> {
    store: Arc<S>,
}

impl<S> Clone for ItemRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

fn item_not_found(id: ItemId) -> DomainError {
    DomainError::not_found(format!("item {id}"))
}

/// Reject empty or oversized batches and drop repeated ids, keeping the
/// first occurrence.
fn batch_ids(ids: &[ItemId]) -> Result<Vec<ItemId>, DomainError> {
    if ids.is_empty() || ids.len() > MAX_BATCH_SIZE {
        return Err(DomainError::validation(format!(
            "item_ids must contain between 1 and {MAX_BATCH_SIZE} ids"
        )));
    }
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(*id);
        }
    }
    Ok(unique)
}

impl<S: InventoryStore> ItemRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Insert a new active item. Initial placement is not a move and writes
    /// no ledger entry.
    #[instrument(skip(self, attrs), fields(name = %attrs.name), err)]
    pub async fn create(&self, attrs: NewItem, location: LocationRef) -> ServiceResult<Item> {
        attrs.validate()?;

        let mut tx = self.store.begin().await?;
        let location = check_location(&mut tx, location).await?;
        let item = Item::create(ItemId::new(), attrs, location, Utc::now());
        tx.insert_item(&item).await?;
        tx.commit().await?;

        info!(item_id = %item.id, "item created");
        Ok(item)
    }

    pub async fn get(&self, id: ItemId) -> ServiceResult<Item> {
        self.store
            .get_item(id)
            .await?
            .ok_or_else(|| item_not_found(id).into())
    }

    /// Items placed directly in a unit and/or compartment.
    pub async fn list(&self, query: &ItemListQuery) -> ServiceResult<ItemPage> {
        let window = query.window()?;
        let filter = ItemListFilter {
            storage_unit_id: query.storage_unit_id,
            compartment_id: query.compartment_id,
            status: query.status,
        };
        Ok(self.store.list_items(filter, window).await?)
    }

    /// Apply the attributes present in `patch`. Location and status are
    /// never touched.
    #[instrument(skip(self, patch), fields(item_id = %id), err)]
    pub async fn update(&self, id: ItemId, patch: ItemPatch) -> ServiceResult<Item> {
        patch.validate()?;

        let mut tx = self.store.begin().await?;
        let mut item = tx.lock_item(id).await?.ok_or_else(|| item_not_found(id))?;
        item.apply_patch(patch, Utc::now());
        tx.update_item(&item).await?;
        tx.commit().await?;

        info!("item updated");
        Ok(item)
    }

    /// Relocate one item and record the move.
    ///
    /// The ledger entry's source is the location read under the row lock,
    /// so concurrent moves of the same item cannot lose an update.
    #[instrument(skip(self, reason), fields(item_id = %id, actor = %actor), err)]
    pub async fn move_item(
        &self,
        id: ItemId,
        to: LocationRef,
        actor: UserId,
        reason: Option<String>,
    ) -> ServiceResult<Item> {
        let mut tx = self.store.begin().await?;
        let mut item = tx.lock_item(id).await?.ok_or_else(|| item_not_found(id))?;
        let to = check_location(&mut tx, to).await?;

        relocate_with_ledger(&mut tx, &mut item, to, actor, reason).await?;
        tx.commit().await?;

        info!(to = ?to, "item moved");
        Ok(item)
    }

    /// Mark an item deleted. Its location stays as it was.
    #[instrument(skip(self), fields(item_id = %id), err)]
    pub async fn soft_delete(&self, id: ItemId) -> ServiceResult<Item> {
        let mut tx = self.store.begin().await?;
        let mut item = tx.lock_item(id).await?.ok_or_else(|| item_not_found(id))?;
        item.soft_delete(Utc::now());
        tx.update_item(&item).await?;
        tx.commit().await?;

        info!("item soft-deleted");
        Ok(item)
    }

    /// Move every active item placed directly in `source` into
    /// `destination`, all or nothing. Items in the source's compartments
    /// stay where they are.
    #[instrument(
        skip(self, reason),
        fields(source = %source, destination = %destination, actor = %actor, moved_count = tracing::field::Empty),
        err
    )]
    pub async fn bulk_relocate(
        &self,
        source: StorageUnitId,
        destination: StorageUnitId,
        reason: Option<String>,
        actor: UserId,
    ) -> ServiceResult<u64> {
        if source == destination {
            return Err(DomainError::invalid_location(
                "source and destination storage units must differ",
            )
            .into());
        }

        let mut tx = self.store.begin().await?;
        if tx.get_storage_unit(source).await?.is_none() {
            return Err(DomainError::not_found(format!("storage unit {source}")).into());
        }
        if tx.get_storage_unit(destination).await?.is_none() {
            return Err(DomainError::not_found(format!("storage unit {destination}")).into());
        }

        let items = tx.lock_active_items_in_unit(source).await?;
        let to = Location::StorageUnit(destination);
        let mut moved = 0u64;
        for mut item in items {
            relocate_with_ledger(&mut tx, &mut item, to, actor, reason.clone()).await?;
            moved += 1;
        }
        tx.commit().await?;

        tracing::Span::current().record("moved_count", moved);
        info!(moved_count = moved, "items relocated");
        Ok(moved)
    }

    /// Soft-delete several items at once. Every id must exist or nothing is
    /// written.
    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    pub async fn batch_soft_delete(&self, ids: &[ItemId]) -> ServiceResult<u64> {
        let ids = batch_ids(ids)?;

        let mut tx = self.store.begin().await?;
        let now = Utc::now();
        for id in &ids {
            let mut item = tx.lock_item(*id).await?.ok_or_else(|| item_not_found(*id))?;
            item.soft_delete(now);
            tx.update_item(&item).await?;
        }
        tx.commit().await?;

        info!(deleted_count = ids.len(), "items soft-deleted");
        Ok(ids.len() as u64)
    }

    /// Move several items into one storage unit, all or nothing.
    #[instrument(
        skip(self, ids, reason),
        fields(count = ids.len(), destination = %destination, actor = %actor),
        err
    )]
    pub async fn batch_move(
        &self,
        ids: &[ItemId],
        destination: StorageUnitId,
        reason: Option<String>,
        actor: UserId,
    ) -> ServiceResult<u64> {
        let ids = batch_ids(ids)?;

        let mut tx = self.store.begin().await?;
        let to = check_location(&mut tx, LocationRef::storage_unit(destination)).await?;
        for id in &ids {
            let mut item = tx.lock_item(*id).await?.ok_or_else(|| item_not_found(*id))?;
            relocate_with_ledger(&mut tx, &mut item, to, actor, reason.clone()).await?;
        }
        tx.commit().await?;

        info!(moved_count = ids.len(), "items moved");
        Ok(ids.len() as u64)
    }

    /// Ledger entries for an item, newest first.
    pub async fn history(&self, id: ItemId) -> ServiceResult<Vec<ItemMovement>> {
        if self.store.get_item(id).await?.is_none() {
            return Err(item_not_found(id).into());
        }
        Ok(self.store.movements_for(id).await?)
    }
}

/// Record the move, then relocate and persist the item, inside `tx`.
async fn relocate_with_ledger<T: StoreTx>(
    tx: &mut T,
    item: &mut Item,
    to: Location,
    actor: UserId,
    reason: Option<String>,
) -> ServiceResult<()> {
    let now = Utc::now();
    let movement = ItemMovement::record(item, to, actor, reason, now);
    item.relocate(to, now)?;
    tx.insert_movement(&movement).await?;
    tx.update_item(item).await?;
    Ok(())
}
