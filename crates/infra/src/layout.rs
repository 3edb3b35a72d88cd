//! Rooms, storage units and compartments.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use roomstock_core::{CompartmentId, DomainError, RoomId, StorageUnitId};
use roomstock_inventory::{
    Compartment, CompartmentPatch, NewCompartment, NewRoom, NewStorageUnit, Room, RoomPatch,
    StorageUnit, StorageUnitPatch,
};

use crate::error::ServiceResult;
use crate::store::{InventoryStore, LayoutScope, StoreTx};

pub struct LayoutService<S> {
    store: Arc<S>,
}

impl<S> Clone for LayoutService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

fn describe(scope: LayoutScope) -> String {
    match scope {
        LayoutScope::Room(id) => format!("room {id}"),
        LayoutScope::StorageUnit(id) => format!("storage unit {id}"),
        LayoutScope::Compartment(id) => format!("compartment {id}"),
    }
}

impl<S: InventoryStore> LayoutService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    // Rooms

    #[instrument(skip(self, attrs), fields(name = %attrs.name), err)]
    pub async fn create_room(&self, attrs: NewRoom) -> ServiceResult<Room> {
        attrs.validate()?;
        let room = Room::create(attrs, Utc::now());

        let mut tx = self.store.begin().await?;
        tx.insert_room(&room).await?;
        tx.commit().await?;

        info!(room_id = %room.id, "room created");
        Ok(room)
    }

    pub async fn get_room(&self, id: RoomId) -> ServiceResult<Room> {
        self.store
            .get_room(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("room {id}")).into())
    }

    pub async fn list_rooms(&self) -> ServiceResult<Vec<Room>> {
        Ok(self.store.list_rooms().await?)
    }

    #[instrument(skip(self, patch), fields(room_id = %id), err)]
    pub async fn update_room(&self, id: RoomId, patch: RoomPatch) -> ServiceResult<Room> {
        patch.validate()?;

        let mut tx = self.store.begin().await?;
        let mut room = tx
            .get_room(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("room {id}")))?;
        room.apply_patch(patch, Utc::now());
        tx.update_room(&room).await?;
        tx.commit().await?;
        Ok(room)
    }

    /// Delete a room with its units and compartments. Returns the number of
    /// soft-deleted items purged with it.
    pub async fn delete_room(&self, id: RoomId) -> ServiceResult<u64> {
        self.delete_subtree(LayoutScope::Room(id)).await
    }

    // Storage units

    #[instrument(skip(self, attrs), fields(room_id = %attrs.room_id, label = %attrs.label), err)]
    pub async fn create_storage_unit(&self, attrs: NewStorageUnit) -> ServiceResult<StorageUnit> {
        attrs.validate()?;

        let mut tx = self.store.begin().await?;
        if tx.get_room(attrs.room_id).await?.is_none() {
            return Err(DomainError::not_found(format!("room {}", attrs.room_id)).into());
        }
        let unit = StorageUnit::create(attrs, Utc::now());
        tx.insert_storage_unit(&unit).await?;
        tx.commit().await?;

        info!(storage_unit_id = %unit.id, "storage unit created");
        Ok(unit)
    }

    pub async fn get_storage_unit(&self, id: StorageUnitId) -> ServiceResult<StorageUnit> {
        self.store
            .get_storage_unit(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("storage unit {id}")).into())
    }

    pub async fn list_storage_units(&self, room_id: Option<RoomId>) -> ServiceResult<Vec<StorageUnit>> {
        Ok(self.store.list_storage_units(room_id).await?)
    }

    #[instrument(skip(self, patch), fields(storage_unit_id = %id), err)]
    pub async fn update_storage_unit(
        &self,
        id: StorageUnitId,
        patch: StorageUnitPatch,
    ) -> ServiceResult<StorageUnit> {
        let mut tx = self.store.begin().await?;
        let mut unit = tx
            .get_storage_unit(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("storage unit {id}")))?;
        patch.validate(&unit)?;
        unit.apply_patch(patch, Utc::now());
        tx.update_storage_unit(&unit).await?;
        tx.commit().await?;
        Ok(unit)
    }

    /// Blocked while any active item sits in the unit or its compartments.
    pub async fn delete_storage_unit(&self, id: StorageUnitId) -> ServiceResult<u64> {
        self.delete_subtree(LayoutScope::StorageUnit(id)).await
    }

    // Compartments

    #[instrument(skip(self, attrs), fields(storage_unit_id = %attrs.storage_unit_id, name = %attrs.name), err)]
    pub async fn create_compartment(&self, attrs: NewCompartment) -> ServiceResult<Compartment> {
        attrs.validate()?;

        let mut tx = self.store.begin().await?;
        if tx.get_storage_unit(attrs.storage_unit_id).await?.is_none() {
            return Err(
                DomainError::not_found(format!("storage unit {}", attrs.storage_unit_id)).into(),
            );
        }
        let compartment = Compartment::create(attrs, Utc::now());
        tx.insert_compartment(&compartment).await?;
        tx.commit().await?;

        info!(compartment_id = %compartment.id, "compartment created");
        Ok(compartment)
    }

    pub async fn get_compartment(&self, id: CompartmentId) -> ServiceResult<Compartment> {
        self.store
            .get_compartment(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("compartment {id}")).into())
    }

    pub async fn list_compartments(
        &self,
        storage_unit_id: Option<StorageUnitId>,
    ) -> ServiceResult<Vec<Compartment>> {
        Ok(self.store.list_compartments(storage_unit_id).await?)
    }

    #[instrument(skip(self, patch), fields(compartment_id = %id), err)]
    pub async fn update_compartment(
        &self,
        id: CompartmentId,
        patch: CompartmentPatch,
    ) -> ServiceResult<Compartment> {
        patch.validate()?;

        let mut tx = self.store.begin().await?;
        let mut compartment = tx
            .get_compartment(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("compartment {id}")))?;
        compartment.apply_patch(patch, Utc::now());
        tx.update_compartment(&compartment).await?;
        tx.commit().await?;
        Ok(compartment)
    }

    pub async fn delete_compartment(&self, id: CompartmentId) -> ServiceResult<u64> {
        self.delete_subtree(LayoutScope::Compartment(id)).await
    }

    /// Refuse while active items remain under `scope`; otherwise purge the
    /// soft-deleted ones and delete the node, in one transaction.
    #[instrument(skip(self), fields(purged = tracing::field::Empty), err)]
    async fn delete_subtree(&self, scope: LayoutScope) -> ServiceResult<u64> {
        let what = describe(scope);

        let mut tx = self.store.begin().await?;
        if !tx.lock_layout(scope).await? {
            tx.rollback().await?;
            return Err(DomainError::not_found(what).into());
        }

        let active = tx.count_active_items(scope).await?;
        if active > 0 {
            tx.rollback().await?;
            return Err(DomainError::invalid_location(format!(
                "{what} still holds {active} active item(s); move or delete them first"
            ))
            .into());
        }

        let purged = tx.purge_deleted_items(scope).await?;
        tx.delete_layout(scope).await?;
        tx.commit().await?;

        tracing::Span::current().record("purged", purged);
        info!(purged, "{what} deleted");
        Ok(purged)
    }
}
