use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roomstock_core::{CompartmentId, Entity, ItemId, MovementId, StorageUnitId, UserId};

use crate::item::Item;
use crate::location::{Location, LocationRef};

/// Append-only record of one relocation.
///
/// Ids here are plain references: a movement outlives the item, unit,
/// compartment or user it mentions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMovement {
    pub id: MovementId,
    pub item_id: ItemId,
    pub user_id: Option<UserId>,
    pub from_storage_unit_id: Option<StorageUnitId>,
    pub from_compartment_id: Option<CompartmentId>,
    pub to_storage_unit_id: Option<StorageUnitId>,
    pub to_compartment_id: Option<CompartmentId>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for ItemMovement {
    type Id = MovementId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl ItemMovement {
    /// Record a move of `item` from where it is now to `to`.
    ///
    /// Call before relocating the item so the source is captured.
    pub fn record(
        item: &Item,
        to: Location,
        actor: UserId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let from = LocationRef::from(item.location);
        let to = LocationRef::from(to);
        Self {
            id: MovementId::new(),
            item_id: item.id,
            user_id: Some(actor),
            from_storage_unit_id: from.storage_unit_id,
            from_compartment_id: from.compartment_id,
            to_storage_unit_id: to.storage_unit_id,
            to_compartment_id: to.compartment_id,
            reason,
            created_at: at,
        }
    }

    pub fn source(&self) -> LocationRef {
        LocationRef::new(self.from_storage_unit_id, self.from_compartment_id)
    }

    pub fn destination(&self) -> LocationRef {
        LocationRef::new(self.to_storage_unit_id, self.to_compartment_id)
    }
}
