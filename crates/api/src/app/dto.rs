use serde::{Deserialize, Serialize};
use serde_json::json;

use roomstock_core::{CompartmentId, ItemId, RoomId, StorageUnitId};
use roomstock_infra::store::ItemPage;
use roomstock_inventory::{ItemListQuery, LocationRef, NewItem, Room, StorageUnit};

// -------------------------
// Request DTOs
// -------------------------

/// Item attributes plus the proposed location as two optional references.
#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    #[serde(flatten)]
    pub attrs: NewItem,
    #[serde(flatten)]
    pub location: LocationRef,
}

#[derive(Debug, Deserialize)]
pub struct MoveItemRequest {
    #[serde(default)]
    pub to_storage_unit_id: Option<StorageUnitId>,
    #[serde(default)]
    pub to_compartment_id: Option<CompartmentId>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl MoveItemRequest {
    pub fn destination(&self) -> LocationRef {
        LocationRef::new(self.to_storage_unit_id, self.to_compartment_id)
    }
}

/// Empty out a storage unit into another one.
#[derive(Debug, Deserialize)]
pub struct RelocateItemsRequest {
    pub to_storage_unit_id: StorageUnitId,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchDeleteRequest {
    pub item_ids: Vec<ItemId>,
}

#[derive(Debug, Deserialize)]
pub struct BatchMoveRequest {
    pub item_ids: Vec<ItemId>,
    pub to_storage_unit_id: StorageUnitId,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StorageUnitListQuery {
    #[serde(default)]
    pub room_id: Option<RoomId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompartmentListQuery {
    #[serde(default)]
    pub storage_unit_id: Option<StorageUnitId>,
}

// -------------------------
// Response mapping
// -------------------------

/// A room together with the storage units placed in it.
#[derive(Debug, Serialize)]
pub struct RoomWithUnits {
    #[serde(flatten)]
    pub room: Room,
    pub storage_units: Vec<StorageUnit>,
}

pub fn item_page_to_json(page: ItemPage, query: &ItemListQuery) -> serde_json::Value {
    json!({
        "items": page.items,
        "total": page.total,
        "limit": query.limit,
        "offset": query.offset,
    })
}

pub fn batch_result_to_json(success_count: u64, moved: bool) -> serde_json::Value {
    if moved {
        json!({ "success_count": success_count, "moved_count": success_count })
    } else {
        json!({ "success_count": success_count })
    }
}
