//! Physical layout: rooms contain storage units, storage units contain
//! compartments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roomstock_core::{CompartmentId, DomainError, DomainResult, Entity, RoomId, StorageUnitId};

use crate::serde_ext::present;

pub const MAX_LAYOUT_NAME_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub building: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Room {
    type Id = RoomId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Room {
    pub fn create(attrs: NewRoom, now: DateTime<Utc>) -> Self {
        Self {
            id: RoomId::new(),
            name: attrs.name,
            building: attrs.building,
            notes: attrs.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// "Building - Name" when the building is known, otherwise the name.
    pub fn display_name(&self) -> String {
        match self.building.as_deref() {
            Some(building) if !building.is_empty() => format!("{building} - {}", self.name),
            _ => self.name.clone(),
        }
    }

    pub fn apply_patch(&mut self, patch: RoomPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(building) = patch.building {
            self.building = building;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoom {
    pub name: String,
    #[serde(default)]
    pub building: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewRoom {
    pub fn validate(&self) -> DomainResult<()> {
        ensure_layout_name("name", &self.name)?;
        ensure_optional_len("building", self.building.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RoomPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub building: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub notes: Option<Option<String>>,
}

impl RoomPatch {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            ensure_layout_name("name", name)?;
        }
        ensure_optional_len("building", self.building.as_ref().and_then(|b| b.as_deref()))
    }
}

/// Kind of furniture a storage unit represents.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageUnitType {
    #[default]
    Cabinet,
    Desk,
    Shelf,
    Drawer,
    Box,
    Other,
}

impl StorageUnitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageUnitType::Cabinet => "cabinet",
            StorageUnitType::Desk => "desk",
            StorageUnitType::Shelf => "shelf",
            StorageUnitType::Drawer => "drawer",
            StorageUnitType::Box => "box",
            StorageUnitType::Other => "other",
        }
    }
}

impl core::fmt::Display for StorageUnitType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for StorageUnitType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cabinet" => Ok(StorageUnitType::Cabinet),
            "desk" => Ok(StorageUnitType::Desk),
            "shelf" => Ok(StorageUnitType::Shelf),
            "drawer" => Ok(StorageUnitType::Drawer),
            "box" => Ok(StorageUnitType::Box),
            "other" => Ok(StorageUnitType::Other),
            other => Err(DomainError::validation(format!(
                "unknown storage unit type: {other}"
            ))),
        }
    }
}

/// Position of a storage unit on its room's floor plan.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_extent")]
    pub width: f64,
    #[serde(default = "default_extent")]
    pub height: f64,
    #[serde(default)]
    pub rotation: i32,
}

fn default_extent() -> f64 {
    100.0
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: default_extent(),
            height: default_extent(),
            rotation: 0,
        }
    }
}

impl Placement {
    pub fn validate(&self) -> DomainResult<()> {
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(DomainError::validation("position must be finite"));
        }
        if !(self.width.is_finite() && self.width > 0.0) || !(self.height.is_finite() && self.height > 0.0) {
            return Err(DomainError::validation("width and height must be positive"));
        }
        if ![0, 90, 180, 270].contains(&self.rotation) {
            return Err(DomainError::validation("rotation must be one of 0, 90, 180, 270"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageUnit {
    pub id: StorageUnitId,
    pub room_id: RoomId,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: StorageUnitType,
    #[serde(flatten)]
    pub placement: Placement,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for StorageUnit {
    type Id = StorageUnitId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl StorageUnit {
    pub fn create(attrs: NewStorageUnit, now: DateTime<Utc>) -> Self {
        Self {
            id: StorageUnitId::new(),
            room_id: attrs.room_id,
            label: attrs.label,
            kind: attrs.kind,
            placement: attrs.placement,
            notes: attrs.notes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_patch(&mut self, patch: StorageUnitPatch, now: DateTime<Utc>) {
        self.placement = patch.placement_over(self.placement);
        if let Some(label) = patch.label {
            self.label = label;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStorageUnit {
    pub room_id: RoomId,
    pub label: String,
    #[serde(default, rename = "type")]
    pub kind: StorageUnitType,
    #[serde(flatten)]
    pub placement: Placement,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewStorageUnit {
    pub fn validate(&self) -> DomainResult<()> {
        ensure_layout_name("label", &self.label)?;
        self.placement.validate()
    }
}

/// Partial update of a storage unit. The owning room is fixed at creation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StorageUnitPatch {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<StorageUnitType>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub rotation: Option<i32>,
    #[serde(default, deserialize_with = "present")]
    pub notes: Option<Option<String>>,
}

impl StorageUnitPatch {
    fn placement_over(&self, current: Placement) -> Placement {
        Placement {
            x: self.x.unwrap_or(current.x),
            y: self.y.unwrap_or(current.y),
            width: self.width.unwrap_or(current.width),
            height: self.height.unwrap_or(current.height),
            rotation: self.rotation.unwrap_or(current.rotation),
        }
    }

    /// Validated against the unit's current placement so partial updates
    /// are checked as the combined result.
    pub fn validate(&self, current: &StorageUnit) -> DomainResult<()> {
        if let Some(label) = &self.label {
            ensure_layout_name("label", label)?;
        }
        self.placement_over(current.placement).validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compartment {
    pub id: CompartmentId,
    pub storage_unit_id: StorageUnitId,
    pub name: String,
    pub index_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Compartment {
    type Id = CompartmentId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Compartment {
    pub fn create(attrs: NewCompartment, now: DateTime<Utc>) -> Self {
        Self {
            id: CompartmentId::new(),
            storage_unit_id: attrs.storage_unit_id,
            name: attrs.name,
            index_order: attrs.index_order,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_patch(&mut self, patch: CompartmentPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(order) = patch.index_order {
            self.index_order = order;
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompartment {
    pub storage_unit_id: StorageUnitId,
    pub name: String,
    #[serde(default)]
    pub index_order: i32,
}

impl NewCompartment {
    pub fn validate(&self) -> DomainResult<()> {
        ensure_layout_name("name", &self.name)?;
        ensure_index_order(self.index_order)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CompartmentPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub index_order: Option<i32>,
}

impl CompartmentPatch {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            ensure_layout_name("name", name)?;
        }
        match self.index_order {
            Some(order) => ensure_index_order(order),
            None => Ok(()),
        }
    }
}

fn ensure_layout_name(field: &str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    ensure_optional_len(field, Some(value))
}

fn ensure_optional_len(field: &str, value: Option<&str>) -> DomainResult<()> {
    match value {
        Some(v) if v.chars().count() > MAX_LAYOUT_NAME_LEN => Err(DomainError::validation(
            format!("{field} exceeds {MAX_LAYOUT_NAME_LEN} characters"),
        )),
        _ => Ok(()),
    }
}

fn ensure_index_order(order: i32) -> DomainResult<()> {
    if order < 0 {
        return Err(DomainError::validation("index_order cannot be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> StorageUnit {
        StorageUnit::create(
            NewStorageUnit {
                room_id: RoomId::new(),
                label: "Cabinet A".into(),
                kind: StorageUnitType::Cabinet,
                placement: Placement::default(),
                notes: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn room_display_name_includes_building_when_known() {
        let mut room = Room::create(
            NewRoom {
                name: "Lab 101".into(),
                building: Some("North".into()),
                notes: None,
            },
            Utc::now(),
        );
        assert_eq!(room.display_name(), "North - Lab 101");
        room.building = None;
        assert_eq!(room.display_name(), "Lab 101");
    }

    #[test]
    fn new_storage_unit_reads_flat_placement_with_defaults() {
        let room = RoomId::new();
        let json = format!(r#"{{"room_id":"{room}","label":"Shelf 2","type":"shelf","x":12.5}}"#);
        let attrs: NewStorageUnit = serde_json::from_str(&json).unwrap();
        assert_eq!(attrs.kind, StorageUnitType::Shelf);
        assert_eq!(attrs.placement.x, 12.5);
        assert_eq!(attrs.placement.width, 100.0);
        assert!(attrs.validate().is_ok());
    }

    #[test]
    fn placement_rejects_odd_rotation_and_flat_extents() {
        let mut placement = Placement::default();
        placement.rotation = 45;
        assert!(placement.validate().is_err());

        let mut placement = Placement::default();
        placement.height = 0.0;
        assert!(placement.validate().is_err());
    }

    #[test]
    fn unit_patch_is_validated_against_current_placement() {
        let current = unit();
        let patch = StorageUnitPatch {
            width: Some(-5.0),
            ..Default::default()
        };
        assert!(matches!(patch.validate(&current), Err(DomainError::Validation(_))));

        let patch = StorageUnitPatch {
            rotation: Some(90),
            notes: Some(Some("by the door".into())),
            ..Default::default()
        };
        assert!(patch.validate(&current).is_ok());
        let mut updated = current.clone();
        updated.apply_patch(patch, Utc::now());
        assert_eq!(updated.placement.rotation, 90);
        assert_eq!(updated.placement.width, current.placement.width);
        assert_eq!(updated.notes.as_deref(), Some("by the door"));
    }

    #[test]
    fn unit_patch_relabels_and_moves_together() {
        let current = unit();
        let patch = StorageUnitPatch {
            label: Some("Cabinet B".into()),
            kind: Some(StorageUnitType::Shelf),
            x: Some(320.0),
            ..Default::default()
        };
        assert!(patch.validate(&current).is_ok());

        let mut updated = current.clone();
        updated.apply_patch(patch, Utc::now());
        assert_eq!(updated.label, "Cabinet B");
        assert_eq!(updated.kind, StorageUnitType::Shelf);
        assert_eq!(updated.placement.x, 320.0);
        assert_eq!(updated.placement.y, current.placement.y);
        assert_eq!(updated.notes, current.notes);
    }

    #[test]
    fn compartment_order_cannot_be_negative() {
        let attrs = NewCompartment {
            storage_unit_id: StorageUnitId::new(),
            name: "Drawer 1".into(),
            index_order: -1,
        };
        assert!(attrs.validate().is_err());
        assert!(CompartmentPatch { name: None, index_order: Some(3) }.validate().is_ok());
    }

    #[test]
    fn layout_names_are_bounded() {
        let attrs = NewRoom {
            name: "r".repeat(MAX_LAYOUT_NAME_LEN + 1),
            building: None,
            notes: None,
        };
        assert!(attrs.validate().is_err());
    }
}
