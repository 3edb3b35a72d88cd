use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roomstock_core::{DomainError, DomainResult, Entity, ItemId};

use crate::location::Location;
use crate::serde_ext::present;

pub const MAX_NAME_LEN: usize = 255;
pub const MAX_CATALOG_NUMBER_LEN: usize = 100;
pub const MAX_OWNER_LEN: usize = 255;

/// Lifecycle status of an item. Deletion is soft: a deleted item keeps its
/// last location and its movement history.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Active,
    Deleted,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Active => "active",
            ItemStatus::Deleted => "deleted",
        }
    }
}

impl core::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ItemStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ItemStatus::Active),
            "deleted" => Ok(ItemStatus::Deleted),
            other => Err(DomainError::validation(format!("unknown item status: {other}"))),
        }
    }
}

/// Descriptive attributes supplied when an item is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub unit_catalog_number: Option<String>,
    #[serde(default)]
    pub catalog_number: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub owned_by: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub projects: Vec<String>,
}

fn default_quantity() -> i32 {
    1
}

impl NewItem {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit_catalog_number: None,
            catalog_number: None,
            serial_number: None,
            owned_by: None,
            description: None,
            quantity: default_quantity(),
            projects: Vec::new(),
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        ensure_name(&self.name)?;
        ensure_max_len("unit_catalog_number", self.unit_catalog_number.as_deref(), MAX_CATALOG_NUMBER_LEN)?;
        ensure_max_len("catalog_number", self.catalog_number.as_deref(), MAX_CATALOG_NUMBER_LEN)?;
        ensure_max_len("serial_number", self.serial_number.as_deref(), MAX_CATALOG_NUMBER_LEN)?;
        ensure_max_len("owned_by", self.owned_by.as_deref(), MAX_OWNER_LEN)?;
        ensure_quantity(self.quantity)
    }
}

/// Partial update of an item's descriptive attributes.
///
/// Clearable fields use `Option<Option<_>>`: absent leaves the value alone,
/// `null` clears it. Location and status are not patchable; they change
/// only through move and soft delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ItemPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub unit_catalog_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub catalog_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub serial_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub owned_by: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub quantity: Option<i32>,
    #[serde(default)]
    pub projects: Option<Vec<String>>,
}

impl ItemPatch {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            ensure_name(name)?;
        }
        ensure_max_len("unit_catalog_number", flatten(&self.unit_catalog_number), MAX_CATALOG_NUMBER_LEN)?;
        ensure_max_len("catalog_number", flatten(&self.catalog_number), MAX_CATALOG_NUMBER_LEN)?;
        ensure_max_len("serial_number", flatten(&self.serial_number), MAX_CATALOG_NUMBER_LEN)?;
        ensure_max_len("owned_by", flatten(&self.owned_by), MAX_OWNER_LEN)?;
        if let Some(quantity) = self.quantity {
            ensure_quantity(quantity)?;
        }
        Ok(())
    }
}

fn flatten(value: &Option<Option<String>>) -> Option<&str> {
    value.as_ref().and_then(|v| v.as_deref())
}

fn ensure_name(name: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "name exceeds {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn ensure_max_len(field: &str, value: Option<&str>, max: usize) -> DomainResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(DomainError::validation(format!(
            "{field} exceeds {max} characters"
        ))),
        _ => Ok(()),
    }
}

fn ensure_quantity(quantity: i32) -> DomainResult<()> {
    if quantity < 0 {
        return Err(DomainError::validation("quantity cannot be negative"));
    }
    Ok(())
}

/// A physical object tracked by the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub unit_catalog_number: Option<String>,
    pub catalog_number: Option<String>,
    pub serial_number: Option<String>,
    pub owned_by: Option<String>,
    pub description: Option<String>,
    pub quantity: i32,
    pub projects: Vec<String>,
    pub location: Location,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Item {
    /// Build a fresh active item. Attributes must already be validated.
    pub fn create(id: ItemId, attrs: NewItem, location: Location, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: attrs.name,
            unit_catalog_number: attrs.unit_catalog_number,
            catalog_number: attrs.catalog_number,
            serial_number: attrs.serial_number,
            owned_by: attrs.owned_by,
            description: attrs.description,
            quantity: attrs.quantity,
            projects: attrs.projects,
            location,
            status: ItemStatus::Active,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ItemStatus::Active
    }

    pub fn is_deleted(&self) -> bool {
        self.status == ItemStatus::Deleted
    }

    /// Apply a validated patch.
    pub fn apply_patch(&mut self, patch: ItemPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(v) = patch.unit_catalog_number {
            self.unit_catalog_number = v;
        }
        if let Some(v) = patch.catalog_number {
            self.catalog_number = v;
        }
        if let Some(v) = patch.serial_number {
            self.serial_number = v;
        }
        if let Some(v) = patch.owned_by {
            self.owned_by = v;
        }
        if let Some(v) = patch.description {
            self.description = v;
        }
        if let Some(quantity) = patch.quantity {
            self.quantity = quantity;
        }
        if let Some(projects) = patch.projects {
            self.projects = projects;
        }
        self.updated_at = now;
    }

    /// Place the item somewhere else. Deleted items keep their last location.
    pub fn relocate(&mut self, to: Location, now: DateTime<Utc>) -> DomainResult<()> {
        if self.is_deleted() {
            return Err(DomainError::invalid_location(format!(
                "item {} is deleted and cannot be moved",
                self.id
            )));
        }
        self.location = to;
        self.updated_at = now;
        Ok(())
    }

    /// Idempotent: deleting an already-deleted item keeps its original
    /// deletion time.
    pub fn soft_delete(&mut self, now: DateTime<Utc>) {
        if self.is_deleted() {
            return;
        }
        self.status = ItemStatus::Deleted;
        self.deleted_at = Some(now);
        self.updated_at = now;
    }
}
