//! Search and listing queries plus the enriched result shape.

use serde::{Deserialize, Serialize};

use roomstock_core::{CompartmentId, DomainError, DomainResult, RoomId, StorageUnitId};

use crate::item::{Item, ItemStatus};
use crate::layout::{Compartment, Room, StorageUnit, StorageUnitType};

pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 200;

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

/// A validated window over an ordered result set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn new(limit: u32, offset: u32) -> DomainResult<Self> {
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(DomainError::validation(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }
        Ok(Self { limit, offset })
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

/// Free-text search over items, optionally scoped to a room or storage unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub storage_unit_id: Option<StorageUnitId>,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl SearchQuery {
    pub fn text(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            limit: DEFAULT_PAGE_LIMIT,
            ..Default::default()
        }
    }

    pub fn page(&self) -> DomainResult<Page> {
        Page::new(self.limit, self.offset)
    }

    /// The search text, if any. An empty string means "no text filter".
    pub fn needle(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.is_empty())
    }
}

/// Structured listing of items by exact location and status.
///
/// Paging is opt-in: without a `limit` the whole ordered set comes back and
/// `offset` alone skips leading rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ItemListQuery {
    #[serde(default)]
    pub storage_unit_id: Option<StorageUnitId>,
    #[serde(default)]
    pub compartment_id: Option<CompartmentId>,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: u32,
}

impl ItemListQuery {
    pub fn window(&self) -> DomainResult<Window> {
        match self.limit {
            Some(limit) => Page::new(limit, self.offset).map(Window::Page),
            None => Ok(Window::From(self.offset)),
        }
    }
}

/// Rows requested from a listing: a bounded page or everything past an offset.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Window {
    Page(Page),
    From(u32),
}

impl From<Page> for Window {
    fn from(page: Page) -> Self {
        Window::Page(page)
    }
}

impl Window {
    pub const ALL: Window = Window::From(0);

    pub fn offset(self) -> u32 {
        match self {
            Window::Page(page) => page.offset,
            Window::From(offset) => offset,
        }
    }

    pub fn limit(self) -> Option<u32> {
        match self {
            Window::Page(page) => Some(page.limit),
            Window::From(_) => None,
        }
    }
}

/// Case-insensitive substring test.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Whether any of the item's text attributes, or the label of the storage
/// unit it effectively sits in, contains `needle`.
pub fn matches_text(item: &Item, effective_unit_label: Option<&str>, needle: &str) -> bool {
    let fields = [
        Some(item.name.as_str()),
        item.unit_catalog_number.as_deref(),
        item.catalog_number.as_deref(),
        item.serial_number.as_deref(),
        item.description.as_deref(),
        item.owned_by.as_deref(),
        effective_unit_label,
    ];
    fields.into_iter().flatten().any(|field| contains_ci(field, needle))
}

/// Whether any project tag contains `needle`.
pub fn matches_project(projects: &[String], needle: &str) -> bool {
    projects.iter().any(|tag| contains_ci(tag, needle))
}

/// The layout rows an item resolves to: its compartment (if any), the
/// storage unit it effectively sits in, and that unit's room.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedPlacement {
    pub room: Option<Room>,
    pub storage_unit: Option<StorageUnit>,
    pub compartment: Option<Compartment>,
}

impl ResolvedPlacement {
    /// Human-readable path such as `North - Lab 101 > Cabinet A > Drawer 2`.
    /// Missing segments are skipped.
    pub fn location_path(&self) -> String {
        let segments = [
            self.room.as_ref().map(Room::display_name),
            self.storage_unit.as_ref().map(|u| u.label.clone()),
            self.compartment.as_ref().map(|c| c.name.clone()),
        ];
        segments.into_iter().flatten().collect::<Vec<_>>().join(" > ")
    }

    pub fn into_hit(self, item: Item) -> SearchHit {
        let location_path = self.location_path();
        SearchHit {
            item,
            room_id: self.room.as_ref().map(|r| r.id),
            room_name: self.room.as_ref().map(|r| r.name.clone()),
            room_building: self.room.and_then(|r| r.building),
            storage_unit_id: self.storage_unit.as_ref().map(|u| u.id),
            storage_unit_label: self.storage_unit.as_ref().map(|u| u.label.clone()),
            storage_unit_type: self.storage_unit.map(|u| u.kind),
            compartment_id: self.compartment.as_ref().map(|c| c.id),
            compartment_name: self.compartment.map(|c| c.name),
            location_path,
        }
    }
}

/// An item enriched with its resolved location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub item: Item,
    pub room_id: Option<RoomId>,
    pub room_name: Option<String>,
    pub room_building: Option<String>,
    pub storage_unit_id: Option<StorageUnitId>,
    pub storage_unit_label: Option<String>,
    pub storage_unit_type: Option<StorageUnitType>,
    pub compartment_id: Option<CompartmentId>,
    pub compartment_name: Option<String>,
    pub location_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPage {
    pub items: Vec<SearchHit>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}
