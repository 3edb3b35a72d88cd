//! Where an item lives.
//!
//! In memory a location is a tagged variant, so an item cannot hold two
//! places at once or none at all. At the edges (requests and table rows) it
//! travels as a pair of optional references, checked on the way in by
//! [`LocationRef::into_location`].

use serde::{Deserialize, Serialize};

use roomstock_core::{CompartmentId, DomainError, DomainResult, StorageUnitId, ValueObject};

/// An item's placement: directly in a storage unit or in a compartment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Location {
    StorageUnit(StorageUnitId),
    Compartment(CompartmentId),
}

impl ValueObject for Location {}

impl Location {
    pub fn storage_unit_id(&self) -> Option<StorageUnitId> {
        match self {
            Location::StorageUnit(id) => Some(*id),
            Location::Compartment(_) => None,
        }
    }

    pub fn compartment_id(&self) -> Option<CompartmentId> {
        match self {
            Location::StorageUnit(_) => None,
            Location::Compartment(id) => Some(*id),
        }
    }
}

/// A proposed or recorded location as two independent optional references.
///
/// This is the wire and row shape. Nothing stops both or neither being set,
/// which is exactly what [`LocationRef::into_location`] rejects.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationRef {
    #[serde(default)]
    pub storage_unit_id: Option<StorageUnitId>,
    #[serde(default)]
    pub compartment_id: Option<CompartmentId>,
}

impl LocationRef {
    pub fn new(storage_unit_id: Option<StorageUnitId>, compartment_id: Option<CompartmentId>) -> Self {
        Self {
            storage_unit_id,
            compartment_id,
        }
    }

    pub fn storage_unit(id: StorageUnitId) -> Self {
        Self::new(Some(id), None)
    }

    pub fn compartment(id: CompartmentId) -> Self {
        Self::new(None, Some(id))
    }

    pub fn is_empty(&self) -> bool {
        self.storage_unit_id.is_none() && self.compartment_id.is_none()
    }

    /// Shape check: exactly one reference must be set.
    ///
    /// Existence of the referenced row is checked by the store-backed guard.
    pub fn into_location(self) -> DomainResult<Location> {
        match (self.storage_unit_id, self.compartment_id) {
            (Some(_), Some(_)) => Err(DomainError::invalid_location(
                "an item cannot be in both a storage unit and a compartment",
            )),
            (None, None) => Err(DomainError::invalid_location(
                "a location (storage unit or compartment) is required",
            )),
            (Some(unit), None) => Ok(Location::StorageUnit(unit)),
            (None, Some(compartment)) => Ok(Location::Compartment(compartment)),
        }
    }
}

impl From<Location> for LocationRef {
    fn from(value: Location) -> Self {
        Self::new(value.storage_unit_id(), value.compartment_id())
    }
}

impl From<Option<Location>> for LocationRef {
    fn from(value: Option<Location>) -> Self {
        value.map(LocationRef::from).unwrap_or_default()
    }
}
