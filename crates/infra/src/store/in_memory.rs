use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use roomstock_core::{CompartmentId, ItemId, RoomId, StorageUnitId};
use roomstock_inventory::search::{matches_project, matches_text, Page, Window};
use roomstock_inventory::{
    Compartment, Item, ItemMovement, Location, ResolvedPlacement, Room, StorageUnit,
};

use super::r#trait::{
    InventoryStore, ItemFilter, ItemListFilter, ItemPage, LayoutScope, ProjectMatch, StoreError,
    StoreResult, StoreTx, TagScope,
};

/// Insertion-ordered tables.
#[derive(Debug, Default)]
struct Tables {
    rooms: Vec<Room>,
    units: Vec<StorageUnit>,
    compartments: Vec<Compartment>,
    items: Vec<Item>,
    movements: Vec<ItemMovement>,
}

impl Tables {
    fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == id)
    }

    fn unit(&self, id: StorageUnitId) -> Option<&StorageUnit> {
        self.units.iter().find(|u| u.id == id)
    }

    fn compartment(&self, id: CompartmentId) -> Option<&Compartment> {
        self.compartments.iter().find(|c| c.id == id)
    }

    fn item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    /// The storage unit an item sits in, directly or through a compartment.
    fn effective_unit_id(&self, location: Location) -> Option<StorageUnitId> {
        match location {
            Location::StorageUnit(id) => Some(id),
            Location::Compartment(id) => self.compartment(id).map(|c| c.storage_unit_id),
        }
    }

    fn room_id_of(&self, location: Location) -> Option<RoomId> {
        self.effective_unit_id(location)
            .and_then(|id| self.unit(id))
            .map(|u| u.room_id)
    }

    fn in_scope(&self, item: &Item, room_id: Option<RoomId>, unit_id: Option<StorageUnitId>) -> bool {
        if unit_id.is_some() && self.effective_unit_id(item.location) != unit_id {
            return false;
        }
        if room_id.is_some() && self.room_id_of(item.location) != room_id {
            return false;
        }
        true
    }

    fn under(&self, item: &Item, scope: LayoutScope) -> bool {
        match scope {
            LayoutScope::Compartment(id) => item.location == Location::Compartment(id),
            LayoutScope::StorageUnit(id) => self.effective_unit_id(item.location) == Some(id),
            LayoutScope::Room(id) => self.room_id_of(item.location) == Some(id),
        }
    }

    fn ensure_location_row(&self, location: Location) -> StoreResult<()> {
        let exists = match location {
            Location::StorageUnit(id) => self.unit(id).is_some(),
            Location::Compartment(id) => self.compartment(id).is_some(),
        };
        if exists {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!(
                "item location {location:?} references a missing row"
            )))
        }
    }

    fn placement(&self, location: Location) -> ResolvedPlacement {
        let compartment = match location {
            Location::Compartment(id) => self.compartment(id).cloned(),
            Location::StorageUnit(_) => None,
        };
        let storage_unit = self
            .effective_unit_id(location)
            .and_then(|id| self.unit(id))
            .cloned();
        let room = storage_unit
            .as_ref()
            .and_then(|u| self.room(u.room_id))
            .cloned();
        ResolvedPlacement {
            room,
            storage_unit,
            compartment,
        }
    }

    fn matches(&self, item: &Item, filter: &ItemFilter, pushdown: bool) -> bool {
        if item.status != filter.status || !self.in_scope(item, filter.room_id, filter.storage_unit_id) {
            return false;
        }
        let Some(needle) = filter.text.as_deref() else {
            return true;
        };
        let label = self
            .effective_unit_id(item.location)
            .and_then(|id| self.unit(id))
            .map(|u| u.label.as_str());
        if matches_text(item, label, needle) {
            return true;
        }
        match &filter.projects {
            ProjectMatch::None => false,
            ProjectMatch::InQuery => pushdown && matches_project(&item.projects, needle),
            ProjectMatch::Ids(ids) => ids.contains(&item.id),
        }
    }
}

fn paginate(mut items: Vec<Item>, window: Window) -> ItemPage {
    // Stable sort: equal names keep insertion order.
    items.sort_by(|a, b| a.name.cmp(&b.name));
    let total = items.len() as u64;
    let take = window.limit().map_or(usize::MAX, |limit| limit as usize);
    let items = items
        .into_iter()
        .skip(window.offset() as usize)
        .take(take)
        .collect();
    ItemPage { items, total }
}

/// In-process inventory store.
///
/// Intended for tests/dev and for running the service without a database.
/// One async mutex guards all tables; a transaction holds it until commit or
/// drop, so writers are serialised. Transactions write in place and undo
/// their own journal on rollback, so opening one copies nothing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryStore {
    state: Arc<Mutex<Tables>>,
    structured_substring_match: bool,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that matches project tags inside search queries, like a
    /// database with JSON operators would.
    pub fn with_structured_substring_match() -> Self {
        Self {
            structured_substring_match: true,
            ..Self::default()
        }
    }
}

#[async_trait::async_trait]
impl InventoryStore for InMemoryInventoryStore {
    type Tx = InMemoryTx;

    fn supports_structured_substring_match(&self) -> bool {
        self.structured_substring_match
    }

    async fn begin(&self) -> StoreResult<Self::Tx> {
        let guard = self.state.clone().lock_owned().await;
        Ok(InMemoryTx {
            guard,
            journal: Vec::new(),
        })
    }

    async fn get_item(&self, id: ItemId) -> StoreResult<Option<Item>> {
        let tables = self.state.lock().await;
        Ok(tables.items.iter().find(|i| i.id == id).cloned())
    }

    async fn list_items(&self, filter: ItemListFilter, window: Window) -> StoreResult<ItemPage> {
        let tables = self.state.lock().await;
        let items = tables
            .items
            .iter()
            .filter(|i| i.status == filter.status)
            .filter(|i| {
                filter
                    .storage_unit_id
                    .is_none_or(|id| i.location == Location::StorageUnit(id))
            })
            .filter(|i| {
                filter
                    .compartment_id
                    .is_none_or(|id| i.location == Location::Compartment(id))
            })
            .cloned()
            .collect();
        Ok(paginate(items, window))
    }

    async fn search_items(&self, filter: &ItemFilter, page: Page) -> StoreResult<ItemPage> {
        let tables = self.state.lock().await;
        let items = tables
            .items
            .iter()
            .filter(|i| tables.matches(i, filter, self.structured_substring_match))
            .cloned()
            .collect();
        Ok(paginate(items, page.into()))
    }

    async fn tagged_items(&self, scope: TagScope) -> StoreResult<Vec<(ItemId, Vec<String>)>> {
        let tables = self.state.lock().await;
        Ok(tables
            .items
            .iter()
            .filter(|i| i.status == scope.status && !i.projects.is_empty())
            .filter(|i| tables.in_scope(i, scope.room_id, scope.storage_unit_id))
            .map(|i| (i.id, i.projects.clone()))
            .collect())
    }

    async fn resolve_placements(
        &self,
        locations: &[Location],
    ) -> StoreResult<HashMap<Location, ResolvedPlacement>> {
        let tables = self.state.lock().await;
        Ok(locations
            .iter()
            .map(|location| (*location, tables.placement(*location)))
            .collect())
    }

    async fn movements_for(&self, item_id: ItemId) -> StoreResult<Vec<ItemMovement>> {
        let tables = self.state.lock().await;
        Ok(tables
            .movements
            .iter()
            .rev()
            .filter(|m| m.item_id == item_id)
            .cloned()
            .collect())
    }

    async fn get_room(&self, id: RoomId) -> StoreResult<Option<Room>> {
        Ok(self.state.lock().await.room(id).cloned())
    }

    async fn list_rooms(&self) -> StoreResult<Vec<Room>> {
        let mut rooms = self.state.lock().await.rooms.clone();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rooms)
    }

    async fn get_storage_unit(&self, id: StorageUnitId) -> StoreResult<Option<StorageUnit>> {
        Ok(self.state.lock().await.unit(id).cloned())
    }

    async fn list_storage_units(&self, room_id: Option<RoomId>) -> StoreResult<Vec<StorageUnit>> {
        let tables = self.state.lock().await;
        let mut units: Vec<StorageUnit> = tables
            .units
            .iter()
            .filter(|u| room_id.is_none_or(|id| u.room_id == id))
            .cloned()
            .collect();
        units.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(units)
    }

    async fn get_compartment(&self, id: CompartmentId) -> StoreResult<Option<Compartment>> {
        Ok(self.state.lock().await.compartment(id).cloned())
    }

    async fn list_compartments(
        &self,
        storage_unit_id: Option<StorageUnitId>,
    ) -> StoreResult<Vec<Compartment>> {
        let tables = self.state.lock().await;
        let mut compartments: Vec<Compartment> = tables
            .compartments
            .iter()
            .filter(|c| storage_unit_id.is_none_or(|id| c.storage_unit_id == id))
            .cloned()
            .collect();
        compartments.sort_by_key(|c| c.index_order);
        Ok(compartments)
    }
}

/// Write applied to the locked tables, kept so it can be reverted.
enum Undo {
    InsertedItem,
    UpdatedItem(usize, Item),
    PurgedItems(Vec<(usize, Item)>),
    InsertedMovement,
    InsertedRoom,
    UpdatedRoom(usize, Room),
    InsertedUnit,
    UpdatedUnit(usize, StorageUnit),
    InsertedCompartment,
    UpdatedCompartment(usize, Compartment),
    DeletedLayout {
        rooms: Vec<(usize, Room)>,
        units: Vec<(usize, StorageUnit)>,
        compartments: Vec<(usize, Compartment)>,
    },
}

impl Undo {
    fn revert(self, tables: &mut Tables) {
        match self {
            Undo::InsertedItem => {
                tables.items.pop();
            }
            Undo::UpdatedItem(index, row) => tables.items[index] = row,
            Undo::PurgedItems(taken) => restore(&mut tables.items, taken),
            Undo::InsertedMovement => {
                tables.movements.pop();
            }
            Undo::InsertedRoom => {
                tables.rooms.pop();
            }
            Undo::UpdatedRoom(index, row) => tables.rooms[index] = row,
            Undo::InsertedUnit => {
                tables.units.pop();
            }
            Undo::UpdatedUnit(index, row) => tables.units[index] = row,
            Undo::InsertedCompartment => {
                tables.compartments.pop();
            }
            Undo::UpdatedCompartment(index, row) => tables.compartments[index] = row,
            Undo::DeletedLayout {
                rooms,
                units,
                compartments,
            } => {
                restore(&mut tables.rooms, rooms);
                restore(&mut tables.units, units);
                restore(&mut tables.compartments, compartments);
            }
        }
    }
}

/// Removes matching rows, returning them with their original positions.
fn take_where<T>(rows: &mut Vec<T>, mut doomed: impl FnMut(&T) -> bool) -> Vec<(usize, T)> {
    let mut taken = Vec::new();
    let mut kept = Vec::with_capacity(rows.len());
    for (index, row) in std::mem::take(rows).into_iter().enumerate() {
        if doomed(&row) {
            taken.push((index, row));
        } else {
            kept.push(row);
        }
    }
    *rows = kept;
    taken
}

/// Inverse of `take_where`; positions are ascending.
fn restore<T>(rows: &mut Vec<T>, taken: Vec<(usize, T)>) {
    for (index, row) in taken {
        rows.insert(index, row);
    }
}

fn position<T>(rows: &[T], matches: impl Fn(&T) -> bool) -> Option<usize> {
    rows.iter().position(matches)
}

/// Exclusive access to the tables. Writes land in place and are journaled;
/// unless committed, the journal is replayed backwards on drop.
pub struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    journal: Vec<Undo>,
}

impl InMemoryTx {
    fn undo(&mut self) {
        while let Some(step) = self.journal.pop() {
            step.revert(&mut self.guard);
        }
    }
}

impl Drop for InMemoryTx {
    fn drop(&mut self) {
        self.undo();
    }
}

impl core::fmt::Debug for InMemoryTx {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryTx")
            .field("pending_writes", &self.journal.len())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl StoreTx for InMemoryTx {
    async fn lock_item(&mut self, id: ItemId) -> StoreResult<Option<Item>> {
        Ok(self.guard.items.iter().find(|i| i.id == id).cloned())
    }

    async fn lock_active_items_in_unit(&mut self, unit: StorageUnitId) -> StoreResult<Vec<Item>> {
        Ok(self
            .guard
            .items
            .iter()
            .filter(|i| i.is_active() && i.location == Location::StorageUnit(unit))
            .cloned()
            .collect())
    }

    async fn get_room(&mut self, id: RoomId) -> StoreResult<Option<Room>> {
        Ok(self.guard.room(id).cloned())
    }

    async fn get_storage_unit(&mut self, id: StorageUnitId) -> StoreResult<Option<StorageUnit>> {
        Ok(self.guard.unit(id).cloned())
    }

    async fn get_compartment(&mut self, id: CompartmentId) -> StoreResult<Option<Compartment>> {
        Ok(self.guard.compartment(id).cloned())
    }

    async fn lock_layout(&mut self, scope: LayoutScope) -> StoreResult<bool> {
        Ok(match scope {
            LayoutScope::Room(id) => self.guard.room(id).is_some(),
            LayoutScope::StorageUnit(id) => self.guard.unit(id).is_some(),
            LayoutScope::Compartment(id) => self.guard.compartment(id).is_some(),
        })
    }

    async fn insert_item(&mut self, item: &Item) -> StoreResult<()> {
        if self.guard.items.iter().any(|i| i.id == item.id) {
            return Err(StoreError::Constraint(format!("item {} already exists", item.id)));
        }
        self.guard.ensure_location_row(item.location)?;
        self.guard.items.push(item.clone());
        self.journal.push(Undo::InsertedItem);
        Ok(())
    }

    async fn update_item(&mut self, item: &Item) -> StoreResult<()> {
        self.guard.ensure_location_row(item.location)?;
        let index = position(&self.guard.items, |i| i.id == item.id)
            .ok_or_else(|| StoreError::Constraint(format!("item {} does not exist", item.id)))?;
        let old = std::mem::replace(&mut self.guard.items[index], item.clone());
        self.journal.push(Undo::UpdatedItem(index, old));
        Ok(())
    }

    async fn insert_movement(&mut self, movement: &ItemMovement) -> StoreResult<()> {
        self.guard.movements.push(movement.clone());
        self.journal.push(Undo::InsertedMovement);
        Ok(())
    }

    async fn count_active_items(&mut self, scope: LayoutScope) -> StoreResult<u64> {
        let tables = &*self.guard;
        Ok(tables
            .items
            .iter()
            .filter(|i| i.is_active() && tables.under(i, scope))
            .count() as u64)
    }

    async fn purge_deleted_items(&mut self, scope: LayoutScope) -> StoreResult<u64> {
        let doomed: Vec<ItemId> = self
            .guard
            .items
            .iter()
            .filter(|i| i.is_deleted() && self.guard.under(i, scope))
            .map(|i| i.id)
            .collect();
        let taken = take_where(&mut self.guard.items, |i| doomed.contains(&i.id));
        let purged = taken.len() as u64;
        self.journal.push(Undo::PurgedItems(taken));
        Ok(purged)
    }

    async fn insert_room(&mut self, room: &Room) -> StoreResult<()> {
        self.guard.rooms.push(room.clone());
        self.journal.push(Undo::InsertedRoom);
        Ok(())
    }

    async fn update_room(&mut self, room: &Room) -> StoreResult<()> {
        let index = position(&self.guard.rooms, |r| r.id == room.id)
            .ok_or_else(|| StoreError::Constraint(format!("room {} does not exist", room.id)))?;
        let old = std::mem::replace(&mut self.guard.rooms[index], room.clone());
        self.journal.push(Undo::UpdatedRoom(index, old));
        Ok(())
    }

    async fn insert_storage_unit(&mut self, unit: &StorageUnit) -> StoreResult<()> {
        if self.guard.room(unit.room_id).is_none() {
            return Err(StoreError::Constraint(format!("room {} does not exist", unit.room_id)));
        }
        self.guard.units.push(unit.clone());
        self.journal.push(Undo::InsertedUnit);
        Ok(())
    }

    async fn update_storage_unit(&mut self, unit: &StorageUnit) -> StoreResult<()> {
        let index = position(&self.guard.units, |u| u.id == unit.id).ok_or_else(|| {
            StoreError::Constraint(format!("storage unit {} does not exist", unit.id))
        })?;
        let old = std::mem::replace(&mut self.guard.units[index], unit.clone());
        self.journal.push(Undo::UpdatedUnit(index, old));
        Ok(())
    }

    async fn insert_compartment(&mut self, compartment: &Compartment) -> StoreResult<()> {
        if self.guard.unit(compartment.storage_unit_id).is_none() {
            return Err(StoreError::Constraint(format!(
                "storage unit {} does not exist",
                compartment.storage_unit_id
            )));
        }
        self.guard.compartments.push(compartment.clone());
        self.journal.push(Undo::InsertedCompartment);
        Ok(())
    }

    async fn update_compartment(&mut self, compartment: &Compartment) -> StoreResult<()> {
        let index = position(&self.guard.compartments, |c| c.id == compartment.id).ok_or_else(
            || StoreError::Constraint(format!("compartment {} does not exist", compartment.id)),
        )?;
        let old = std::mem::replace(&mut self.guard.compartments[index], compartment.clone());
        self.journal.push(Undo::UpdatedCompartment(index, old));
        Ok(())
    }

    async fn delete_layout(&mut self, scope: LayoutScope) -> StoreResult<()> {
        let tables = &*self.guard;
        if tables.items.iter().any(|i| tables.under(i, scope)) {
            return Err(StoreError::Constraint(format!(
                "{scope:?} still holds items"
            )));
        }

        let tables = &mut *self.guard;
        let undo = match scope {
            LayoutScope::Compartment(id) => Undo::DeletedLayout {
                rooms: Vec::new(),
                units: Vec::new(),
                compartments: take_where(&mut tables.compartments, |c| c.id == id),
            },
            LayoutScope::StorageUnit(id) => Undo::DeletedLayout {
                rooms: Vec::new(),
                compartments: take_where(&mut tables.compartments, |c| c.storage_unit_id == id),
                units: take_where(&mut tables.units, |u| u.id == id),
            },
            LayoutScope::Room(id) => {
                let units: Vec<StorageUnitId> = tables
                    .units
                    .iter()
                    .filter(|u| u.room_id == id)
                    .map(|u| u.id)
                    .collect();
                Undo::DeletedLayout {
                    compartments: take_where(&mut tables.compartments, |c| {
                        units.contains(&c.storage_unit_id)
                    }),
                    units: take_where(&mut tables.units, |u| u.room_id == id),
                    rooms: take_where(&mut tables.rooms, |r| r.id == id),
                }
            }
        };
        self.journal.push(undo);
        Ok(())
    }

    async fn commit(mut self) -> StoreResult<()> {
        self.journal.clear();
        Ok(())
    }

    async fn rollback(mut self) -> StoreResult<()> {
        self.undo();
        Ok(())
    }
}
