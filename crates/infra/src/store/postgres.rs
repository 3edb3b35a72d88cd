//! Postgres-backed inventory store.
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | `StoreError` |
//! |---|---|---|
//! | Database (unique violation) | `23505` | `Constraint` |
//! | Database (foreign key violation) | `23503` | `Constraint` |
//! | Database (check violation) | `23514` | `Constraint` |
//! | Database (other) | any | `Database` |
//! | PoolClosed / PoolTimedOut / Io | n/a | `Unavailable` |
//! | Other | n/a | `Database` |
//!
//! ## Location columns
//!
//! An item's location is stored as two nullable columns guarded by check
//! constraints. Rows are converted to [`Location`] on the way out; a row
//! with neither or both columns set is reported as `Corrupt`.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{instrument, Span};
use uuid::Uuid;

use roomstock_core::{CompartmentId, ItemId, MovementId, RoomId, StorageUnitId, UserId};
use roomstock_inventory::search::{Page, Window};
use roomstock_inventory::{
    Compartment, Item, ItemMovement, ItemStatus, Location, LocationRef, Placement,
    ResolvedPlacement, Room, StorageUnit,
};

use super::r#trait::{
    InventoryStore, ItemFilter, ItemListFilter, ItemPage, LayoutScope, ProjectMatch, StoreError,
    StoreResult, StoreTx, TagScope,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS rooms (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        building TEXT,
        notes TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS storage_units (
        id UUID PRIMARY KEY,
        room_id UUID NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
        label TEXT NOT NULL,
        unit_type TEXT NOT NULL,
        x DOUBLE PRECISION NOT NULL DEFAULT 0,
        y DOUBLE PRECISION NOT NULL DEFAULT 0,
        width DOUBLE PRECISION NOT NULL DEFAULT 100 CHECK (width > 0),
        height DOUBLE PRECISION NOT NULL DEFAULT 100 CHECK (height > 0),
        rotation INTEGER NOT NULL DEFAULT 0 CHECK (rotation IN (0, 90, 180, 270)),
        notes TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS compartments (
        id UUID PRIMARY KEY,
        storage_unit_id UUID NOT NULL REFERENCES storage_units(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        index_order INTEGER NOT NULL DEFAULT 0 CHECK (index_order >= 0),
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS items (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        unit_catalog_number TEXT,
        catalog_number TEXT,
        serial_number TEXT,
        owned_by TEXT,
        description TEXT,
        quantity INTEGER NOT NULL DEFAULT 1 CHECK (quantity >= 0),
        projects JSONB NOT NULL DEFAULT '[]'::jsonb,
        storage_unit_id UUID REFERENCES storage_units(id),
        compartment_id UUID REFERENCES compartments(id),
        status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'deleted')),
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        deleted_at TIMESTAMPTZ,
        CONSTRAINT items_single_location
            CHECK (NOT (storage_unit_id IS NOT NULL AND compartment_id IS NOT NULL)),
        CONSTRAINT items_active_has_location
            CHECK (status = 'deleted' OR storage_unit_id IS NOT NULL OR compartment_id IS NOT NULL),
        CONSTRAINT items_deleted_at_matches_status
            CHECK ((status = 'deleted') = (deleted_at IS NOT NULL))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS item_movements (
        id UUID PRIMARY KEY,
        item_id UUID NOT NULL,
        user_id UUID,
        from_storage_unit_id UUID,
        from_compartment_id UUID,
        to_storage_unit_id UUID,
        to_compartment_id UUID,
        reason TEXT,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_storage_units_room_id ON storage_units (room_id)",
    "CREATE INDEX IF NOT EXISTS idx_compartments_storage_unit_id ON compartments (storage_unit_id)",
    "CREATE INDEX IF NOT EXISTS idx_items_storage_unit_id ON items (storage_unit_id)",
    "CREATE INDEX IF NOT EXISTS idx_items_compartment_id ON items (compartment_id)",
    "CREATE INDEX IF NOT EXISTS idx_items_status ON items (status)",
    "CREATE INDEX IF NOT EXISTS idx_items_name ON items (name)",
    "CREATE INDEX IF NOT EXISTS idx_item_movements_item_id ON item_movements (item_id, created_at)",
];

const ITEM_COLUMNS: &str = r#"
    i.id, i.name, i.unit_catalog_number, i.catalog_number, i.serial_number,
    i.owned_by, i.description, i.quantity, i.projects, i.storage_unit_id,
    i.compartment_id, i.status, i.created_at, i.updated_at, i.deleted_at
"#;

const ITEM_ORDER: &str = r#"ORDER BY i.name COLLATE "C", i.created_at, i.id"#;

/// Items joined to their effective storage unit (direct, or through the
/// compartment) so room and unit filters see both placements.
const SEARCH_FROM: &str = r#"
    FROM items i
    LEFT JOIN compartments c ON c.id = i.compartment_id
    LEFT JOIN storage_units su ON su.id = COALESCE(i.storage_unit_id, c.storage_unit_id)
    WHERE i.status = $1
        AND ($2::uuid IS NULL OR su.room_id = $2)
        AND ($3::uuid IS NULL OR su.id = $3)
        AND (
            $4::text IS NULL
            OR i.name ILIKE $4
            OR i.unit_catalog_number ILIKE $4
            OR i.catalog_number ILIKE $4
            OR i.serial_number ILIKE $4
            OR i.description ILIKE $4
            OR i.owned_by ILIKE $4
            OR su.label ILIKE $4
            OR ($5::boolean AND EXISTS (
                SELECT 1 FROM jsonb_array_elements_text(i.projects) AS tag(value)
                WHERE tag.value ILIKE $4
            ))
            OR i.id = ANY($6::uuid[])
        )
"#;

const LIST_FROM: &str = r#"
    FROM items i
    WHERE i.status = $1
        AND ($2::uuid IS NULL OR i.storage_unit_id = $2)
        AND ($3::uuid IS NULL OR i.compartment_id = $3)
"#;

/// Layout rows beneath a node, locked before the node is deleted.
const ROOM_CHILDREN: &[&str] = &[
    "SELECT id FROM storage_units WHERE room_id = $1 ORDER BY id FOR UPDATE",
    r#"
    SELECT c.id
    FROM compartments c
    JOIN storage_units u ON u.id = c.storage_unit_id
    WHERE u.room_id = $1
    ORDER BY c.id
    FOR UPDATE OF c
    "#,
];
const UNIT_CHILDREN: &[&str] =
    &["SELECT id FROM compartments WHERE storage_unit_id = $1 ORDER BY id FOR UPDATE"];
const NO_CHILDREN: &[&str] = &[];

/// Postgres-backed inventory store.
///
/// Thread-safe: all access goes through the SQLx pool. Mutations run in
/// [`PostgresTx`]; item rows touched by a mutation are locked with
/// `FOR UPDATE` so concurrent moves of one item serialise. Layout rows a
/// transaction reads are held `FOR KEY SHARE`, and a layout delete locks
/// its subtree `FOR UPDATE` first, so an item write and a delete of its
/// destination never interleave.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    #[instrument(skip(database_url), err)]
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn fetch_units(&self, ids: &[Uuid]) -> StoreResult<Vec<StorageUnit>> {
        let rows = sqlx::query(
            r#"
            SELECT id, room_id, label, unit_type, x, y, width, height, rotation, notes,
                   created_at, updated_at
            FROM storage_units
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_units", e))?;
        rows.iter().map(decode_unit).collect()
    }
}

/// Escape LIKE wildcards and wrap in `%...%`.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

struct SearchParams {
    status: &'static str,
    room_id: Option<Uuid>,
    storage_unit_id: Option<Uuid>,
    pattern: Option<String>,
    pushdown: bool,
    ids: Vec<Uuid>,
}

impl SearchParams {
    fn new(filter: &ItemFilter, supports_pushdown: bool) -> Self {
        let ids = match &filter.projects {
            ProjectMatch::Ids(ids) => ids.iter().map(|id| *id.as_uuid()).collect(),
            _ => Vec::new(),
        };
        Self {
            status: filter.status.as_str(),
            room_id: filter.room_id.map(|id| *id.as_uuid()),
            storage_unit_id: filter.storage_unit_id.map(|id| *id.as_uuid()),
            pattern: filter.text.as_deref().map(like_pattern),
            pushdown: supports_pushdown && filter.projects == ProjectMatch::InQuery,
            ids,
        }
    }

    fn bind<'q>(&'q self, query: Query<'q, Postgres, PgArguments>) -> Query<'q, Postgres, PgArguments> {
        query
            .bind(self.status)
            .bind(self.room_id)
            .bind(self.storage_unit_id)
            .bind(self.pattern.as_deref())
            .bind(self.pushdown)
            .bind(&self.ids)
    }
}

fn subtree_predicate(scope: LayoutScope) -> (&'static str, Uuid) {
    match scope {
        LayoutScope::Compartment(id) => ("compartment_id = $1", *id.as_uuid()),
        LayoutScope::StorageUnit(id) => (
            r#"(storage_unit_id = $1
                OR compartment_id IN (SELECT id FROM compartments WHERE storage_unit_id = $1))"#,
            *id.as_uuid(),
        ),
        LayoutScope::Room(id) => (
            r#"(storage_unit_id IN (SELECT id FROM storage_units WHERE room_id = $1)
                OR compartment_id IN (
                    SELECT c.id FROM compartments c
                    JOIN storage_units su ON su.id = c.storage_unit_id
                    WHERE su.room_id = $1
                ))"#,
            *id.as_uuid(),
        ),
    }
}

#[async_trait::async_trait]
impl InventoryStore for PostgresInventoryStore {
    type Tx = PostgresTx;

    fn supports_structured_substring_match(&self) -> bool {
        true
    }

    async fn begin(&self) -> StoreResult<Self::Tx> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PostgresTx { tx })
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn get_item(&self, id: ItemId) -> StoreResult<Option<Item>> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items i WHERE i.id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_item", e))?;
        row.as_ref().map(decode_item).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_items(&self, filter: ItemListFilter, window: Window) -> StoreResult<ItemPage> {
        let status = filter.status.as_str();
        let unit = filter.storage_unit_id.map(|id| *id.as_uuid());
        let compartment = filter.compartment_id.map(|id| *id.as_uuid());

        let count_row = sqlx::query(&format!("SELECT COUNT(*) AS total {LIST_FROM}"))
            .bind(status)
            .bind(unit)
            .bind(compartment)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_items", e))?;
        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| StoreError::Corrupt(format!("failed to read total: {e}")))?;

        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} {LIST_FROM} {ITEM_ORDER} LIMIT $4 OFFSET $5"
        ))
        .bind(status)
        .bind(unit)
        .bind(compartment)
        // LIMIT NULL is LIMIT ALL.
        .bind(window.limit().map(i64::from))
        .bind(i64::from(window.offset()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_items", e))?;

        Ok(ItemPage {
            items: rows.iter().map(decode_item).collect::<StoreResult<_>>()?,
            total: total as u64,
        })
    }

    #[instrument(skip(self, filter), fields(total = tracing::field::Empty), err)]
    async fn search_items(&self, filter: &ItemFilter, page: Page) -> StoreResult<ItemPage> {
        let params = SearchParams::new(filter, true);

        let count_sql = format!("SELECT COUNT(*) AS total {SEARCH_FROM}");
        let count_row = params
            .bind(sqlx::query(&count_sql))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_search", e))?;
        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| StoreError::Corrupt(format!("failed to read total: {e}")))?;
        Span::current().record("total", total);

        let page_sql = format!("SELECT {ITEM_COLUMNS} {SEARCH_FROM} {ITEM_ORDER} LIMIT $7 OFFSET $8");
        let rows = params
            .bind(sqlx::query(&page_sql))
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("search_items", e))?;

        Ok(ItemPage {
            items: rows.iter().map(decode_item).collect::<StoreResult<_>>()?,
            total: total as u64,
        })
    }

    async fn tagged_items(&self, scope: TagScope) -> StoreResult<Vec<(ItemId, Vec<String>)>> {
        let rows = sqlx::query(
            r#"
            SELECT i.id, i.projects
            FROM items i
            LEFT JOIN compartments c ON c.id = i.compartment_id
            LEFT JOIN storage_units su ON su.id = COALESCE(i.storage_unit_id, c.storage_unit_id)
            WHERE i.status = $1
                AND ($2::uuid IS NULL OR su.room_id = $2)
                AND ($3::uuid IS NULL OR su.id = $3)
                AND jsonb_array_length(i.projects) > 0
            ORDER BY i.created_at, i.id
            "#,
        )
        .bind(scope.status.as_str())
        .bind(scope.room_id.map(|id| *id.as_uuid()))
        .bind(scope.storage_unit_id.map(|id| *id.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("tagged_items", e))?;

        rows.iter()
            .map(|row| {
                let id: Uuid = row.try_get("id").map_err(corrupt("items.id"))?;
                let Json(tags): Json<Vec<String>> =
                    row.try_get("projects").map_err(corrupt("items.projects"))?;
                Ok((ItemId::from_uuid(id), tags))
            })
            .collect()
    }

    #[instrument(skip(self, locations), fields(count = locations.len()), err)]
    async fn resolve_placements(
        &self,
        locations: &[Location],
    ) -> StoreResult<HashMap<Location, ResolvedPlacement>> {
        let compartment_ids: Vec<Uuid> = locations
            .iter()
            .filter_map(Location::compartment_id)
            .map(|id| *id.as_uuid())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let compartments: HashMap<CompartmentId, Compartment> = if compartment_ids.is_empty() {
            HashMap::new()
        } else {
            let rows = sqlx::query(
                r#"
                SELECT id, storage_unit_id, name, index_order, created_at, updated_at
                FROM compartments
                WHERE id = ANY($1)
                "#,
            )
            .bind(&compartment_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("resolve_compartments", e))?;
            rows.iter()
                .map(|row| decode_compartment(row).map(|c| (c.id, c)))
                .collect::<StoreResult<_>>()?
        };

        let unit_ids: Vec<Uuid> = locations
            .iter()
            .filter_map(Location::storage_unit_id)
            .chain(compartments.values().map(|c| c.storage_unit_id))
            .map(|id| *id.as_uuid())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let units: HashMap<StorageUnitId, StorageUnit> = if unit_ids.is_empty() {
            HashMap::new()
        } else {
            self.fetch_units(&unit_ids)
                .await?
                .into_iter()
                .map(|u| (u.id, u))
                .collect()
        };

        let room_ids: Vec<Uuid> = units
            .values()
            .map(|u| *u.room_id.as_uuid())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let rooms: HashMap<RoomId, Room> = if room_ids.is_empty() {
            HashMap::new()
        } else {
            let rows = sqlx::query(
                r#"
                SELECT id, name, building, notes, created_at, updated_at
                FROM rooms
                WHERE id = ANY($1)
                "#,
            )
            .bind(&room_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("resolve_rooms", e))?;
            rows.iter()
                .map(|row| decode_room(row).map(|r| (r.id, r)))
                .collect::<StoreResult<_>>()?
        };

        Ok(locations
            .iter()
            .map(|location| {
                let compartment = location
                    .compartment_id()
                    .and_then(|id| compartments.get(&id))
                    .cloned();
                let unit_id = match location {
                    Location::StorageUnit(id) => Some(*id),
                    Location::Compartment(_) => compartment.as_ref().map(|c| c.storage_unit_id),
                };
                let storage_unit = unit_id.and_then(|id| units.get(&id)).cloned();
                let room = storage_unit
                    .as_ref()
                    .and_then(|u| rooms.get(&u.room_id))
                    .cloned();
                (
                    *location,
                    ResolvedPlacement {
                        room,
                        storage_unit,
                        compartment,
                    },
                )
            })
            .collect())
    }

    #[instrument(skip(self), fields(item_id = %item_id), err)]
    async fn movements_for(&self, item_id: ItemId) -> StoreResult<Vec<ItemMovement>> {
        let rows = sqlx::query(
            r#"
            SELECT id, item_id, user_id, from_storage_unit_id, from_compartment_id,
                   to_storage_unit_id, to_compartment_id, reason, created_at
            FROM item_movements
            WHERE item_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(item_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("movements_for", e))?;

        rows.iter()
            .map(|row| {
                MovementRow::from_row(row)
                    .map(ItemMovement::from)
                    .map_err(corrupt("item_movements"))
            })
            .collect()
    }

    async fn get_room(&self, id: RoomId) -> StoreResult<Option<Room>> {
        let row = sqlx::query(
            "SELECT id, name, building, notes, created_at, updated_at FROM rooms WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_room", e))?;
        row.as_ref().map(decode_room).transpose()
    }

    async fn list_rooms(&self) -> StoreResult<Vec<Room>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, building, notes, created_at, updated_at
            FROM rooms
            ORDER BY name COLLATE "C", created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_rooms", e))?;
        rows.iter().map(decode_room).collect()
    }

    async fn get_storage_unit(&self, id: StorageUnitId) -> StoreResult<Option<StorageUnit>> {
        Ok(self.fetch_units(&[*id.as_uuid()]).await?.into_iter().next())
    }

    async fn list_storage_units(&self, room_id: Option<RoomId>) -> StoreResult<Vec<StorageUnit>> {
        let rows = sqlx::query(
            r#"
            SELECT id, room_id, label, unit_type, x, y, width, height, rotation, notes,
                   created_at, updated_at
            FROM storage_units
            WHERE ($1::uuid IS NULL OR room_id = $1)
            ORDER BY label COLLATE "C", created_at, id
            "#,
        )
        .bind(room_id.map(|id| *id.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_storage_units", e))?;
        rows.iter().map(decode_unit).collect()
    }

    async fn get_compartment(&self, id: CompartmentId) -> StoreResult<Option<Compartment>> {
        let row = sqlx::query(
            r#"
            SELECT id, storage_unit_id, name, index_order, created_at, updated_at
            FROM compartments
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_compartment", e))?;
        row.as_ref().map(decode_compartment).transpose()
    }

    async fn list_compartments(
        &self,
        storage_unit_id: Option<StorageUnitId>,
    ) -> StoreResult<Vec<Compartment>> {
        let rows = sqlx::query(
            r#"
            SELECT id, storage_unit_id, name, index_order, created_at, updated_at
            FROM compartments
            WHERE ($1::uuid IS NULL OR storage_unit_id = $1)
            ORDER BY index_order, created_at, id
            "#,
        )
        .bind(storage_unit_id.map(|id| *id.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_compartments", e))?;
        rows.iter().map(decode_compartment).collect()
    }
}

/// An open Postgres transaction. Dropping it rolls back.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTx {
    async fn execute_expecting_row(
        &mut self,
        operation: &str,
        what: String,
        query: Query<'_, Postgres, PgArguments>,
    ) -> StoreResult<()> {
        let result = query
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Constraint(format!("{what} does not exist")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl StoreTx for PostgresTx {
    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn lock_item(&mut self, id: ItemId) -> StoreResult<Option<Item>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items i WHERE i.id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_item", e))?;
        row.as_ref().map(decode_item).transpose()
    }

    #[instrument(skip(self), fields(storage_unit_id = %unit), err)]
    async fn lock_active_items_in_unit(&mut self, unit: StorageUnitId) -> StoreResult<Vec<Item>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM items i
            WHERE i.storage_unit_id = $1 AND i.status = 'active'
            ORDER BY i.created_at, i.id
            FOR UPDATE
            "#
        ))
        .bind(unit.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_active_items_in_unit", e))?;
        rows.iter().map(decode_item).collect()
    }

    async fn get_room(&mut self, id: RoomId) -> StoreResult<Option<Room>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, building, notes, created_at, updated_at
            FROM rooms
            WHERE id = $1
            FOR KEY SHARE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("get_room", e))?;
        row.as_ref().map(decode_room).transpose()
    }

    async fn get_storage_unit(&mut self, id: StorageUnitId) -> StoreResult<Option<StorageUnit>> {
        let row = sqlx::query(
            r#"
            SELECT id, room_id, label, unit_type, x, y, width, height, rotation, notes,
                   created_at, updated_at
            FROM storage_units
            WHERE id = $1
            FOR KEY SHARE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("get_storage_unit", e))?;
        row.as_ref().map(decode_unit).transpose()
    }

    async fn get_compartment(&mut self, id: CompartmentId) -> StoreResult<Option<Compartment>> {
        let row = sqlx::query(
            r#"
            SELECT id, storage_unit_id, name, index_order, created_at, updated_at
            FROM compartments
            WHERE id = $1
            FOR KEY SHARE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("get_compartment", e))?;
        row.as_ref().map(decode_compartment).transpose()
    }

    #[instrument(skip(self), err)]
    async fn lock_layout(&mut self, scope: LayoutScope) -> StoreResult<bool> {
        // FOR UPDATE conflicts with the KEY SHARE taken by the getters above.
        let (node, children, id) = match scope {
            LayoutScope::Room(id) => (
                "SELECT id FROM rooms WHERE id = $1 FOR UPDATE",
                ROOM_CHILDREN,
                *id.as_uuid(),
            ),
            LayoutScope::StorageUnit(id) => (
                "SELECT id FROM storage_units WHERE id = $1 FOR UPDATE",
                UNIT_CHILDREN,
                *id.as_uuid(),
            ),
            LayoutScope::Compartment(id) => (
                "SELECT id FROM compartments WHERE id = $1 FOR UPDATE",
                NO_CHILDREN,
                *id.as_uuid(),
            ),
        };

        let found = sqlx::query(node)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_layout", e))?
            .is_some();
        if !found {
            return Ok(false);
        }
        for &sql in children {
            sqlx::query(sql)
                .bind(id)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("lock_layout", e))?;
        }
        Ok(true)
    }

    #[instrument(skip(self, item), fields(item_id = %item.id), err)]
    async fn insert_item(&mut self, item: &Item) -> StoreResult<()> {
        let location = LocationRef::from(item.location);
        sqlx::query(
            r#"
            INSERT INTO items (
                id, name, unit_catalog_number, catalog_number, serial_number, owned_by,
                description, quantity, projects, storage_unit_id, compartment_id, status,
                created_at, updated_at, deleted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(item.unit_catalog_number.as_deref())
        .bind(item.catalog_number.as_deref())
        .bind(item.serial_number.as_deref())
        .bind(item.owned_by.as_deref())
        .bind(item.description.as_deref())
        .bind(item.quantity)
        .bind(Json(&item.projects))
        .bind(location.storage_unit_id.map(|id| *id.as_uuid()))
        .bind(location.compartment_id.map(|id| *id.as_uuid()))
        .bind(item.status.as_str())
        .bind(item.created_at)
        .bind(item.updated_at)
        .bind(item.deleted_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
        Ok(())
    }

    #[instrument(skip(self, item), fields(item_id = %item.id), err)]
    async fn update_item(&mut self, item: &Item) -> StoreResult<()> {
        let location = LocationRef::from(item.location);
        let query = sqlx::query(
            r#"
            UPDATE items SET
                name = $2,
                unit_catalog_number = $3,
                catalog_number = $4,
                serial_number = $5,
                owned_by = $6,
                description = $7,
                quantity = $8,
                projects = $9,
                storage_unit_id = $10,
                compartment_id = $11,
                status = $12,
                updated_at = $13,
                deleted_at = $14
            WHERE id = $1
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(item.unit_catalog_number.as_deref())
        .bind(item.catalog_number.as_deref())
        .bind(item.serial_number.as_deref())
        .bind(item.owned_by.as_deref())
        .bind(item.description.as_deref())
        .bind(item.quantity)
        .bind(Json(&item.projects))
        .bind(location.storage_unit_id.map(|id| *id.as_uuid()))
        .bind(location.compartment_id.map(|id| *id.as_uuid()))
        .bind(item.status.as_str())
        .bind(item.updated_at)
        .bind(item.deleted_at);
        self.execute_expecting_row("update_item", format!("item {}", item.id), query)
            .await
    }

    #[instrument(skip(self, movement), fields(movement_id = %movement.id, item_id = %movement.item_id), err)]
    async fn insert_movement(&mut self, movement: &ItemMovement) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO item_movements (
                id, item_id, user_id, from_storage_unit_id, from_compartment_id,
                to_storage_unit_id, to_compartment_id, reason, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(movement.item_id.as_uuid())
        .bind(movement.user_id.map(|id| *id.as_uuid()))
        .bind(movement.from_storage_unit_id.map(|id| *id.as_uuid()))
        .bind(movement.from_compartment_id.map(|id| *id.as_uuid()))
        .bind(movement.to_storage_unit_id.map(|id| *id.as_uuid()))
        .bind(movement.to_compartment_id.map(|id| *id.as_uuid()))
        .bind(movement.reason.as_deref())
        .bind(movement.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_movement", e))?;
        Ok(())
    }

    async fn count_active_items(&mut self, scope: LayoutScope) -> StoreResult<u64> {
        let (predicate, id) = subtree_predicate(scope);
        let row = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM items WHERE status = 'active' AND {predicate}"
        ))
        .bind(id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("count_active_items", e))?;
        let total: i64 = row
            .try_get("total")
            .map_err(|e| StoreError::Corrupt(format!("failed to read total: {e}")))?;
        Ok(total as u64)
    }

    #[instrument(skip(self), err)]
    async fn purge_deleted_items(&mut self, scope: LayoutScope) -> StoreResult<u64> {
        let (predicate, id) = subtree_predicate(scope);
        let result = sqlx::query(&format!(
            "DELETE FROM items WHERE status = 'deleted' AND {predicate}"
        ))
        .bind(id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("purge_deleted_items", e))?;
        Ok(result.rows_affected())
    }

    async fn insert_room(&mut self, room: &Room) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rooms (id, name, building, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(room.id.as_uuid())
        .bind(&room.name)
        .bind(room.building.as_deref())
        .bind(room.notes.as_deref())
        .bind(room.created_at)
        .bind(room.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_room", e))?;
        Ok(())
    }

    async fn update_room(&mut self, room: &Room) -> StoreResult<()> {
        let query = sqlx::query(
            "UPDATE rooms SET name = $2, building = $3, notes = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(room.id.as_uuid())
        .bind(&room.name)
        .bind(room.building.as_deref())
        .bind(room.notes.as_deref())
        .bind(room.updated_at);
        self.execute_expecting_row("update_room", format!("room {}", room.id), query)
            .await
    }

    async fn insert_storage_unit(&mut self, unit: &StorageUnit) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO storage_units (
                id, room_id, label, unit_type, x, y, width, height, rotation, notes,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(unit.id.as_uuid())
        .bind(unit.room_id.as_uuid())
        .bind(&unit.label)
        .bind(unit.kind.as_str())
        .bind(unit.placement.x)
        .bind(unit.placement.y)
        .bind(unit.placement.width)
        .bind(unit.placement.height)
        .bind(unit.placement.rotation)
        .bind(unit.notes.as_deref())
        .bind(unit.created_at)
        .bind(unit.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_storage_unit", e))?;
        Ok(())
    }

    async fn update_storage_unit(&mut self, unit: &StorageUnit) -> StoreResult<()> {
        let query = sqlx::query(
            r#"
            UPDATE storage_units SET
                label = $2,
                unit_type = $3,
                x = $4,
                y = $5,
                width = $6,
                height = $7,
                rotation = $8,
                notes = $9,
                updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(unit.id.as_uuid())
        .bind(&unit.label)
        .bind(unit.kind.as_str())
        .bind(unit.placement.x)
        .bind(unit.placement.y)
        .bind(unit.placement.width)
        .bind(unit.placement.height)
        .bind(unit.placement.rotation)
        .bind(unit.notes.as_deref())
        .bind(unit.updated_at);
        self.execute_expecting_row("update_storage_unit", format!("storage unit {}", unit.id), query)
            .await
    }

    async fn insert_compartment(&mut self, compartment: &Compartment) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO compartments (id, storage_unit_id, name, index_order, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(compartment.id.as_uuid())
        .bind(compartment.storage_unit_id.as_uuid())
        .bind(&compartment.name)
        .bind(compartment.index_order)
        .bind(compartment.created_at)
        .bind(compartment.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_compartment", e))?;
        Ok(())
    }

    async fn update_compartment(&mut self, compartment: &Compartment) -> StoreResult<()> {
        let query = sqlx::query(
            "UPDATE compartments SET name = $2, index_order = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(compartment.id.as_uuid())
        .bind(&compartment.name)
        .bind(compartment.index_order)
        .bind(compartment.updated_at);
        self.execute_expecting_row(
            "update_compartment",
            format!("compartment {}", compartment.id),
            query,
        )
        .await
    }

    #[instrument(skip(self), err)]
    async fn delete_layout(&mut self, scope: LayoutScope) -> StoreResult<()> {
        let (sql, id) = match scope {
            LayoutScope::Room(id) => ("DELETE FROM rooms WHERE id = $1", *id.as_uuid()),
            LayoutScope::StorageUnit(id) => ("DELETE FROM storage_units WHERE id = $1", *id.as_uuid()),
            LayoutScope::Compartment(id) => ("DELETE FROM compartments WHERE id = $1", *id.as_uuid()),
        };
        sqlx::query(sql)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_layout", e))?;
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("{} in {}", db_err.message(), operation);
            match db_err.code().as_deref() {
                // unique, foreign key, check
                Some("23505") | Some("23503") | Some("23514") => StoreError::Constraint(msg),
                _ => StoreError::Database {
                    operation: operation.to_string(),
                    message: db_err.message().to_string(),
                },
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool unavailable in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {operation}: {e}")),
        other => StoreError::Database {
            operation: operation.to_string(),
            message: other.to_string(),
        },
    }
}

fn corrupt(what: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| StoreError::Corrupt(format!("failed to decode {what}: {e}"))
}

// SQLx row types

#[derive(Debug)]
struct ItemRow {
    id: Uuid,
    name: String,
    unit_catalog_number: Option<String>,
    catalog_number: Option<String>,
    serial_number: Option<String>,
    owned_by: Option<String>,
    description: Option<String>,
    quantity: i32,
    projects: Json<Vec<String>>,
    storage_unit_id: Option<Uuid>,
    compartment_id: Option<Uuid>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for ItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            unit_catalog_number: row.try_get("unit_catalog_number")?,
            catalog_number: row.try_get("catalog_number")?,
            serial_number: row.try_get("serial_number")?,
            owned_by: row.try_get("owned_by")?,
            description: row.try_get("description")?,
            quantity: row.try_get("quantity")?,
            projects: row.try_get("projects")?,
            storage_unit_id: row.try_get("storage_unit_id")?,
            compartment_id: row.try_get("compartment_id")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

impl TryFrom<ItemRow> for Item {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let location = LocationRef::new(
            row.storage_unit_id.map(StorageUnitId::from_uuid),
            row.compartment_id.map(CompartmentId::from_uuid),
        )
        .into_location()
        .map_err(|e| StoreError::Corrupt(format!("item {}: {e}", row.id)))?;
        let status: ItemStatus = row
            .status
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("item {}: {e}", row.id)))?;

        Ok(Item {
            id: ItemId::from_uuid(row.id),
            name: row.name,
            unit_catalog_number: row.unit_catalog_number,
            catalog_number: row.catalog_number,
            serial_number: row.serial_number,
            owned_by: row.owned_by,
            description: row.description,
            quantity: row.quantity,
            projects: row.projects.0,
            location,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

fn decode_item(row: &PgRow) -> StoreResult<Item> {
    ItemRow::from_row(row).map_err(corrupt("items"))?.try_into()
}

#[derive(Debug)]
struct MovementRow {
    id: Uuid,
    item_id: Uuid,
    user_id: Option<Uuid>,
    from_storage_unit_id: Option<Uuid>,
    from_compartment_id: Option<Uuid>,
    to_storage_unit_id: Option<Uuid>,
    to_compartment_id: Option<Uuid>,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for MovementRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            item_id: row.try_get("item_id")?,
            user_id: row.try_get("user_id")?,
            from_storage_unit_id: row.try_get("from_storage_unit_id")?,
            from_compartment_id: row.try_get("from_compartment_id")?,
            to_storage_unit_id: row.try_get("to_storage_unit_id")?,
            to_compartment_id: row.try_get("to_compartment_id")?,
            reason: row.try_get("reason")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<MovementRow> for ItemMovement {
    fn from(row: MovementRow) -> Self {
        ItemMovement {
            id: MovementId::from_uuid(row.id),
            item_id: ItemId::from_uuid(row.item_id),
            user_id: row.user_id.map(UserId::from_uuid),
            from_storage_unit_id: row.from_storage_unit_id.map(StorageUnitId::from_uuid),
            from_compartment_id: row.from_compartment_id.map(CompartmentId::from_uuid),
            to_storage_unit_id: row.to_storage_unit_id.map(StorageUnitId::from_uuid),
            to_compartment_id: row.to_compartment_id.map(CompartmentId::from_uuid),
            reason: row.reason,
            created_at: row.created_at,
        }
    }
}

fn decode_room(row: &PgRow) -> StoreResult<Room> {
    let decode = || -> Result<Room, sqlx::Error> {
        Ok(Room {
            id: RoomId::from_uuid(row.try_get("id")?),
            name: row.try_get("name")?,
            building: row.try_get("building")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    };
    decode().map_err(corrupt("rooms"))
}

fn decode_unit(row: &PgRow) -> StoreResult<StorageUnit> {
    let decode = || -> Result<(StorageUnit, String), sqlx::Error> {
        let kind: String = row.try_get("unit_type")?;
        let unit = StorageUnit {
            id: StorageUnitId::from_uuid(row.try_get("id")?),
            room_id: RoomId::from_uuid(row.try_get("room_id")?),
            label: row.try_get("label")?,
            kind: Default::default(),
            placement: Placement {
                x: row.try_get("x")?,
                y: row.try_get("y")?,
                width: row.try_get("width")?,
                height: row.try_get("height")?,
                rotation: row.try_get("rotation")?,
            },
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        };
        Ok((unit, kind))
    };
    let (mut unit, kind) = decode().map_err(corrupt("storage_units"))?;
    unit.kind = kind
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("storage unit {}: {e}", unit.id)))?;
    Ok(unit)
}

fn decode_compartment(row: &PgRow) -> StoreResult<Compartment> {
    let decode = || -> Result<Compartment, sqlx::Error> {
        Ok(Compartment {
            id: CompartmentId::from_uuid(row.try_get("id")?),
            storage_unit_id: StorageUnitId::from_uuid(row.try_get("storage_unit_id")?),
            name: row.try_get("name")?,
            index_order: row.try_get("index_order")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    };
    decode().map_err(corrupt("compartments"))
}
