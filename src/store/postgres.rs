use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, warn};

use super::{AggregateStore, StoreError, TypeScope};
use crate::database::models::{
    Building, BuildingPatch, ChildKind, ChildPatches, Measure, Room, RoomAggregate, RoomChildren,
    RoomPatch, RoomSummary, TypedRow, NO_OCCUPANT,
};
use crate::database::DatabaseManager;

const ROOM_COLUMNS: &str =
    "id, function, occupant, ceiling_area, outlets, wifi_points, fans, ac_units, building_id";

/// PostgreSQL-backed store. Each atomic operation runs in its own transaction on a
/// connection acquired from the injected pool; an uncommitted transaction rolls back on drop.
pub struct PgStore {
    pool: PgPool,
    slow_threshold: Duration,
}

impl PgStore {
    pub fn new(database: &DatabaseManager, slow_query_threshold_ms: u64) -> Self {
        Self {
            pool: database.pool(),
            slow_threshold: Duration::from_millis(slow_query_threshold_ms),
        }
    }

    fn observe(&self, operation: &str, started: Instant) {
        let elapsed = started.elapsed();
        if elapsed > self.slow_threshold {
            warn!("Slow store operation {}: {:?}", operation, elapsed);
        } else {
            debug!("Store operation {} took {:?}", operation, elapsed);
        }
    }
}

async fn building_exists(conn: &mut PgConnection, id: &str) -> Result<bool, StoreError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM buildings WHERE id = $1)")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

async fn select_room(conn: &mut PgConnection, id: &str, for_update: bool) -> Result<Option<Room>, StoreError> {
    let sql = format!(
        "SELECT {} FROM rooms WHERE id = $1{}",
        ROOM_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );
    let room = sqlx::query_as::<_, Room>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(room)
}

async fn select_rows<T: TypedRow>(conn: &mut PgConnection, kind: ChildKind, room_id: &str) -> Result<Vec<T>, StoreError> {
    let sql = format!(
        "SELECT \"{measure}\", {type_col} AS item_type FROM {table} WHERE room_id = $1 ORDER BY id",
        measure = kind.measure_column(),
        type_col = kind.type_column(),
        table = kind.table(),
    );
    let rows = sqlx::query_as::<_, T>(&sql)
        .bind(room_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows)
}

async fn select_children(conn: &mut PgConnection, room_id: &str) -> Result<RoomChildren, StoreError> {
    Ok(RoomChildren {
        doors: select_rows(conn, ChildKind::Door, room_id).await?,
        windows: select_rows(conn, ChildKind::Window, room_id).await?,
        walls: select_rows(conn, ChildKind::Wall, room_id).await?,
        floors: select_rows(conn, ChildKind::Floor, room_id).await?,
        lamps: select_rows(conn, ChildKind::Lamp, room_id).await?,
    })
}

async fn insert_rows<T: TypedRow>(
    conn: &mut PgConnection,
    kind: ChildKind,
    room_id: &str,
    rows: &[T],
) -> Result<(), StoreError> {
    let sql = format!(
        "INSERT INTO {table} (\"{measure}\", {type_col}, room_id) VALUES ($1, $2, $3)",
        table = kind.table(),
        measure = kind.measure_column(),
        type_col = kind.type_column(),
    );
    for row in rows {
        let query = sqlx::query(&sql);
        let query = match row.measure() {
            Measure::Count(n) => query.bind(n),
            Measure::Surface(s) => query.bind(s),
        };
        query
            .bind(row.item_type())
            .bind(room_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn insert_children(conn: &mut PgConnection, room_id: &str, children: &RoomChildren) -> Result<(), StoreError> {
    insert_rows(conn, ChildKind::Door, room_id, &children.doors).await?;
    insert_rows(conn, ChildKind::Window, room_id, &children.windows).await?;
    insert_rows(conn, ChildKind::Wall, room_id, &children.walls).await?;
    insert_rows(conn, ChildKind::Floor, room_id, &children.floors).await?;
    insert_rows(conn, ChildKind::Lamp, room_id, &children.lamps).await?;
    Ok(())
}

/// Delete the rows of `kind` whose type appears in `rows`, then insert `rows`.
async fn replace_by_type<T: TypedRow>(
    conn: &mut PgConnection,
    kind: ChildKind,
    room_id: &str,
    rows: &[T],
) -> Result<u64, StoreError> {
    let scope = TypeScope::of(rows);
    if scope.is_empty() {
        return Ok(0);
    }

    let sql = format!(
        "DELETE FROM {} WHERE room_id = $1 AND {} = ANY($2)",
        kind.table(),
        kind.type_column()
    );
    let removed = sqlx::query(&sql)
        .bind(room_id)
        .bind(scope.types())
        .execute(&mut *conn)
        .await?
        .rows_affected();

    insert_rows(conn, kind, room_id, rows).await?;
    debug!(
        "Replaced {} {} row(s) of {} type(s) with {} for room {}",
        removed,
        kind.table(),
        scope.len(),
        rows.len(),
        room_id
    );
    Ok(removed)
}

/// Delete every child row of the room, then the room row. Returns rooms deleted (0 or 1).
async fn delete_room_tree(conn: &mut PgConnection, room_id: &str) -> Result<u64, StoreError> {
    for kind in ChildKind::ALL {
        let sql = format!("DELETE FROM {} WHERE room_id = $1", kind.table());
        sqlx::query(&sql).bind(room_id).execute(&mut *conn).await?;
    }
    let deleted = sqlx::query("DELETE FROM rooms WHERE id = $1")
        .bind(room_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(deleted)
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl AggregateStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_buildings(&self) -> Result<Vec<Building>, StoreError> {
        let buildings = sqlx::query_as::<_, Building>("SELECT id, site, designation FROM buildings ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(buildings)
    }

    async fn fetch_building(&self, id: &str) -> Result<Option<Building>, StoreError> {
        let building = sqlx::query_as::<_, Building>("SELECT id, site, designation FROM buildings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(building)
    }

    async fn create_building(&self, building: Building) -> Result<Building, StoreError> {
        let created = sqlx::query_as::<_, Building>(
            "INSERT INTO buildings (id, site, designation) VALUES ($1, $2, $3)
             RETURNING id, site, designation",
        )
        .bind(&building.id)
        .bind(&building.site)
        .bind(&building.designation)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::Conflict(_) => StoreError::Conflict(format!("Building '{}' already exists", building.id)),
            other => other,
        })?;
        Ok(created)
    }

    async fn update_building(&self, id: &str, patch: &BuildingPatch) -> Result<Building, StoreError> {
        let updated = sqlx::query_as::<_, Building>(
            "UPDATE buildings
             SET site = COALESCE($2, site), designation = COALESCE($3, designation)
             WHERE id = $1
             RETURNING id, site, designation",
        )
        .bind(id)
        .bind(patch.site.as_deref())
        .bind(patch.designation.as_deref())
        .fetch_optional(&self.pool)
        .await?;
        updated.ok_or_else(|| StoreError::NotFound(format!("Building '{}' not found", id)))
    }

    async fn delete_building_cascade(&self, id: &str) -> Result<u64, StoreError> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;

        let locked: Option<String> = sqlx::query_scalar("SELECT id FROM buildings WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(StoreError::NotFound(format!("Building '{}' not found", id)));
        }

        let room_ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM rooms WHERE building_id = $1 ORDER BY id FOR UPDATE")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        let mut rooms_deleted = 0;
        for room_id in &room_ids {
            rooms_deleted += delete_room_tree(&mut tx, room_id).await?;
        }

        sqlx::query("DELETE FROM buildings WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.observe("delete_building_cascade", started);
        Ok(rooms_deleted)
    }

    async fn list_room_ids(&self, building_id: &str) -> Result<Vec<String>, StoreError> {
        let ids = sqlx::query_scalar("SELECT id FROM rooms WHERE building_id = $1 ORDER BY id")
            .bind(building_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn rooms_by_building(&self, building_id: &str) -> Result<Vec<RoomSummary>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        if !building_exists(&mut conn, building_id).await? {
            return Err(StoreError::NotFound(format!("Building '{}' not found", building_id)));
        }

        let rooms = sqlx::query_as::<_, RoomSummary>(
            "SELECT id, building_id, function, occupant FROM rooms WHERE building_id = $1 ORDER BY id",
        )
        .bind(building_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rooms)
    }

    async fn search_rooms(&self, term: &str) -> Result<Vec<RoomSummary>, StoreError> {
        let rooms = sqlx::query_as::<_, RoomSummary>(
            "SELECT id, building_id, function, occupant FROM rooms
             WHERE id ILIKE $1 OR function ILIKE $1 OR COALESCE(occupant, $2) ILIKE $1
             ORDER BY building_id, id",
        )
        .bind(escape_like(term))
        .bind(NO_OCCUPANT)
        .fetch_all(&self.pool)
        .await?;
        Ok(rooms)
    }

    async fn fetch_room(&self, id: &str) -> Result<Option<Room>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        select_room(&mut conn, id, false).await
    }

    async fn fetch_children(&self, id: &str) -> Result<RoomChildren, StoreError> {
        let mut conn = self.pool.acquire().await?;
        select_children(&mut conn, id).await
    }

    async fn create_aggregate(&self, room: Room, children: RoomChildren) -> Result<(), StoreError> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;

        if !building_exists(&mut tx, &room.building_id).await? {
            return Err(StoreError::NotFound(format!("Building '{}' not found", room.building_id)));
        }

        let sql = format!(
            "INSERT INTO rooms ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            ROOM_COLUMNS
        );
        sqlx::query(&sql)
            .bind(&room.id)
            .bind(&room.function)
            .bind(room.occupant.as_deref())
            .bind(room.ceiling_area)
            .bind(room.outlets)
            .bind(room.wifi_points)
            .bind(room.fans)
            .bind(room.ac_units)
            .bind(&room.building_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| match StoreError::from(e) {
                StoreError::Conflict(_) => StoreError::Conflict(format!("Room '{}' already exists", room.id)),
                other => other,
            })?;

        insert_children(&mut tx, &room.id, &children).await?;

        tx.commit().await?;
        self.observe("create_aggregate", started);
        Ok(())
    }

    async fn update_aggregate(
        &self,
        id: &str,
        room_patch: Option<&RoomPatch>,
        children: &ChildPatches,
    ) -> Result<RoomAggregate, StoreError> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;

        if select_room(&mut tx, id, true).await?.is_none() {
            return Err(StoreError::NotFound(format!("Room '{}' not found", id)));
        }

        if let Some(patch) = room_patch.filter(|p| !p.is_empty()) {
            if let Some(building_id) = &patch.building_id {
                if !building_exists(&mut tx, building_id).await? {
                    return Err(StoreError::NotFound(format!("Building '{}' not found", building_id)));
                }
            }

            sqlx::query(
                "UPDATE rooms SET
                    function = COALESCE($2, function),
                    occupant = CASE WHEN $10 THEN $3 ELSE occupant END,
                    ceiling_area = COALESCE($4, ceiling_area),
                    outlets = COALESCE($5, outlets),
                    wifi_points = COALESCE($6, wifi_points),
                    fans = COALESCE($7, fans),
                    ac_units = COALESCE($8, ac_units),
                    building_id = COALESCE($9, building_id)
                 WHERE id = $1",
            )
            .bind(id)
            .bind(patch.function.as_deref())
            .bind(patch.occupant.as_ref().and_then(Option::as_deref))
            .bind(patch.ceiling_area)
            .bind(patch.outlets)
            .bind(patch.wifi_points)
            .bind(patch.fans)
            .bind(patch.ac_units)
            .bind(patch.building_id.as_deref())
            .bind(patch.occupant.is_some())
            .execute(&mut *tx)
            .await?;
        }

        if let Some(rows) = &children.doors {
            replace_by_type(&mut tx, ChildKind::Door, id, rows).await?;
        }
        if let Some(rows) = &children.windows {
            replace_by_type(&mut tx, ChildKind::Window, id, rows).await?;
        }
        if let Some(rows) = &children.walls {
            replace_by_type(&mut tx, ChildKind::Wall, id, rows).await?;
        }
        if let Some(rows) = &children.floors {
            replace_by_type(&mut tx, ChildKind::Floor, id, rows).await?;
        }
        if let Some(rows) = &children.lamps {
            replace_by_type(&mut tx, ChildKind::Lamp, id, rows).await?;
        }

        let room = select_room(&mut tx, id, false)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Room '{}' not found", id)))?;
        let children = select_children(&mut tx, id).await?;

        tx.commit().await?;
        self.observe("update_aggregate", started);
        Ok(RoomAggregate { room, children })
    }

    async fn delete_aggregate(&self, id: &str) -> Result<(), StoreError> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;

        if select_room(&mut tx, id, true).await?.is_none() {
            return Err(StoreError::NotFound(format!("Room '{}' not found", id)));
        }
        delete_room_tree(&mut tx, id).await?;

        tx.commit().await?;
        self.observe("delete_aggregate", started);
        Ok(())
    }
}
