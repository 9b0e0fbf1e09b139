use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::debug;

use super::{replace_scoped, AggregateStore, StoreError};
use crate::database::models::building::{BUILDING_DESIGNATION_MAX, BUILDING_ID_MAX, BUILDING_SITE_MAX};
use crate::database::models::children::CHILD_TYPE_MAX;
use crate::database::models::room::{ROOM_ID_MAX, ROOM_TEXT_MAX};
use crate::database::models::{
    fits_numeric, Building, BuildingPatch, ChildKind, ChildPatches, Measure, Room, RoomAggregate,
    RoomChildren, RoomPatch, RoomSummary, TypedRow, NO_OCCUPANT,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    buildings: BTreeMap<String, Building>,
    rooms: BTreeMap<String, Room>,
    children: BTreeMap<String, RoomChildren>,
}

fn check_len(column: &str, value: &str, max: usize) -> Result<(), StoreError> {
    if value.chars().count() > max {
        return Err(StoreError::Constraint(format!(
            "value too long for {} (max {} characters)",
            column, max
        )));
    }
    Ok(())
}

/// `NUMERIC(10, 2)` rejects what it would have to round or cannot hold
fn check_numeric(column: &str, value: Decimal) -> Result<(), StoreError> {
    if !fits_numeric(value) {
        return Err(StoreError::Constraint(format!("numeric value out of range for {}", column)));
    }
    Ok(())
}

fn check_rows<T: TypedRow>(kind: ChildKind, rows: &[T]) -> Result<(), StoreError> {
    for row in rows {
        check_len(kind.type_column(), row.item_type(), CHILD_TYPE_MAX)?;
        let measure = row.measure();
        if !measure.is_positive() {
            return Err(StoreError::Constraint(format!(
                "{}.{} must be positive",
                kind.table(),
                kind.measure_column()
            )));
        }
        if let Measure::Surface(surface) = measure {
            check_numeric(kind.measure_column(), surface)?;
        }
    }
    Ok(())
}

fn check_children(children: &RoomChildren) -> Result<(), StoreError> {
    check_rows(ChildKind::Door, &children.doors)?;
    check_rows(ChildKind::Window, &children.windows)?;
    check_rows(ChildKind::Wall, &children.walls)?;
    check_rows(ChildKind::Floor, &children.floors)?;
    check_rows(ChildKind::Lamp, &children.lamps)?;
    Ok(())
}

fn summarize(room: &Room) -> RoomSummary {
    RoomSummary {
        id: room.id.clone(),
        building_id: room.building_id.clone(),
        function: room.function.clone(),
        occupant: room.occupant.clone(),
    }
}

impl Tables {
    fn check_building(building: &Building) -> Result<(), StoreError> {
        check_len("buildings.id", &building.id, BUILDING_ID_MAX)?;
        check_len("buildings.site", &building.site, BUILDING_SITE_MAX)?;
        check_len("buildings.designation", &building.designation, BUILDING_DESIGNATION_MAX)
    }

    fn check_room(&self, room: &Room) -> Result<(), StoreError> {
        check_len("rooms.id", &room.id, ROOM_ID_MAX)?;
        check_len("rooms.function", &room.function, ROOM_TEXT_MAX)?;
        if let Some(occupant) = &room.occupant {
            check_len("rooms.occupant", occupant, ROOM_TEXT_MAX)?;
        }
        if room.ceiling_area.is_sign_negative() && !room.ceiling_area.is_zero() {
            return Err(StoreError::Constraint("rooms.ceiling_area must not be negative".into()));
        }
        check_numeric("rooms.ceiling_area", room.ceiling_area)?;
        for (column, value) in [
            ("outlets", room.outlets),
            ("wifi_points", room.wifi_points),
            ("fans", room.fans),
            ("ac_units", room.ac_units),
        ] {
            if value < 0 {
                return Err(StoreError::Constraint(format!("rooms.{} must not be negative", column)));
            }
        }
        if !self.buildings.contains_key(&room.building_id) {
            return Err(StoreError::NotFound(format!("Building '{}' not found", room.building_id)));
        }
        Ok(())
    }

    /// Remove the room's children, then the room. Returns rooms deleted (0 or 1).
    fn delete_room_tree(&mut self, room_id: &str) -> u64 {
        self.children.remove(room_id);
        u64::from(self.rooms.remove(room_id).is_some())
    }

    fn aggregate(&self, id: &str) -> Option<RoomAggregate> {
        let room = self.rooms.get(id)?.clone();
        let children = self.children.get(id).cloned().unwrap_or_default();
        Some(RoomAggregate { room, children })
    }
}

/// Process-local store. Each mutating operation works on a copy of the tables and
/// publishes it only when every step succeeded.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read<R>(&self, op: impl FnOnce(&Tables) -> R) -> R {
        let tables = self.tables.lock().await;
        op(&tables)
    }

    async fn atomically<R>(&self, op: impl FnOnce(&mut Tables) -> Result<R, StoreError>) -> Result<R, StoreError> {
        let mut tables = self.tables.lock().await;
        let mut working = tables.clone();
        let result = op(&mut working)?;
        *tables = working;
        Ok(result)
    }
}

#[async_trait]
impl AggregateStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list_buildings(&self) -> Result<Vec<Building>, StoreError> {
        Ok(self.read(|t| t.buildings.values().cloned().collect()).await)
    }

    async fn fetch_building(&self, id: &str) -> Result<Option<Building>, StoreError> {
        Ok(self.read(|t| t.buildings.get(id).cloned()).await)
    }

    async fn create_building(&self, building: Building) -> Result<Building, StoreError> {
        self.atomically(|t| {
            Tables::check_building(&building)?;
            if t.buildings.contains_key(&building.id) {
                return Err(StoreError::Conflict(format!("Building '{}' already exists", building.id)));
            }
            t.buildings.insert(building.id.clone(), building.clone());
            Ok(building)
        })
        .await
    }

    async fn update_building(&self, id: &str, patch: &BuildingPatch) -> Result<Building, StoreError> {
        self.atomically(|t| {
            let building = t
                .buildings
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(format!("Building '{}' not found", id)))?;
            if let Some(site) = &patch.site {
                building.site = site.clone();
            }
            if let Some(designation) = &patch.designation {
                building.designation = designation.clone();
            }
            Tables::check_building(building)?;
            Ok(building.clone())
        })
        .await
    }

    async fn delete_building_cascade(&self, id: &str) -> Result<u64, StoreError> {
        self.atomically(|t| {
            if !t.buildings.contains_key(id) {
                return Err(StoreError::NotFound(format!("Building '{}' not found", id)));
            }
            let room_ids: Vec<String> = t
                .rooms
                .values()
                .filter(|room| room.building_id == id)
                .map(|room| room.id.clone())
                .collect();

            let mut rooms_deleted = 0;
            for room_id in &room_ids {
                rooms_deleted += t.delete_room_tree(room_id);
            }
            t.buildings.remove(id);
            Ok(rooms_deleted)
        })
        .await
    }

    async fn list_room_ids(&self, building_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .read(|t| {
                t.rooms
                    .values()
                    .filter(|room| room.building_id == building_id)
                    .map(|room| room.id.clone())
                    .collect()
            })
            .await)
    }

    async fn rooms_by_building(&self, building_id: &str) -> Result<Vec<RoomSummary>, StoreError> {
        self.read(|t| {
            if !t.buildings.contains_key(building_id) {
                return Err(StoreError::NotFound(format!("Building '{}' not found", building_id)));
            }
            Ok(t.rooms
                .values()
                .filter(|room| room.building_id == building_id)
                .map(summarize)
                .collect())
        })
        .await
    }

    async fn search_rooms(&self, term: &str) -> Result<Vec<RoomSummary>, StoreError> {
        let needle = term.to_lowercase();
        let hit = |value: &str| value.to_lowercase().contains(&needle);

        let mut rooms: Vec<RoomSummary> = self
            .read(|t| {
                t.rooms
                    .values()
                    .filter(|room| {
                        hit(&room.id)
                            || hit(&room.function)
                            || hit(room.occupant.as_deref().unwrap_or(NO_OCCUPANT))
                    })
                    .map(summarize)
                    .collect()
            })
            .await;
        rooms.sort_by(|a, b| (&a.building_id, &a.id).cmp(&(&b.building_id, &b.id)));
        Ok(rooms)
    }

    async fn fetch_room(&self, id: &str) -> Result<Option<Room>, StoreError> {
        Ok(self.read(|t| t.rooms.get(id).cloned()).await)
    }

    async fn fetch_children(&self, id: &str) -> Result<RoomChildren, StoreError> {
        Ok(self.read(|t| t.children.get(id).cloned().unwrap_or_default()).await)
    }

    async fn create_aggregate(&self, room: Room, children: RoomChildren) -> Result<(), StoreError> {
        self.atomically(|t| {
            t.check_room(&room)?;
            if t.rooms.contains_key(&room.id) {
                return Err(StoreError::Conflict(format!("Room '{}' already exists", room.id)));
            }
            check_children(&children)?;

            debug!("Inserting room {} with {} child row(s)", room.id, children.row_count());
            t.children.insert(room.id.clone(), children);
            t.rooms.insert(room.id.clone(), room);
            Ok(())
        })
        .await
    }

    async fn update_aggregate(
        &self,
        id: &str,
        room_patch: Option<&RoomPatch>,
        patches: &ChildPatches,
    ) -> Result<RoomAggregate, StoreError> {
        self.atomically(|t| {
            let mut room = t
                .rooms
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(format!("Room '{}' not found", id)))?;

            if let Some(patch) = room_patch {
                patch.apply_to(&mut room);
                t.check_room(&room)?;
                t.rooms.insert(id.to_string(), room);
            }

            let children = t.children.entry(id.to_string()).or_default();
            if let Some(rows) = &patches.doors {
                check_rows(ChildKind::Door, rows)?;
                replace_scoped(&mut children.doors, rows);
            }
            if let Some(rows) = &patches.windows {
                check_rows(ChildKind::Window, rows)?;
                replace_scoped(&mut children.windows, rows);
            }
            if let Some(rows) = &patches.walls {
                check_rows(ChildKind::Wall, rows)?;
                replace_scoped(&mut children.walls, rows);
            }
            if let Some(rows) = &patches.floors {
                check_rows(ChildKind::Floor, rows)?;
                replace_scoped(&mut children.floors, rows);
            }
            if let Some(rows) = &patches.lamps {
                check_rows(ChildKind::Lamp, rows)?;
                replace_scoped(&mut children.lamps, rows);
            }

            t.aggregate(id)
                .ok_or_else(|| StoreError::NotFound(format!("Room '{}' not found", id)))
        })
        .await
    }

    async fn delete_aggregate(&self, id: &str) -> Result<(), StoreError> {
        self.atomically(|t| {
            if t.delete_room_tree(id) == 0 {
                return Err(StoreError::NotFound(format!("Room '{}' not found", id)));
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{CountedItem, SurfaceItem};

    fn building(id: &str) -> Building {
        Building {
            id: id.into(),
            site: "Main".into(),
            designation: "Main Campus".into(),
        }
    }

    fn room(id: &str, building_id: &str) -> Room {
        Room {
            id: id.into(),
            function: "Office".into(),
            occupant: None,
            ceiling_area: Decimal::new(200, 1),
            outlets: 2,
            wifi_points: 1,
            fans: 0,
            ac_units: 0,
            building_id: building_id.into(),
        }
    }

    fn furnished() -> RoomChildren {
        RoomChildren {
            doors: vec![CountedItem::new(1, "Wood")],
            windows: vec![CountedItem::new(2, "Double")],
            walls: vec![SurfaceItem::new(Decimal::new(30, 0), "Plaster")],
            floors: vec![SurfaceItem::new(Decimal::new(20, 0), "Tile")],
            lamps: vec![CountedItem::new(3, "LED"), CountedItem::new(1, "Fluorescent")],
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_building(building("B1")).await.unwrap();
        store.create_aggregate(room("S1", "B1"), furnished()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn failed_child_insert_leaves_no_trace() {
        let store = MemoryStore::new();
        store.create_building(building("B1")).await.unwrap();

        let mut children = furnished();
        children.lamps.push(CountedItem::new(0, "Broken"));
        let err = store.create_aggregate(room("S9", "B1"), children).await.unwrap_err();

        assert!(matches!(err, StoreError::Constraint(_)));
        assert!(store.fetch_room("S9").await.unwrap().is_none());
        assert_eq!(store.fetch_children("S9").await.unwrap(), RoomChildren::default());
    }

    #[tokio::test]
    async fn create_requires_existing_building() {
        let store = MemoryStore::new();
        let err = store
            .create_aggregate(room("S1", "NOPE"), RoomChildren::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_room_is_a_conflict_and_keeps_original_children() {
        let store = seeded().await;
        let err = store
            .create_aggregate(room("S1", "B1"), RoomChildren::default())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.fetch_children("S1").await.unwrap(), furnished());
    }

    #[tokio::test]
    async fn type_scoped_replace_keeps_other_lamps() {
        let store = seeded().await;
        let patches = ChildPatches {
            lamps: Some(vec![CountedItem::new(5, "LED")]),
            ..Default::default()
        };
        let aggregate = store.update_aggregate("S1", None, &patches).await.unwrap();

        assert_eq!(aggregate.children.lamps.len(), 2);
        assert!(aggregate.children.lamps.contains(&CountedItem::new(5, "LED")));
        assert!(aggregate.children.lamps.contains(&CountedItem::new(1, "Fluorescent")));
        assert_eq!(aggregate.children.doors, furnished().doors);
    }

    #[tokio::test]
    async fn occupant_only_update_leaves_everything_else() {
        let store = seeded().await;
        let before = store.fetch_aggregate("S1").await.unwrap().unwrap();

        let patch = RoomPatch {
            occupant: Some(Some("Dr. Martin".into())),
            ..Default::default()
        };
        let after = store
            .update_aggregate("S1", Some(&patch), &ChildPatches::default())
            .await
            .unwrap();

        assert_eq!(after.room.occupant.as_deref(), Some("Dr. Martin"));
        assert_eq!(after.room.function, before.room.function);
        assert_eq!(after.room.ceiling_area, before.room.ceiling_area);
        assert_eq!(after.children, before.children);
    }

    #[tokio::test]
    async fn null_occupant_patch_clears_occupant() {
        let store = seeded().await;
        let set = RoomPatch {
            occupant: Some(Some("Dr. Martin".into())),
            ..Default::default()
        };
        store.update_aggregate("S1", Some(&set), &ChildPatches::default()).await.unwrap();

        let clear = RoomPatch {
            occupant: Some(None),
            ..Default::default()
        };
        let after = store
            .update_aggregate("S1", Some(&clear), &ChildPatches::default())
            .await
            .unwrap();

        assert!(after.room.occupant.is_none());
        assert!(store.fetch_room("S1").await.unwrap().unwrap().occupant.is_none());
    }

    #[tokio::test]
    async fn updating_missing_room_creates_nothing() {
        let store = seeded().await;
        let patches = ChildPatches {
            lamps: Some(vec![CountedItem::new(2, "LED")]),
            ..Default::default()
        };
        let err = store
            .update_aggregate("S404", None, &patches)
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.fetch_room("S404").await.unwrap().is_none());
        assert_eq!(store.fetch_children("S404").await.unwrap(), RoomChildren::default());
    }

    #[tokio::test]
    async fn rejects_values_the_numeric_columns_cannot_hold() {
        let store = seeded().await;
        let mut oversized = room("S2", "B1");
        oversized.ceiling_area = Decimal::from(100_000_000u64);
        let err = store.create_aggregate(oversized, furnished()).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));

        let patches = ChildPatches {
            walls: Some(vec![SurfaceItem::new(Decimal::new(4, 3), "Plaster")]),
            ..Default::default()
        };
        let err = store.update_aggregate("S1", None, &patches).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        assert!(store.fetch_room("S2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_update_rolls_back_every_change() {
        let store = seeded().await;
        let before = store.fetch_aggregate("S1").await.unwrap().unwrap();

        let patch = RoomPatch {
            function: Some("Storage".into()),
            ..Default::default()
        };
        let patches = ChildPatches {
            doors: Some(vec![CountedItem::new(2, "Steel")]),
            walls: Some(vec![SurfaceItem::new(Decimal::ZERO, "Plaster")]),
            ..Default::default()
        };
        let err = store.update_aggregate("S1", Some(&patch), &patches).await.unwrap_err();

        assert!(matches!(err, StoreError::Constraint(_)));
        assert_eq!(store.fetch_aggregate("S1").await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn moving_to_missing_building_fails() {
        let store = seeded().await;
        let patch = RoomPatch {
            building_id: Some("B404".into()),
            ..Default::default()
        };
        let err = store
            .update_aggregate("S1", Some(&patch), &ChildPatches::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(store.fetch_room("S1").await.unwrap().unwrap().building_id, "B1");
    }

    #[tokio::test]
    async fn delete_twice_reports_not_found() {
        let store = seeded().await;
        store.delete_aggregate("S1").await.unwrap();
        let err = store.delete_aggregate("S1").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(store.fetch_children("S1").await.unwrap(), RoomChildren::default());
    }

    #[tokio::test]
    async fn building_cascade_removes_rooms_and_children() {
        let store = seeded().await;
        store.create_aggregate(room("S2", "B1"), furnished()).await.unwrap();
        store.create_building(building("B2")).await.unwrap();
        store.create_aggregate(room("T1", "B2"), furnished()).await.unwrap();

        let removed = store.delete_building_cascade("B1").await.unwrap();

        assert_eq!(removed, 2);
        assert!(store.fetch_building("B1").await.unwrap().is_none());
        for id in ["S1", "S2"] {
            assert!(store.fetch_room(id).await.unwrap().is_none());
            assert_eq!(store.fetch_children(id).await.unwrap(), RoomChildren::default());
        }
        assert!(store.fetch_room("T1").await.unwrap().is_some());
        assert_eq!(store.fetch_children("T1").await.unwrap(), furnished());
    }

    #[tokio::test]
    async fn cascade_on_missing_building_is_not_found() {
        let store = MemoryStore::new();
        let err = store.delete_building_cascade("B1").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn search_is_case_insensitive_across_buildings() {
        let store = seeded().await;
        store.create_building(building("B2")).await.unwrap();
        let mut lab = room("LAB-2", "B2");
        lab.function = "Chemistry lab".into();
        lab.occupant = Some("Office of Research".into());
        store.create_aggregate(lab, RoomChildren::default()).await.unwrap();

        let hits = store.search_rooms("OFFICE").await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["S1", "LAB-2"]);

        assert!(store.search_rooms("zzz-no-match").await.unwrap().is_empty());

        let vacant = store.search_rooms("NONE").await.unwrap();
        let ids: Vec<&str> = vacant.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["S1"]);
    }

    #[tokio::test]
    async fn rooms_by_building_distinguishes_missing_building() {
        let store = seeded().await;
        store.create_building(building("B2")).await.unwrap();

        assert_eq!(store.rooms_by_building("B1").await.unwrap().len(), 1);
        assert!(store.rooms_by_building("B2").await.unwrap().is_empty());
        assert!(matches!(
            store.rooms_by_building("B3").await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn building_patch_is_partial() {
        let store = seeded().await;
        let patch = BuildingPatch {
            designation: Some("North Wing".into()),
            ..Default::default()
        };
        let updated = store.update_building("B1", &patch).await.unwrap();
        assert_eq!(updated.site, "Main");
        assert_eq!(updated.designation, "North Wing");
    }
}
