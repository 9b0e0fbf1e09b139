//! Aggregate Store: persistence of buildings and room aggregates.
//!
//! A room aggregate is the `rooms` row plus its five child collections
//! (doors, windows, walls, floors, lamps). Every mutating operation on the
//! trait commits as a single unit or not at all.

pub mod memory;
pub mod postgres;

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::database::models::{
    Building, BuildingPatch, ChildPatches, Room, RoomAggregate, RoomChildren, RoomPatch,
    RoomSummary, TypedRow,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors surfaced by store operations. Any open transaction has been rolled back
/// by the time one of these reaches the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some("23505") => StoreError::Conflict(db.message().to_string()),
                Some("23503") => StoreError::NotFound(db.message().to_string()),
                Some("23502") | Some("23514") | Some("22001") | Some("22003") => {
                    StoreError::Constraint(db.message().to_string())
                }
                _ => StoreError::Sqlx(err),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Sqlx(err),
        }
    }
}

/// Persistence boundary for buildings and room aggregates.
#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// Backing store health check
    async fn ping(&self) -> Result<(), StoreError>;

    async fn list_buildings(&self) -> Result<Vec<Building>, StoreError>;

    async fn fetch_building(&self, id: &str) -> Result<Option<Building>, StoreError>;

    /// Fails with `Conflict` when the id is taken
    async fn create_building(&self, building: Building) -> Result<Building, StoreError>;

    /// Applies only the fields present in `patch`
    async fn update_building(&self, id: &str, patch: &BuildingPatch) -> Result<Building, StoreError>;

    /// Deletes every room of the building with its children, then the building.
    /// Returns the number of rooms removed.
    async fn delete_building_cascade(&self, id: &str) -> Result<u64, StoreError>;

    async fn list_room_ids(&self, building_id: &str) -> Result<Vec<String>, StoreError>;

    /// Fails with `NotFound` when the building does not exist
    async fn rooms_by_building(&self, building_id: &str) -> Result<Vec<RoomSummary>, StoreError>;

    /// Case-insensitive substring match on room id, function and occupant.
    /// A room without an occupant matches as its rendered `"none"`.
    async fn search_rooms(&self, term: &str) -> Result<Vec<RoomSummary>, StoreError>;

    async fn fetch_room(&self, id: &str) -> Result<Option<Room>, StoreError>;

    /// Empty collections for a room without children (or an unknown room)
    async fn fetch_children(&self, id: &str) -> Result<RoomChildren, StoreError>;

    async fn create_aggregate(&self, room: Room, children: RoomChildren) -> Result<(), StoreError>;

    /// Partial room update plus a type-scoped replace of each present child collection.
    /// Returns the aggregate as committed.
    async fn update_aggregate(
        &self,
        id: &str,
        room_patch: Option<&RoomPatch>,
        children: &ChildPatches,
    ) -> Result<RoomAggregate, StoreError>;

    async fn delete_aggregate(&self, id: &str) -> Result<(), StoreError>;

    async fn fetch_aggregate(&self, id: &str) -> Result<Option<RoomAggregate>, StoreError> {
        let Some(room) = self.fetch_room(id).await? else {
            return Ok(None);
        };
        let children = self.fetch_children(id).await?;
        Ok(Some(RoomAggregate { room, children }))
    }
}

/// The distinct type values carried by an incoming child collection.
///
/// Existing rows whose type is in the scope are replaced; all others survive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeScope(BTreeSet<String>);

impl TypeScope {
    pub fn of<T: TypedRow>(rows: &[T]) -> Self {
        Self(rows.iter().map(|row| row.item_type().to_string()).collect())
    }

    pub fn contains(&self, item_type: &str) -> bool {
        self.0.contains(item_type)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn types(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

/// Type-scoped replace over an in-memory collection. Returns the number of rows removed.
pub fn replace_scoped<T: TypedRow>(existing: &mut Vec<T>, incoming: &[T]) -> usize {
    let scope = TypeScope::of(incoming);
    let before = existing.len();
    existing.retain(|row| !scope.contains(row.item_type()));
    let removed = before - existing.len();
    existing.extend(incoming.iter().cloned());
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::CountedItem;

    #[test]
    fn scope_deduplicates_types() {
        let rows = vec![
            CountedItem::new(1, "LED"),
            CountedItem::new(2, "LED"),
            CountedItem::new(1, "Halogen"),
        ];
        let scope = TypeScope::of(&rows);
        assert_eq!(scope.len(), 2);
        assert_eq!(scope.types(), vec!["Halogen".to_string(), "LED".to_string()]);
        assert!(!scope.contains("led"));
    }

    #[test]
    fn replace_keeps_untouched_types() {
        let mut lamps = vec![CountedItem::new(3, "LED"), CountedItem::new(2, "Fluorescent")];
        let removed = replace_scoped(&mut lamps, &[CountedItem::new(5, "LED")]);

        assert_eq!(removed, 1);
        assert_eq!(lamps, vec![CountedItem::new(2, "Fluorescent"), CountedItem::new(5, "LED")]);
    }

    #[test]
    fn replace_removes_every_duplicate_of_a_scoped_type() {
        let mut doors = vec![
            CountedItem::new(1, "Wood"),
            CountedItem::new(1, "Wood"),
            CountedItem::new(1, "Glass"),
        ];
        let removed = replace_scoped(&mut doors, &[CountedItem::new(4, "Wood")]);

        assert_eq!(removed, 2);
        assert_eq!(doors.len(), 2);
        assert_eq!(doors.iter().filter(|d| d.item_type == "Wood").count(), 1);
    }

    #[test]
    fn replace_with_empty_patch_is_a_no_op() {
        let mut windows = vec![CountedItem::new(2, "Double")];
        let removed = replace_scoped(&mut windows, &[]);
        assert_eq!(removed, 0);
        assert_eq!(windows, vec![CountedItem::new(2, "Double")]);
    }

    #[test]
    fn replace_adds_new_types() {
        let mut windows = vec![CountedItem::new(2, "Double")];
        replace_scoped(&mut windows, &[CountedItem::new(1, "Skylight")]);
        assert_eq!(windows.len(), 2);
    }
}
