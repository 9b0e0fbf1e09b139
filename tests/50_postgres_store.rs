//! Store tests against a real PostgreSQL. Each test returns early unless
//! DATABASE_URL is set, so the suite stays green without a database.

mod common;

use anyhow::Result;
use rust_decimal::Decimal;

use room_inventory::config::DatabaseConfig;
use room_inventory::database::models::{
    Building, ChildPatches, CountedItem, Room, RoomChildren, RoomPatch, SurfaceItem,
};
use room_inventory::database::DatabaseManager;
use room_inventory::store::{AggregateStore, PgStore, StoreError};

async fn store() -> Result<Option<PgStore>> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping PostgreSQL store test");
        return Ok(None);
    };
    let config = DatabaseConfig {
        url: Some(url),
        max_connections: 2,
        connection_timeout: 5,
        slow_query_threshold_ms: 1000,
    };
    let database = DatabaseManager::connect(&config).await?;
    database.apply_schema().await?;
    Ok(Some(PgStore::new(&database, config.slow_query_threshold_ms)))
}

fn building(id: &str) -> Building {
    Building {
        id: id.to_string(),
        site: "Main".to_string(),
        designation: "Integration".to_string(),
    }
}

fn room(id: &str, building_id: &str) -> Room {
    Room {
        id: id.to_string(),
        function: "Office".to_string(),
        occupant: None,
        ceiling_area: Decimal::new(185, 1),
        outlets: 2,
        wifi_points: 1,
        fans: 0,
        ac_units: 0,
        building_id: building_id.to_string(),
    }
}

fn furnished() -> RoomChildren {
    RoomChildren {
        doors: vec![CountedItem::new(1, "Wood")],
        windows: vec![CountedItem::new(2, "Double")],
        walls: vec![SurfaceItem::new(Decimal::new(40, 0), "Plaster")],
        floors: vec![SurfaceItem::new(Decimal::new(185, 1), "Tile")],
        lamps: vec![CountedItem::new(3, "LED"), CountedItem::new(1, "Fluorescent")],
    }
}

#[tokio::test]
async fn failed_child_insert_rolls_back_room() -> Result<()> {
    let Some(store) = store().await? else { return Ok(()) };
    let b = common::unique("B");
    let s = common::unique("S");
    store.create_building(building(&b)).await?;

    let mut children = furnished();
    children.lamps.push(CountedItem::new(0, "Broken"));
    let err = store.create_aggregate(room(&s, &b), children).await.unwrap_err();
    assert!(matches!(err, StoreError::Constraint(_)), "{err:?}");

    assert!(store.fetch_room(&s).await?.is_none());
    assert_eq!(store.fetch_children(&s).await?, RoomChildren::default());

    store.delete_building_cascade(&b).await?;
    Ok(())
}

#[tokio::test]
async fn type_scoped_update_and_cascade() -> Result<()> {
    let Some(store) = store().await? else { return Ok(()) };
    let b = common::unique("B");
    let s = common::unique("S");
    store.create_building(building(&b)).await?;
    store.create_aggregate(room(&s, &b), furnished()).await?;

    let patch = RoomPatch {
        occupant: Some(Some("Dr. Martin".to_string())),
        ..Default::default()
    };
    let children = ChildPatches {
        lamps: Some(vec![CountedItem::new(5, "LED")]),
        ..Default::default()
    };
    let aggregate = store.update_aggregate(&s, Some(&patch), &children).await?;

    assert_eq!(aggregate.room.occupant.as_deref(), Some("Dr. Martin"));
    assert_eq!(aggregate.room.function, "Office");
    assert_eq!(aggregate.children.doors, furnished().doors);
    assert_eq!(aggregate.children.lamps.len(), 2);
    assert!(aggregate.children.lamps.contains(&CountedItem::new(5, "LED")));
    assert!(aggregate.children.lamps.contains(&CountedItem::new(1, "Fluorescent")));

    assert_eq!(store.list_room_ids(&b).await?, vec![s.clone()]);
    assert_eq!(store.delete_building_cascade(&b).await?, 1);
    assert!(store.fetch_building(&b).await?.is_none());
    assert!(store.fetch_room(&s).await?.is_none());
    assert_eq!(store.fetch_children(&s).await?, RoomChildren::default());
    Ok(())
}

#[tokio::test]
async fn duplicate_and_missing_ids() -> Result<()> {
    let Some(store) = store().await? else { return Ok(()) };
    let b = common::unique("B");
    let s = common::unique("S");
    store.create_building(building(&b)).await?;

    assert!(matches!(
        store.create_building(building(&b)).await.unwrap_err(),
        StoreError::Conflict(_)
    ));
    assert!(matches!(
        store.create_aggregate(room(&s, "missing-building"), RoomChildren::default()).await.unwrap_err(),
        StoreError::NotFound(_)
    ));

    store.create_aggregate(room(&s, &b), RoomChildren::default()).await?;
    store.delete_aggregate(&s).await?;
    assert!(matches!(store.delete_aggregate(&s).await.unwrap_err(), StoreError::NotFound(_)));

    store.delete_building_cascade(&b).await?;
    Ok(())
}

#[tokio::test]
async fn failed_update_leaves_aggregate_unchanged() -> Result<()> {
    let Some(store) = store().await? else { return Ok(()) };
    let b = common::unique("B");
    let s = common::unique("S");
    store.create_building(building(&b)).await?;
    store.create_aggregate(room(&s, &b), furnished()).await?;
    let before = store.fetch_aggregate(&s).await?;

    let patch = RoomPatch {
        function: Some("Storage".to_string()),
        ..Default::default()
    };
    let children = ChildPatches {
        doors: Some(vec![CountedItem::new(2, "Steel")]),
        lamps: Some(vec![CountedItem::new(0, "Broken")]),
        ..Default::default()
    };
    let err = store.update_aggregate(&s, Some(&patch), &children).await.unwrap_err();
    assert!(matches!(err, StoreError::Constraint(_)), "{err:?}");
    assert_eq!(store.fetch_aggregate(&s).await?, before);

    let missing = common::unique("S");
    let err = store.update_aggregate(&missing, None, &children).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)), "{err:?}");
    assert_eq!(store.fetch_children(&missing).await?, RoomChildren::default());

    store.delete_building_cascade(&b).await?;
    Ok(())
}

#[tokio::test]
async fn null_occupant_patch_writes_null() -> Result<()> {
    let Some(store) = store().await? else { return Ok(()) };
    let b = common::unique("B");
    let s = common::unique("S");
    store.create_building(building(&b)).await?;
    let mut occupied = room(&s, &b);
    occupied.occupant = Some("Dr X".to_string());
    store.create_aggregate(occupied, RoomChildren::default()).await?;

    let untouched = RoomPatch {
        fans: Some(2),
        ..Default::default()
    };
    let aggregate = store.update_aggregate(&s, Some(&untouched), &ChildPatches::default()).await?;
    assert_eq!(aggregate.room.occupant.as_deref(), Some("Dr X"));

    let clear = RoomPatch {
        occupant: Some(None),
        ..Default::default()
    };
    let aggregate = store.update_aggregate(&s, Some(&clear), &ChildPatches::default()).await?;
    assert!(aggregate.room.occupant.is_none());
    assert_eq!(aggregate.room.fans, 2);

    store.delete_building_cascade(&b).await?;
    Ok(())
}
