use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use sqlx::FromRow;

use super::children::RoomChildren;

pub const ROOM_ID_MAX: usize = 45;
pub const ROOM_TEXT_MAX: usize = 45;

/// Rendered in place of an absent occupant.
pub const NO_OCCUPANT: &str = "none";

fn occupant_or_none<S: Serializer>(occupant: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(occupant.as_deref().unwrap_or(NO_OCCUPANT))
}

/// A row from the `rooms` table.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub function: String,
    #[serde(serialize_with = "occupant_or_none")]
    pub occupant: Option<String>,
    pub ceiling_area: Decimal,
    pub outlets: i32,
    pub wifi_points: i32,
    pub fans: i32,
    pub ac_units: i32,
    pub building_id: String,
}

/// Listing projection used by rooms-by-building and search.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: String,
    pub building_id: String,
    pub function: String,
    #[serde(serialize_with = "occupant_or_none")]
    pub occupant: Option<String>,
}

/// DTO for registering a room. Fixture counts default to 0.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoom {
    pub id: String,
    pub function: String,
    pub occupant: Option<String>,
    pub ceiling_area: Decimal,
    #[serde(default)]
    pub outlets: i32,
    #[serde(default)]
    pub wifi_points: i32,
    #[serde(default)]
    pub fans: i32,
    #[serde(default)]
    pub ac_units: i32,
    pub building_id: String,
}

/// Validated room update. All fields are optional; `id` may only echo the current id.
/// `occupant: Some(None)` clears the occupant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomPatch {
    pub id: Option<String>,
    pub function: Option<String>,
    pub occupant: Option<Option<String>>,
    pub ceiling_area: Option<Decimal>,
    pub outlets: Option<i32>,
    pub wifi_points: Option<i32>,
    pub fans: Option<i32>,
    pub ac_units: Option<i32>,
    pub building_id: Option<String>,
}

impl RoomPatch {
    /// True when no column would change
    pub fn is_empty(&self) -> bool {
        self.function.is_none()
            && self.occupant.is_none()
            && self.ceiling_area.is_none()
            && self.outlets.is_none()
            && self.wifi_points.is_none()
            && self.fans.is_none()
            && self.ac_units.is_none()
            && self.building_id.is_none()
    }

    pub fn apply_to(&self, room: &mut Room) {
        if let Some(function) = &self.function {
            room.function = function.clone();
        }
        if let Some(occupant) = &self.occupant {
            room.occupant = occupant.clone();
        }
        if let Some(area) = self.ceiling_area {
            room.ceiling_area = area;
        }
        if let Some(n) = self.outlets {
            room.outlets = n;
        }
        if let Some(n) = self.wifi_points {
            room.wifi_points = n;
        }
        if let Some(n) = self.fans {
            room.fans = n;
        }
        if let Some(n) = self.ac_units {
            room.ac_units = n;
        }
        if let Some(building_id) = &self.building_id {
            room.building_id = building_id.clone();
        }
    }
}

impl From<NewRoom> for Room {
    fn from(new: NewRoom) -> Self {
        Self {
            id: new.id,
            function: new.function,
            occupant: new.occupant,
            ceiling_area: new.ceiling_area,
            outlets: new.outlets,
            wifi_points: new.wifi_points,
            fans: new.fans,
            ac_units: new.ac_units,
            building_id: new.building_id,
        }
    }
}

/// A room together with its five child collections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomAggregate {
    pub room: Room,
    #[serde(flatten)]
    pub children: RoomChildren,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn office() -> Room {
        Room {
            id: "S1".into(),
            function: "Office".into(),
            occupant: None,
            ceiling_area: Decimal::new(200, 1),
            outlets: 4,
            wifi_points: 1,
            fans: 0,
            ac_units: 1,
            building_id: "B1".into(),
        }
    }

    #[test]
    fn absent_occupant_serializes_as_none() {
        let value = serde_json::to_value(office()).unwrap();
        assert_eq!(value["occupant"], json!("none"));
        assert_eq!(value["ceilingArea"], json!(20.0));
        assert_eq!(value["buildingId"], json!("B1"));
    }

    #[test]
    fn patch_touches_only_present_fields() {
        let mut room = office();
        let patch = RoomPatch {
            occupant: Some(Some("Dr. Martin".into())),
            ..Default::default()
        };
        patch.apply_to(&mut room);

        assert_eq!(room.occupant.as_deref(), Some("Dr. Martin"));
        assert_eq!(room.function, "Office");
        assert_eq!(room.ceiling_area, Decimal::new(200, 1));
        assert_eq!(room.outlets, 4);
    }

    #[test]
    fn explicit_null_occupant_clears_it() {
        let mut room = office();
        room.occupant = Some("Dr. Martin".into());
        let patch = RoomPatch {
            occupant: Some(None),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        patch.apply_to(&mut room);

        assert!(room.occupant.is_none());
        assert_eq!(serde_json::to_value(&room).unwrap()["occupant"], json!("none"));
    }

    #[test]
    fn id_only_patch_is_empty() {
        let patch = RoomPatch {
            id: Some("S1".into()),
            ..Default::default()
        };
        assert!(patch.is_empty());
    }

    #[test]
    fn new_room_defaults_fixture_counts() {
        let new: NewRoom = serde_json::from_value(json!({
            "id": "S2", "function": "Lab", "ceilingArea": 12, "buildingId": "B1"
        }))
        .unwrap();
        let room = Room::from(new);
        assert_eq!((room.outlets, room.wifi_points, room.fans, room.ac_units), (0, 0, 0, 0));
        assert!(room.occupant.is_none());
    }

    #[test]
    fn aggregate_flattens_children() {
        let aggregate = RoomAggregate {
            room: office(),
            children: RoomChildren::default(),
        };
        let value = serde_json::to_value(aggregate).unwrap();
        for key in ["room", "doors", "windows", "walls", "floors", "lamps"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }
}
