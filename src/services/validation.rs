//! Shape validation of raw JSON request bodies.
//!
//! Every check runs before the store is touched. Failures are collected per
//! field (`room.ceilingArea`, `lamps[1].count`, ...) and returned together as a
//! single validation error.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::database::models::building::{BUILDING_DESIGNATION_MAX, BUILDING_ID_MAX, BUILDING_SITE_MAX};
use crate::database::models::children::CHILD_TYPE_MAX;
use crate::database::models::room::{ROOM_ID_MAX, ROOM_TEXT_MAX};
use crate::database::models::{
    fits_numeric, numeric_limit, BuildingPatch, ChildKind, ChildPatches, CountedItem, NewBuilding,
    NewRoom, RoomChildren, RoomPatch, SurfaceItem, NUMERIC_SCALE,
};
use crate::error::ApiError;

/// Top-level keys an update-room body may carry
const ROOM_UPDATE_SECTIONS: [&str; 6] = ["room", "doors", "windows", "walls", "floors", "lamps"];

/// Fields a room patch may carry
const ROOM_FIELDS: [&str; 9] = [
    "id",
    "function",
    "occupant",
    "ceilingArea",
    "outlets",
    "wifiPoints",
    "fans",
    "acUnits",
    "buildingId",
];

const ROOM_FIXTURES: [&str; 4] = ["outlets", "wifiPoints", "fans", "acUnits"];

/// Update-room input after validation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomUpdate {
    pub room: Option<RoomPatch>,
    pub children: ChildPatches,
}

#[derive(Debug, Default)]
struct FieldErrors(HashMap<String, String>);

impl FieldErrors {
    fn add(&mut self, field: impl Into<String>, problem: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| problem.into());
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_error(self) -> ApiError {
        ApiError::validation_error("Validation failed", Some(self.0))
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, ApiError> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self.into_error())
        }
    }
}

fn qualify(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn as_object<'a>(value: &'a Value, field: &str, errors: &mut FieldErrors) -> Option<&'a Map<String, Value>> {
    match value.as_object() {
        Some(map) => Some(map),
        None => {
            errors.add(if field.is_empty() { "body" } else { field }, "must be an object");
            None
        }
    }
}

fn check_text(value: &Value, field: &str, max: usize, errors: &mut FieldErrors) -> Option<String> {
    let Some(text) = value.as_str() else {
        errors.add(field, "must be a string");
        return None;
    };
    let text = text.trim();
    if text.is_empty() {
        errors.add(field, "must not be empty");
        None
    } else if text.chars().count() > max {
        errors.add(field, format!("must be at most {} characters", max));
        None
    } else {
        Some(text.to_string())
    }
}

fn required_text(
    map: &Map<String, Value>,
    prefix: &str,
    key: &str,
    max: usize,
    errors: &mut FieldErrors,
) -> Option<String> {
    let field = qualify(prefix, key);
    match map.get(key) {
        None | Some(Value::Null) => {
            errors.add(field, "is required");
            None
        }
        Some(value) => check_text(value, &field, max, errors),
    }
}

fn optional_text(
    map: &Map<String, Value>,
    prefix: &str,
    key: &str,
    max: usize,
    errors: &mut FieldErrors,
) -> Option<String> {
    match map.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => check_text(value, &qualify(prefix, key), max, errors),
    }
}

fn check_decimal(value: &Value, field: &str, errors: &mut FieldErrors) -> Option<Decimal> {
    if !value.is_number() {
        errors.add(field, "must be a number");
        return None;
    }
    let decimal = match <Decimal as Deserialize>::deserialize(value) {
        Ok(decimal) => decimal,
        Err(_) => {
            errors.add(field, "is out of range");
            return None;
        }
    };
    if decimal.normalize().scale() > NUMERIC_SCALE {
        errors.add(field, format!("must have at most {} decimal places", NUMERIC_SCALE));
        return None;
    }
    if !fits_numeric(decimal) {
        errors.add(field, format!("must be less than {}", numeric_limit()));
        return None;
    }
    Some(decimal)
}

fn check_integer(value: &Value, field: &str, errors: &mut FieldErrors) -> Option<i32> {
    match value.as_i64() {
        Some(n) => match i32::try_from(n) {
            Ok(n) => Some(n),
            Err(_) => {
                errors.add(field, "is out of range");
                None
            }
        },
        None => {
            errors.add(field, "must be an integer");
            None
        }
    }
}

fn non_negative_decimal(value: &Value, field: &str, errors: &mut FieldErrors) -> Option<Decimal> {
    let decimal = check_decimal(value, field, errors)?;
    if decimal.is_sign_negative() && !decimal.is_zero() {
        errors.add(field, "must not be negative");
        return None;
    }
    Some(decimal)
}

fn non_negative_integer(value: &Value, field: &str, errors: &mut FieldErrors) -> Option<i32> {
    let n = check_integer(value, field, errors)?;
    if n < 0 {
        errors.add(field, "must not be negative");
        return None;
    }
    Some(n)
}

fn optional_fixture(map: &Map<String, Value>, prefix: &str, key: &str, errors: &mut FieldErrors) -> Option<i32> {
    match map.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => non_negative_integer(value, &qualify(prefix, key), errors),
    }
}

fn counted_item(value: &Value, field: &str, errors: &mut FieldErrors) -> Option<CountedItem> {
    let map = as_object(value, field, errors)?;
    let item_type = required_text(map, field, "type", CHILD_TYPE_MAX, errors);
    let count = match map.get("count") {
        None | Some(Value::Null) => {
            errors.add(qualify(field, "count"), "is required");
            None
        }
        Some(value) => {
            let name = qualify(field, "count");
            match check_integer(value, &name, errors) {
                Some(n) if n > 0 => Some(n),
                Some(_) => {
                    errors.add(name, "must be positive");
                    None
                }
                None => None,
            }
        }
    };
    Some(CountedItem::new(count?, item_type?))
}

fn surface_item(value: &Value, field: &str, errors: &mut FieldErrors) -> Option<SurfaceItem> {
    let map = as_object(value, field, errors)?;
    let item_type = required_text(map, field, "type", CHILD_TYPE_MAX, errors);
    let surface = match map.get("surface") {
        None | Some(Value::Null) => {
            errors.add(qualify(field, "surface"), "is required");
            None
        }
        Some(value) => {
            let name = qualify(field, "surface");
            match check_decimal(value, &name, errors) {
                Some(d) if d.is_sign_positive() && !d.is_zero() => Some(d),
                Some(_) => {
                    errors.add(name, "must be positive");
                    None
                }
                None => None,
            }
        }
    };
    Some(SurfaceItem::new(surface?, item_type?))
}

fn collection<T>(
    value: &Value,
    kind: ChildKind,
    errors: &mut FieldErrors,
    element: fn(&Value, &str, &mut FieldErrors) -> Option<T>,
) -> Option<Vec<T>> {
    let key = kind.table();
    let Some(items) = value.as_array() else {
        errors.add(key, "must be an array");
        return None;
    };

    let mut rows = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        if let Some(row) = element(item, &format!("{}[{}]", key, index), errors) {
            rows.push(row);
        }
    }
    (rows.len() == items.len()).then_some(rows)
}

fn required_collection<T>(
    map: &Map<String, Value>,
    kind: ChildKind,
    errors: &mut FieldErrors,
    element: fn(&Value, &str, &mut FieldErrors) -> Option<T>,
) -> Option<Vec<T>> {
    match map.get(kind.table()) {
        None | Some(Value::Null) => {
            errors.add(kind.table(), "is required");
            None
        }
        Some(value) => collection(value, kind, errors, element),
    }
}

fn optional_collection<T>(
    map: &Map<String, Value>,
    kind: ChildKind,
    errors: &mut FieldErrors,
    element: fn(&Value, &str, &mut FieldErrors) -> Option<T>,
) -> Option<Vec<T>> {
    map.get(kind.table())
        .and_then(|value| collection(value, kind, errors, element))
}

/// Validate a create-building body: `{id, site, designation}`
pub fn new_building(body: &Value) -> Result<NewBuilding, ApiError> {
    let mut errors = FieldErrors::default();
    let Some(map) = as_object(body, "", &mut errors) else {
        return Err(errors.into_error());
    };

    let id = required_text(map, "", "id", BUILDING_ID_MAX, &mut errors);
    let site = required_text(map, "", "site", BUILDING_SITE_MAX, &mut errors);
    let designation = required_text(map, "", "designation", BUILDING_DESIGNATION_MAX, &mut errors);

    errors.finish(|| NewBuilding {
        id: id.unwrap_or_default(),
        site: site.unwrap_or_default(),
        designation: designation.unwrap_or_default(),
    })
}

/// Validate an update-building body. At least one of `site` or `designation`.
pub fn building_patch(path_id: &str, body: &Value) -> Result<BuildingPatch, ApiError> {
    let mut errors = FieldErrors::default();
    let Some(map) = as_object(body, "", &mut errors) else {
        return Err(errors.into_error());
    };

    if let Some(id) = map.get("id") {
        if id.as_str() != Some(path_id) {
            errors.add("id", "buildings cannot be renamed");
        }
    }
    let patch = BuildingPatch {
        site: optional_text(map, "", "site", BUILDING_SITE_MAX, &mut errors),
        designation: optional_text(map, "", "designation", BUILDING_DESIGNATION_MAX, &mut errors),
    };
    if patch.is_empty() {
        errors.add("body", "at least one of site or designation is required");
    }

    errors.finish(|| patch)
}

fn room_fields(map: &Map<String, Value>, errors: &mut FieldErrors) -> Option<NewRoom> {
    let id = required_text(map, "room", "id", ROOM_ID_MAX, errors);
    let function = required_text(map, "room", "function", ROOM_TEXT_MAX, errors);
    let occupant = optional_text(map, "room", "occupant", ROOM_TEXT_MAX, errors);
    let ceiling_area = match map.get("ceilingArea") {
        None | Some(Value::Null) => {
            errors.add("room.ceilingArea", "is required");
            None
        }
        Some(value) => non_negative_decimal(value, "room.ceilingArea", errors),
    };
    let building_id = required_text(map, "room", "buildingId", BUILDING_ID_MAX, errors);
    let [outlets, wifi_points, fans, ac_units] =
        ROOM_FIXTURES.map(|key| optional_fixture(map, "room", key, errors).unwrap_or(0));

    Some(NewRoom {
        id: id?,
        function: function?,
        occupant,
        ceiling_area: ceiling_area?,
        outlets,
        wifi_points,
        fans,
        ac_units,
        building_id: building_id?,
    })
}

/// Validate a create-room body: `{room: {...}, doors, windows, walls, floors, lamps}`.
/// All five collections must be present as arrays, possibly empty.
pub fn new_room(body: &Value) -> Result<(NewRoom, RoomChildren), ApiError> {
    let mut errors = FieldErrors::default();
    let Some(map) = as_object(body, "", &mut errors) else {
        return Err(errors.into_error());
    };

    let room = match map.get("room") {
        None | Some(Value::Null) => {
            errors.add("room", "is required");
            None
        }
        Some(value) => as_object(value, "room", &mut errors).and_then(|room| room_fields(room, &mut errors)),
    };

    let doors = required_collection(map, ChildKind::Door, &mut errors, counted_item);
    let windows = required_collection(map, ChildKind::Window, &mut errors, counted_item);
    let walls = required_collection(map, ChildKind::Wall, &mut errors, surface_item);
    let floors = required_collection(map, ChildKind::Floor, &mut errors, surface_item);
    let lamps = required_collection(map, ChildKind::Lamp, &mut errors, counted_item);

    match room {
        Some(room) if errors.is_empty() => Ok((
            room,
            RoomChildren {
                doors: doors.unwrap_or_default(),
                windows: windows.unwrap_or_default(),
                walls: walls.unwrap_or_default(),
                floors: floors.unwrap_or_default(),
                lamps: lamps.unwrap_or_default(),
            },
        )),
        _ => Err(errors.into_error()),
    }
}

fn room_patch(path_id: &str, value: &Value, errors: &mut FieldErrors) -> Option<RoomPatch> {
    let map = as_object(value, "room", errors)?;

    for key in map.keys() {
        if !ROOM_FIELDS.contains(&key.as_str()) {
            errors.add(qualify("room", key), "is not a room field");
        }
    }
    if let Some(id) = map.get("id") {
        if id.as_str() != Some(path_id) {
            errors.add("room.id", "rooms cannot be renamed");
        }
    }

    let [outlets, wifi_points, fans, ac_units] =
        ROOM_FIXTURES.map(|key| optional_fixture(map, "room", key, errors));

    Some(RoomPatch {
        id: map.get("id").and_then(Value::as_str).map(str::to_string),
        function: optional_text(map, "room", "function", ROOM_TEXT_MAX, errors),
        occupant: match map.get("occupant") {
            None => None,
            Some(Value::Null) => Some(None),
            Some(value) => check_text(value, "room.occupant", ROOM_TEXT_MAX, errors).map(Some),
        },
        ceiling_area: map
            .get("ceilingArea")
            .filter(|value| !value.is_null())
            .and_then(|value| non_negative_decimal(value, "room.ceilingArea", errors)),
        outlets,
        wifi_points,
        fans,
        ac_units,
        building_id: optional_text(map, "room", "buildingId", BUILDING_ID_MAX, errors),
    })
}

/// Validate an update-room body. At least one of the six sections must be present;
/// each present child collection must be an array.
pub fn room_update(path_id: &str, body: &Value) -> Result<RoomUpdate, ApiError> {
    let mut errors = FieldErrors::default();
    let Some(map) = as_object(body, "", &mut errors) else {
        return Err(errors.into_error());
    };

    if !ROOM_UPDATE_SECTIONS.iter().any(|key| map.contains_key(*key)) {
        errors.add("body", "at least one of room, doors, windows, walls, floors or lamps is required");
    }
    for key in map.keys() {
        if !ROOM_UPDATE_SECTIONS.contains(&key.as_str()) {
            errors.add(key.clone(), "is not an update section");
        }
    }

    let room = map.get("room").and_then(|value| room_patch(path_id, value, &mut errors));
    let children = ChildPatches {
        doors: optional_collection(map, ChildKind::Door, &mut errors, counted_item),
        windows: optional_collection(map, ChildKind::Window, &mut errors, counted_item),
        walls: optional_collection(map, ChildKind::Wall, &mut errors, surface_item),
        floors: optional_collection(map, ChildKind::Floor, &mut errors, surface_item),
        lamps: optional_collection(map, ChildKind::Lamp, &mut errors, counted_item),
    };

    errors.finish(|| RoomUpdate { room, children })
}

/// Validate a search term. Missing or blank terms are rejected.
pub fn search_term(term: Option<&str>) -> Result<String, ApiError> {
    match term.map(str::trim) {
        Some(term) if !term.is_empty() => {
            if term.chars().count() > ROOM_TEXT_MAX {
                return Err(ApiError::invalid_field(
                    "search",
                    format!("must be at most {} characters", ROOM_TEXT_MAX),
                ));
            }
            Ok(term.to_string())
        }
        _ => Err(ApiError::invalid_field("search", "is required")),
    }
}
