// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Reads of buildings and rooms, room search, service info and health.

pub mod buildings;
pub mod rooms;
pub mod system;

pub use buildings::{building_get, buildings_list};
pub use rooms::{room_get, rooms_by_building, rooms_search};
pub use system::{health, root};
