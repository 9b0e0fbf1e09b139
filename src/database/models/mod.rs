pub mod building;
pub mod children;
pub mod room;

use rust_decimal::Decimal;

pub use building::{Building, BuildingPatch, NewBuilding};
pub use children::{ChildKind, ChildPatches, CountedItem, Measure, RoomChildren, SurfaceItem, TypedRow};
pub use room::{NewRoom, Room, RoomAggregate, RoomPatch, RoomSummary, NO_OCCUPANT};

/// Fractional digits kept by the `NUMERIC(10, 2)` columns
pub const NUMERIC_SCALE: u32 = 2;

/// Exclusive upper bound on the magnitude of a `NUMERIC(10, 2)` value
pub fn numeric_limit() -> Decimal {
    Decimal::from(100_000_000u64)
}

/// True when `value` is stored by a `NUMERIC(10, 2)` column without rounding or overflow.
pub fn fits_numeric(value: Decimal) -> bool {
    value.normalize().scale() <= NUMERIC_SCALE && value.abs() < numeric_limit()
}
