use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow};

pub const CHILD_TYPE_MAX: usize = 45;

/// The five child collections owned by a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChildKind {
    Door,
    Window,
    Wall,
    Floor,
    Lamp,
}

impl ChildKind {
    pub const ALL: [ChildKind; 5] = [
        ChildKind::Door,
        ChildKind::Window,
        ChildKind::Wall,
        ChildKind::Floor,
        ChildKind::Lamp,
    ];

    /// Table name, also the collection's key in request and response bodies
    pub fn table(self) -> &'static str {
        match self {
            ChildKind::Door => "doors",
            ChildKind::Window => "windows",
            ChildKind::Wall => "walls",
            ChildKind::Floor => "floors",
            ChildKind::Lamp => "lamps",
        }
    }

    pub fn type_column(self) -> &'static str {
        match self {
            ChildKind::Door => "door_type",
            ChildKind::Window => "window_type",
            ChildKind::Wall => "wall_type",
            ChildKind::Floor => "floor_type",
            ChildKind::Lamp => "lamp_type",
        }
    }

    pub fn measure_column(self) -> &'static str {
        match self {
            ChildKind::Door | ChildKind::Window | ChildKind::Lamp => "count",
            ChildKind::Wall | ChildKind::Floor => "surface",
        }
    }
}

/// Quantity recorded on a child row: a positive count or a positive surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measure {
    Count(i32),
    Surface(Decimal),
}

impl Measure {
    pub fn is_positive(&self) -> bool {
        match self {
            Measure::Count(n) => *n > 0,
            Measure::Surface(s) => s.is_sign_positive() && !s.is_zero(),
        }
    }
}

/// A child row discriminated by its type value.
pub trait TypedRow:
    Clone + std::fmt::Debug + Send + Sync + Unpin + for<'r> FromRow<'r, PgRow> + 'static
{
    fn item_type(&self) -> &str;
    fn measure(&self) -> Measure;
}

/// Door, window and lamp rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CountedItem {
    pub count: i32,
    #[serde(rename = "type")]
    pub item_type: String,
}

/// Wall and floor rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SurfaceItem {
    pub surface: Decimal,
    #[serde(rename = "type")]
    pub item_type: String,
}

impl TypedRow for CountedItem {
    fn item_type(&self) -> &str {
        &self.item_type
    }

    fn measure(&self) -> Measure {
        Measure::Count(self.count)
    }
}

impl TypedRow for SurfaceItem {
    fn item_type(&self) -> &str {
        &self.item_type
    }

    fn measure(&self) -> Measure {
        Measure::Surface(self.surface)
    }
}

impl CountedItem {
    pub fn new(count: i32, item_type: impl Into<String>) -> Self {
        Self { count, item_type: item_type.into() }
    }
}

impl SurfaceItem {
    pub fn new(surface: Decimal, item_type: impl Into<String>) -> Self {
        Self { surface, item_type: item_type.into() }
    }
}

/// All five child collections of one room, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomChildren {
    pub doors: Vec<CountedItem>,
    pub windows: Vec<CountedItem>,
    pub walls: Vec<SurfaceItem>,
    pub floors: Vec<SurfaceItem>,
    pub lamps: Vec<CountedItem>,
}

impl RoomChildren {
    pub fn row_count(&self) -> usize {
        self.doors.len() + self.windows.len() + self.walls.len() + self.floors.len() + self.lamps.len()
    }
}

/// Incoming child collections for an update. `None` leaves a collection untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChildPatches {
    pub doors: Option<Vec<CountedItem>>,
    pub windows: Option<Vec<CountedItem>>,
    pub walls: Option<Vec<SurfaceItem>>,
    pub floors: Option<Vec<SurfaceItem>>,
    pub lamps: Option<Vec<CountedItem>>,
}

impl ChildPatches {
    pub fn is_empty(&self) -> bool {
        self.doors.is_none()
            && self.windows.is_none()
            && self.walls.is_none()
            && self.floors.is_none()
            && self.lamps.is_none()
    }
}
