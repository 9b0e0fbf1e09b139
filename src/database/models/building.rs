use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const BUILDING_ID_MAX: usize = 20;
pub const BUILDING_SITE_MAX: usize = 20;
pub const BUILDING_DESIGNATION_MAX: usize = 100;

/// A row from the `buildings` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Building {
    pub id: String,
    pub site: String,
    pub designation: String,
}

/// DTO for registering a building.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBuilding {
    pub id: String,
    pub site: String,
    pub designation: String,
}

/// DTO for updating a building. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildingPatch {
    pub site: Option<String>,
    pub designation: Option<String>,
}

impl BuildingPatch {
    pub fn is_empty(&self) -> bool {
        self.site.is_none() && self.designation.is_none()
    }
}

impl From<NewBuilding> for Building {
    fn from(new: NewBuilding) -> Self {
        Self {
            id: new.id,
            site: new.site,
            designation: new.designation,
        }
    }
}
