use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::coordinate::Coordinate;

/// Fleet-state view of a driver as seen by matching. Copies handed to the
/// matching engine are snapshots and are never written back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverCandidate {
    pub id: Uuid,
    pub name: String,
    pub location: Coordinate,
    pub available: bool,
    pub at_capacity: bool,
    pub rating: f64,
    pub updated_at: DateTime<Utc>,
}

impl DriverCandidate {
    pub fn can_take_ride(&self) -> bool {
        self.available && !self.at_capacity
    }
}
