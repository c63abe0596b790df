use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::coordinate::Coordinate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SosAlert {
    pub id: Uuid,
    pub trip_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub raised_by: Option<Uuid>,
    pub location: Option<Coordinate>,
    pub message: String,
    pub notification_id: Uuid,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
