use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::coordinate::Coordinate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Assigned,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideRequest {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub origin: Coordinate,
    pub destination: Coordinate,
    /// Overrides the configured search radius for this request.
    pub max_distance_km: Option<f64>,
    pub min_rating: Option<f64>,
    pub status: RequestStatus,
    pub active_trip: Option<Uuid>,
    /// Drivers who declined this request; skipped by every later match.
    pub declined_by: Vec<Uuid>,
    pub requested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
