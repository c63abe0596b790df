use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::coordinate::Coordinate;
use crate::models::trip::{Checkpoint, TripState};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct TripFeed {
    pub trip_id: Uuid,
    pub request_id: Uuid,
    pub driver_id: Uuid,
    pub current_state: TripState,
    pub checkpoints: Vec<Checkpoint>,
    pub driver_location: Option<Coordinate>,
    pub eta_minutes: Option<f64>,
    pub sos_active: bool,
    pub last_updated: DateTime<Utc>,
}

/// Read-only projection of a trip for polling clients. Built from the last
/// committed snapshot and the latest fleet position; never takes the trip lock.
pub fn snapshot(state: &AppState, trip_id: Uuid) -> Result<TripFeed, AppError> {
    let trip = state
        .trip_snapshots
        .get(&trip_id)
        .map(|trip| trip.clone())
        .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))?;

    let driver = state
        .fleet
        .get(&trip.driver_id)
        .map(|driver| (driver.location, driver.updated_at));

    let driver_location = driver.map(|(location, _)| location);
    let eta_minutes = match (driver_location, trip.next_target()) {
        (Some(location), Some(target)) => state.geo.eta_minutes(&location, &target).ok(),
        _ => None,
    };

    let last_updated = match driver {
        Some((_, driver_updated)) if driver_updated > trip.updated_at => driver_updated,
        _ => trip.updated_at,
    };

    let sos_active = state
        .sos_alerts
        .iter()
        .any(|alert| alert.trip_id == Some(trip_id) && !alert.resolved);

    Ok(TripFeed {
        trip_id: trip.id,
        request_id: trip.request_id,
        driver_id: trip.driver_id,
        current_state: trip.state,
        checkpoints: trip.checkpoints,
        driver_location,
        eta_minutes,
        sos_active,
        last_updated,
    })
}
