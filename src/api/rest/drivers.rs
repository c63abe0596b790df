use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::coordinate::Coordinate;
use crate::models::driver::DriverCandidate;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(register_driver).get(list_drivers))
        .route("/drivers/:id/location", patch(update_driver_location))
        .route("/drivers/:id/availability", patch(update_driver_availability))
}

#[derive(Deserialize)]
pub struct RegisterDriverRequest {
    pub name: String,
    pub location: Coordinate,
    pub rating: f64,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: Coordinate,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub available: Option<bool>,
    pub at_capacity: Option<bool>,
}

async fn register_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterDriverRequest>,
) -> Result<Json<DriverCandidate>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if !payload.rating.is_finite() {
        return Err(AppError::BadRequest("rating must be a number".to_string()));
    }
    payload.location.validate()?;

    let driver = DriverCandidate {
        id: Uuid::new_v4(),
        name: payload.name,
        location: payload.location,
        available: true,
        at_capacity: false,
        rating: payload.rating.clamp(0.0, 5.0),
        updated_at: Utc::now(),
    };

    state.fleet.insert(driver.id, driver.clone());
    Ok(Json(driver))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<DriverCandidate>> {
    let drivers = state
        .fleet
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(drivers)
}

/// UpdateDriverLocation. Out-of-order updates older than the stored
/// position are acknowledged but not applied.
async fn update_driver_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<DriverCandidate>, AppError> {
    payload.location.validate()?;

    let mut driver = state
        .fleet
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {} not found", id)))?;

    let at = payload.timestamp.unwrap_or_else(Utc::now);
    if at >= driver.updated_at {
        driver.location = payload.location;
        driver.updated_at = at;
    }

    Ok(Json(driver.clone()))
}

async fn update_driver_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAvailabilityRequest>,
) -> Result<Json<DriverCandidate>, AppError> {
    let mut driver = state
        .fleet
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {} not found", id)))?;

    if let Some(available) = payload.available {
        driver.available = available;
    }
    if let Some(at_capacity) = payload.at_capacity {
        driver.at_capacity = at_capacity;
    }
    driver.updated_at = Utc::now();

    Ok(Json(driver.clone()))
}
