use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::lifecycle::{
    accept_assignment, cancel_trip, decline_assignment, record_checkpoint, DeclineOutcome,
};
use crate::error::AppError;
use crate::models::coordinate::Coordinate;
use crate::models::trip::{Checkpoint, CheckpointLabel, Trip};
use crate::state::AppState;
use crate::tracking::feed::{snapshot, TripFeed};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/trips/:id/accept", post(accept))
        .route("/trips/:id/decline", post(decline))
        .route("/trips/:id/checkpoints", post(checkpoint))
        .route("/trips/:id/cancel", post(cancel))
        .route("/trips/:id/feed", get(feed))
}

#[derive(Deserialize)]
pub struct DriverActionRequest {
    pub driver_id: Uuid,
}

#[derive(Deserialize)]
pub struct CheckpointRequest {
    pub label: CheckpointLabel,
    pub timestamp: Option<DateTime<Utc>>,
    pub location: Option<Coordinate>,
}

async fn accept(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriverActionRequest>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(accept_assignment(&state, id, payload.driver_id).await?))
}

async fn decline(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriverActionRequest>,
) -> Result<Json<DeclineOutcome>, AppError> {
    Ok(Json(decline_assignment(&state, id, payload.driver_id).await?))
}

async fn checkpoint(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CheckpointRequest>,
) -> Result<Json<Checkpoint>, AppError> {
    let timestamp = payload.timestamp.unwrap_or_else(Utc::now);
    let checkpoint =
        record_checkpoint(&state, id, payload.label, timestamp, payload.location).await?;
    Ok(Json(checkpoint))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(cancel_trip(&state, id).await?))
}

async fn feed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TripFeed>, AppError> {
    Ok(Json(snapshot(&state, id)?))
}
