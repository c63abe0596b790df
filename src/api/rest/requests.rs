use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use uuid::Uuid;

use crate::engine::assignment::{assign_request, submit_ride_request, NewRideRequest, SubmitOutcome};
use crate::engine::lifecycle::cancel_request;
use crate::error::AppError;
use crate::models::request::RideRequest;
use crate::models::trip::Trip;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/requests", post(submit_request))
        .route("/requests/:id", get(get_request))
        .route("/requests/:id/retry", post(retry_request))
        .route("/requests/:id/cancel", post(cancel))
}

/// 201 with the trip when a driver was reserved, 503 with the still-PENDING
/// request when nobody is in range.
async fn submit_request(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewRideRequest>,
) -> Result<(StatusCode, Json<SubmitOutcome>), AppError> {
    let outcome = submit_ride_request(&state, payload)?;

    let status = if outcome.trip.is_some() {
        StatusCode::CREATED
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    Ok((status, Json(outcome)))
}

async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RideRequest>, AppError> {
    let request = state
        .requests
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("request {} not found", id)))?;

    Ok(Json(request.value().clone()))
}

async fn retry_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(assign_request(&state, id)?))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RideRequest>, AppError> {
    Ok(Json(cancel_request(&state, id).await?))
}
