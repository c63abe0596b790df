use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::lifecycle::create_trip;
use crate::engine::matching::match_request;
use crate::error::AppError;
use crate::models::coordinate::Coordinate;
use crate::models::driver::DriverCandidate;
use crate::models::notification::{
    Audience, NotificationEvent, NotificationPayload, PriorityClass,
};
use crate::models::request::{RequestStatus, RideRequest};
use crate::models::trip::Trip;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct NewRideRequest {
    pub requester_id: Uuid,
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub max_distance_km: Option<f64>,
    pub min_rating: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub request: RideRequest,
    pub trip: Option<Trip>,
    pub error: Option<String>,
}

pub fn create_ride_request(state: &AppState, input: NewRideRequest) -> Result<RideRequest, AppError> {
    input.origin.validate()?;
    input.destination.validate()?;

    if let Some(radius) = input.max_distance_km {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(AppError::BadRequest(format!(
                "max_distance_km must be > 0, got {radius}"
            )));
        }
    }

    let now = Utc::now();
    let request = RideRequest {
        id: Uuid::new_v4(),
        requester_id: input.requester_id,
        origin: input.origin,
        destination: input.destination,
        max_distance_km: input.max_distance_km,
        min_rating: input.min_rating,
        status: RequestStatus::Pending,
        active_trip: None,
        declined_by: Vec::new(),
        requested_at: now,
        updated_at: now,
    };

    state.requests.insert(request.id, request.clone());
    Ok(request)
}

/// SubmitRideRequest: store the request, then try to assign it at once.
/// `NoCandidateFound` leaves the request PENDING and is reported in the
/// outcome instead of failing the submission.
pub fn submit_ride_request(
    state: &AppState,
    input: NewRideRequest,
) -> Result<SubmitOutcome, AppError> {
    let request = create_ride_request(state, input)?;

    match assign_request(state, request.id) {
        Ok(trip) => Ok(SubmitOutcome {
            request: current_request(state, request.id)?,
            trip: Some(trip),
            error: None,
        }),
        Err(err @ AppError::NoCandidateFound) => Ok(SubmitOutcome {
            request: current_request(state, request.id)?,
            trip: None,
            error: Some(err.to_string()),
        }),
        Err(err) => Err(err),
    }
}

/// Match-then-reserve for a PENDING request. A lost reservation race
/// excludes that driver and matches again; once retries are exhausted the
/// caller sees `NoCandidateFound`.
pub fn assign_request(state: &AppState, request_id: Uuid) -> Result<Trip, AppError> {
    let start = Instant::now();
    let result = match_and_reserve(state, request_id);

    let outcome = match &result {
        Ok(_) => "assigned",
        Err(AppError::NoCandidateFound) => "no_candidate",
        Err(_) => "error",
    };
    state
        .metrics
        .match_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());
    state
        .metrics
        .ride_requests_total
        .with_label_values(&[outcome])
        .inc();

    result
}

fn match_and_reserve(state: &AppState, request_id: Uuid) -> Result<Trip, AppError> {
    let mut lost_races: Vec<Uuid> = Vec::new();

    for attempt in 0..=state.matching.retry_limit {
        let request = current_request(state, request_id)?;
        if request.status != RequestStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "request {request_id} is {:?}, expected PENDING",
                request.status
            )));
        }

        let pool = candidate_pool(state, &lost_races);
        let matched = match match_request(&state.geo, &request, &pool) {
            Ok(matched) => matched,
            Err(err) => {
                warn!(request_id = %request_id, attempt, "no eligible drivers in range");
                return Err(err);
            }
        };

        match create_trip(state, request_id, &matched) {
            Ok(trip) => return Ok(trip),
            Err(AppError::CandidateNoLongerAvailable) => {
                state.metrics.reservation_conflicts_total.inc();
                warn!(
                    request_id = %request_id,
                    driver_id = %matched.candidate.id,
                    attempt,
                    "driver reserved concurrently; re-matching"
                );
                lost_races.push(matched.candidate.id);
            }
            Err(err) => return Err(err),
        }
    }

    warn!(request_id = %request_id, "reservation retries exhausted");
    Err(AppError::NoCandidateFound)
}

/// Fresh fleet snapshot minus drivers already reserved or excluded.
fn candidate_pool(state: &AppState, excluded: &[Uuid]) -> Vec<DriverCandidate> {
    state
        .fleet
        .iter()
        .filter(|entry| !excluded.contains(entry.key()))
        .filter(|entry| !state.reservations.is_reserved(entry.key()))
        .map(|entry| entry.value().clone())
        .collect()
}

fn current_request(state: &AppState, request_id: Uuid) -> Result<RideRequest, AppError> {
    state
        .requests
        .get(&request_id)
        .map(|request| request.clone())
        .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))
}

/// Marks PENDING requests older than the expiry window as EXPIRED.
pub fn expire_stale_requests(state: &AppState, now: DateTime<Utc>) -> Vec<Uuid> {
    let Some(window) = Duration::try_seconds(state.matching.request_expiry_secs) else {
        return Vec::new();
    };
    let mut expired = Vec::new();

    for mut request in state.requests.iter_mut() {
        if request.status == RequestStatus::Pending && now - request.requested_at >= window {
            request.status = RequestStatus::Expired;
            request.updated_at = now;
            expired.push((request.id, request.requester_id));
        }
    }

    for (request_id, requester_id) in &expired {
        state.dispatcher.enqueue(NotificationEvent::new(
            PriorityClass::Informational,
            Audience::Requester,
            NotificationPayload {
                label: "REQUEST_EXPIRED".to_string(),
                message: "No driver could be found for your ride request".to_string(),
                request_id: Some(*request_id),
                requester_id: Some(*requester_id),
                occurred_at: Some(now),
                ..NotificationPayload::default()
            },
        ));
        info!(request_id = %request_id, "ride request expired");
    }

    expired.into_iter().map(|(request_id, _)| request_id).collect()
}

pub async fn run_expiry_sweeper(state: Arc<AppState>) {
    info!("request expiry sweeper started");

    let mut ticker = interval(TokioDuration::from_millis(
        state.matching.expiry_sweep_interval_ms,
    ));
    loop {
        ticker.tick().await;
        expire_stale_requests(&state, Utc::now());
    }
}
