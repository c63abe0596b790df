//! Trip state machine operations.
//!
//! Every mutation runs under the trip's own mutex. Before the lock is
//! released the new state is published to `trip_snapshots` and exactly one
//! notification is enqueued, so readers and the delivery worker never need
//! the trip lock themselves.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::assignment::assign_request;
use crate::engine::matching::MatchedCandidate;
use crate::error::AppError;
use crate::models::coordinate::Coordinate;
use crate::models::notification::{
    Audience, NotificationEvent, NotificationPayload, PriorityClass,
};
use crate::models::request::{RequestStatus, RideRequest};
use crate::models::trip::{Checkpoint, CheckpointLabel, CheckpointOutcome, Trip, TripState};
use crate::state::AppState;

/// PENDING_ASSIGNMENT → ASSIGNED. Re-validates the driver against the live
/// fleet and reserves them atomically before the trip exists.
pub fn create_trip(
    state: &AppState,
    request_id: Uuid,
    matched: &MatchedCandidate,
) -> Result<Trip, AppError> {
    let driver_id = matched.candidate.id;

    let mut request = state
        .requests
        .get_mut(&request_id)
        .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))?;

    if let Some(active_trip) = request.active_trip {
        return Err(AppError::InvalidState(format!(
            "request {request_id} already has trip {active_trip}"
        )));
    }
    if request.status != RequestStatus::Pending {
        return Err(AppError::InvalidState(format!(
            "request {request_id} is {:?}, expected PENDING",
            request.status
        )));
    }

    let driver_location = match state.fleet.get(&driver_id) {
        Some(driver) if driver.can_take_ride() => driver.location,
        _ => return Err(AppError::CandidateNoLongerAvailable),
    };

    let trip_id = Uuid::new_v4();
    state.reservations.reserve(driver_id, trip_id)?;

    let now = Utc::now();
    let trip = Trip {
        id: trip_id,
        request_id,
        requester_id: request.requester_id,
        driver_id,
        origin: request.origin,
        destination: request.destination,
        state: TripState::Assigned,
        checkpoints: Vec::new(),
        accepted_at: None,
        created_at: now,
        updated_at: now,
        completed_at: None,
        cancelled_at: None,
    };

    request.status = RequestStatus::Assigned;
    request.active_trip = Some(trip_id);
    request.updated_at = now;

    state
        .trips
        .insert(trip_id, Arc::new(tokio::sync::Mutex::new(trip.clone())));
    state.metrics.active_trips.inc();
    commit(state, &trip, Some(&driver_location), now);
    drop(request);

    info!(
        trip_id = %trip_id,
        request_id = %request_id,
        driver_id = %driver_id,
        distance_km = matched.distance_km,
        "trip assigned"
    );

    Ok(trip)
}

/// Records the driver's acknowledgement. Not a state transition: the trip
/// stays ASSIGNED and repeat calls are no-ops.
pub async fn accept_assignment(
    state: &AppState,
    trip_id: Uuid,
    driver_id: Uuid,
) -> Result<Trip, AppError> {
    let handle = state.trip_handle(trip_id)?;
    let mut trip = handle.lock().await;

    ensure_assigned_driver(&trip, driver_id)?;
    if trip.state.is_terminal() {
        return Err(AppError::InvalidState(format!(
            "trip {trip_id} is already {}",
            trip.state.as_str()
        )));
    }
    if trip.accepted_at.is_some() || trip.state != TripState::Assigned {
        return Ok(trip.clone());
    }

    let now = Utc::now();
    trip.accepted_at = Some(now);
    trip.updated_at = now;
    state.trip_snapshots.insert(trip.id, trip.clone());

    state.dispatcher.enqueue(NotificationEvent::new(
        PriorityClass::Informational,
        Audience::Requester,
        NotificationPayload {
            label: "ASSIGNMENT_ACCEPTED".to_string(),
            message: "Your driver accepted the ride".to_string(),
            trip_id: Some(trip.id),
            request_id: Some(trip.request_id),
            requester_id: Some(trip.requester_id),
            driver_id: Some(trip.driver_id),
            state: Some(trip.state),
            eta_minutes: driver_eta(state, &trip),
            occurred_at: Some(now),
        },
    ));

    info!(trip_id = %trip_id, driver_id = %driver_id, "assignment accepted");
    Ok(trip.clone())
}

pub async fn record_checkpoint(
    state: &AppState,
    trip_id: Uuid,
    label: CheckpointLabel,
    timestamp: DateTime<Utc>,
    location: Option<Coordinate>,
) -> Result<Checkpoint, AppError> {
    if let Some(location) = &location {
        location.validate()?;
    }

    let handle = state.trip_handle(trip_id)?;
    let mut trip = handle.lock().await;

    let outcome = match trip.apply_checkpoint(label, timestamp, location) {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(trip_id = %trip_id, label = ?label, error = %err, "checkpoint rejected");
            return Err(err);
        }
    };

    match &outcome {
        CheckpointOutcome::Recorded(_) => {
            if trip.state == TripState::Completed {
                state.reservations.release(trip.driver_id, trip.id);
                state.metrics.active_trips.dec();
            }

            // Snapshot first: a feed read never pairs the new position with the old state.
            commit(state, &trip, location.as_ref(), timestamp);
            if let Some(location) = location {
                refresh_driver_location(state, trip.driver_id, location, timestamp);
            }
            info!(
                trip_id = %trip_id,
                state = trip.state.as_str(),
                "checkpoint recorded"
            );
        }
        CheckpointOutcome::Unchanged(_) => {
            debug!(trip_id = %trip_id, label = ?label, "duplicate checkpoint ignored");
        }
    }

    Ok(outcome.checkpoint().clone())
}

#[derive(Debug, Clone, Serialize)]
pub struct DeclineOutcome {
    pub declined: Trip,
    /// The replacement trip, if re-matching found another driver.
    pub reassigned: Option<Trip>,
}

/// ASSIGNED → DECLINED, then re-enter matching without the declining driver.
pub async fn decline_assignment(
    state: &AppState,
    trip_id: Uuid,
    driver_id: Uuid,
) -> Result<DeclineOutcome, AppError> {
    let declined = {
        let handle = state.trip_handle(trip_id)?;
        let mut trip = handle.lock().await;

        ensure_assigned_driver(&trip, driver_id)?;
        trip.decline()?;
        state.reservations.release(driver_id, trip_id);
        state.metrics.active_trips.dec();

        if let Some(mut request) = state.requests.get_mut(&trip.request_id) {
            if request.active_trip == Some(trip_id) {
                request.active_trip = None;
                request.status = RequestStatus::Pending;
                request.declined_by.push(driver_id);
                request.updated_at = Utc::now();
            }
        }

        commit(state, &trip, None, trip.updated_at);
        trip.clone()
    };

    info!(trip_id = %trip_id, driver_id = %driver_id, "assignment declined; re-matching");

    let reassigned = match assign_request(state, declined.request_id) {
        Ok(trip) => Some(trip),
        Err(err) => {
            warn!(
                request_id = %declined.request_id,
                error = %err,
                "re-match after decline failed; request left pending"
            );
            None
        }
    };

    Ok(DeclineOutcome {
        declined,
        reassigned,
    })
}

/// Forced transition to CANCELLED from any non-terminal state.
pub async fn cancel_trip(state: &AppState, trip_id: Uuid) -> Result<Trip, AppError> {
    let handle = state.trip_handle(trip_id)?;
    let mut trip = handle.lock().await;

    if let Err(err) = trip.cancel() {
        warn!(trip_id = %trip_id, error = %err, "cancellation rejected");
        return Err(err);
    }
    state.reservations.release(trip.driver_id, trip.id);
    state.metrics.active_trips.dec();

    if let Some(mut request) = state.requests.get_mut(&trip.request_id) {
        request.status = RequestStatus::Cancelled;
        request.active_trip = None;
        request.updated_at = Utc::now();
    }

    commit(state, &trip, None, trip.updated_at);
    info!(trip_id = %trip_id, "trip cancelled");

    Ok(trip.clone())
}

/// Cancels a request: directly while PENDING, through its trip once assigned.
pub async fn cancel_request(state: &AppState, request_id: Uuid) -> Result<RideRequest, AppError> {
    let active_trip = {
        let mut request = state
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))?;

        match request.status {
            RequestStatus::Pending => {
                request.status = RequestStatus::Cancelled;
                request.updated_at = Utc::now();

                state.dispatcher.enqueue(NotificationEvent::new(
                    PriorityClass::Informational,
                    Audience::Requester,
                    NotificationPayload {
                        label: "REQUEST_CANCELLED".to_string(),
                        message: "Your ride request was cancelled".to_string(),
                        request_id: Some(request_id),
                        requester_id: Some(request.requester_id),
                        occurred_at: Some(request.updated_at),
                        ..NotificationPayload::default()
                    },
                ));
                info!(request_id = %request_id, "pending request cancelled");
                return Ok(request.clone());
            }
            RequestStatus::Assigned => request.active_trip,
            RequestStatus::Cancelled | RequestStatus::Expired => {
                return Err(AppError::InvalidState(format!(
                    "request {request_id} is already {:?}",
                    request.status
                )));
            }
        }
    };

    let trip_id = active_trip.ok_or_else(|| {
        AppError::InvalidState(format!("request {request_id} has no active trip"))
    })?;
    cancel_trip(state, trip_id).await?;

    state
        .requests
        .get(&request_id)
        .map(|request| request.clone())
        .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))
}

fn ensure_assigned_driver(trip: &Trip, driver_id: Uuid) -> Result<(), AppError> {
    if trip.driver_id != driver_id {
        return Err(AppError::InvalidState(format!(
            "driver {driver_id} is not assigned to trip {}",
            trip.id
        )));
    }
    Ok(())
}

/// Publishes the committed trip and emits its TRIP_UPDATE event. Must be
/// called while the caller still owns the trip's critical section.
fn commit(
    state: &AppState,
    trip: &Trip,
    driver_location: Option<&Coordinate>,
    occurred_at: DateTime<Utc>,
) {
    state.trip_snapshots.insert(trip.id, trip.clone());
    state
        .metrics
        .trip_transitions_total
        .with_label_values(&[trip.state.as_str()])
        .inc();

    let mut event = NotificationEvent::trip_update(
        trip.id,
        trip.request_id,
        trip.requester_id,
        trip.driver_id,
        trip.state,
        occurred_at,
    );
    event.payload.eta_minutes = match driver_location {
        Some(location) => trip
            .next_target()
            .and_then(|target| state.geo.eta_minutes(location, &target).ok()),
        None => driver_eta(state, trip),
    };
    state.dispatcher.enqueue(event);
}

pub(crate) fn driver_eta(state: &AppState, trip: &Trip) -> Option<f64> {
    let target = trip.next_target()?;
    let driver = state.fleet.get(&trip.driver_id)?;
    state.geo.eta_minutes(&driver.location, &target).ok()
}

fn refresh_driver_location(
    state: &AppState,
    driver_id: Uuid,
    location: Coordinate,
    at: DateTime<Utc>,
) {
    if let Some(mut driver) = state.fleet.get_mut(&driver_id) {
        if at >= driver.updated_at {
            driver.location = location;
            driver.updated_at = at;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::engine::assignment::{create_ride_request, submit_ride_request};
    use crate::models::notification::PriorityClass;
    use crate::state::testing::{add_driver, app_state, ride_request, DROPOFF};
    use crate::tracking::feed;

    fn assigned_trip(state: &AppState) -> Trip {
        submit_ride_request(state, ride_request())
            .unwrap()
            .trip
            .expect("a driver should be in range")
    }

    async fn advance_to(state: &AppState, trip_id: Uuid, last: CheckpointLabel) {
        let start = Utc::now();
        for (step, label) in CheckpointLabel::ORDER.iter().enumerate() {
            record_checkpoint(
                state,
                trip_id,
                *label,
                start + Duration::seconds(step as i64),
                None,
            )
            .await
            .unwrap();
            if *label == last {
                break;
            }
        }
    }

    #[test]
    fn two_requests_race_for_one_driver() {
        let state = app_state();
        add_driver(&state, 0.5, 4.8);
        let first = create_ride_request(&state, ride_request()).unwrap();
        let second = create_ride_request(&state, ride_request()).unwrap();

        let shared = &state;
        let results: Vec<Result<Trip, AppError>> = thread::scope(|scope| {
            let handles = [first.id, second.id]
                .map(|request_id| scope.spawn(move || assign_request(shared, request_id)));
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect()
        });

        let won = results.iter().filter(|result| result.is_ok()).count();
        let lost = results
            .iter()
            .filter(|result| matches!(result, Err(AppError::NoCandidateFound)))
            .count();
        assert_eq!(won, 1);
        assert_eq!(lost, 1);
        assert_eq!(state.trips.len(), 1);

        let pending = [first.id, second.id]
            .iter()
            .filter(|id| state.requests.get(id).unwrap().status == RequestStatus::Pending)
            .count();
        assert_eq!(pending, 1);
    }

    #[test]
    fn parallel_requests_never_share_a_driver() {
        let state = app_state();
        for km in [0.4, 0.8, 1.2, 1.6] {
            add_driver(&state, km, 4.5);
        }
        let requests: Vec<Uuid> = (0..4)
            .map(|_| create_ride_request(&state, ride_request()).unwrap().id)
            .collect();

        let shared = &state;
        let trips: Vec<Trip> = thread::scope(|scope| {
            let handles: Vec<_> = requests
                .iter()
                .map(|&request_id| scope.spawn(move || assign_request(shared, request_id)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap().unwrap())
                .collect()
        });

        let mut drivers: Vec<Uuid> = trips.iter().map(|trip| trip.driver_id).collect();
        drivers.sort();
        drivers.dedup();
        assert_eq!(drivers.len(), 4);
        assert_eq!(state.reservations.len(), 4);
    }

    #[test]
    fn create_trip_refuses_request_that_already_has_a_trip() {
        let state = app_state();
        add_driver(&state, 0.5, 4.8);
        add_driver(&state, 1.0, 4.8);
        let trip = assigned_trip(&state);

        let result = assign_request(&state, trip.request_id);

        assert!(matches!(result, Err(AppError::InvalidState(_))));
        assert_eq!(state.trips.len(), 1);
    }

    #[tokio::test]
    async fn full_sequence_completes_and_frees_driver() {
        let state = app_state();
        add_driver(&state, 0.5, 4.8);
        let trip = assigned_trip(&state);

        advance_to(&state, trip.id, CheckpointLabel::Completed).await;

        let committed = state.trip_snapshots.get(&trip.id).unwrap().clone();
        assert_eq!(committed.state, TripState::Completed);
        assert_eq!(committed.checkpoints.len(), 5);
        assert!(committed.completed_at.is_some());
        assert!(!state.reservations.is_reserved(&trip.driver_id));
        assert_eq!(state.metrics.active_trips.get(), 0);
    }

    #[tokio::test]
    async fn checkpoint_out_of_order_is_rejected() {
        let state = app_state();
        add_driver(&state, 0.5, 4.8);
        let trip = assigned_trip(&state);

        let result =
            record_checkpoint(&state, trip.id, CheckpointLabel::Arrived, Utc::now(), None).await;

        assert!(matches!(result, Err(AppError::InvalidTransition(_))));
        assert_eq!(
            state.trip_snapshots.get(&trip.id).unwrap().state,
            TripState::Assigned
        );
    }

    #[tokio::test]
    async fn duplicate_checkpoint_records_and_notifies_once() {
        let state = app_state();
        add_driver(&state, 0.5, 4.8);
        let trip = assigned_trip(&state);
        let at = Utc::now();

        let first = record_checkpoint(&state, trip.id, CheckpointLabel::EnRoute, at, None)
            .await
            .unwrap();
        let queued = state.dispatcher.queued();
        let second = record_checkpoint(
            &state,
            trip.id,
            CheckpointLabel::EnRoute,
            at + Duration::seconds(30),
            None,
        )
        .await
        .unwrap();

        assert_eq!(first.timestamp, second.timestamp);
        assert_eq!(state.dispatcher.queued(), queued);
        assert_eq!(state.trip_snapshots.get(&trip.id).unwrap().checkpoints.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicate_checkpoints_commit_once() {
        let state = Arc::new(app_state());
        add_driver(&state, 0.5, 4.8);
        let trip = assigned_trip(&state);
        let trip_id = trip.id;
        let at = Utc::now();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                tokio::spawn(async move {
                    record_checkpoint(&state, trip_id, CheckpointLabel::EnRoute, at, None).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let updates = state
            .dispatcher
            .drain()
            .into_iter()
            .filter(|event| event.payload.state == Some(TripState::EnRoute))
            .count();
        assert_eq!(updates, 1);
        assert_eq!(state.trip_snapshots.get(&trip.id).unwrap().checkpoints.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancel_racing_completion_has_one_winner() {
        let state = Arc::new(app_state());
        add_driver(&state, 0.5, 4.8);
        let trip = assigned_trip(&state);
        let trip_id = trip.id;
        advance_to(&state, trip_id, CheckpointLabel::ChildDropped).await;

        let cancel = {
            let state = state.clone();
            tokio::spawn(async move { cancel_trip(&state, trip_id).await })
        };
        let complete = {
            let state = state.clone();
            tokio::spawn(async move {
                record_checkpoint(
                    &state,
                    trip_id,
                    CheckpointLabel::Completed,
                    Utc::now() + Duration::minutes(5),
                    None,
                )
                .await
            })
        };
        let cancel = cancel.await.unwrap();
        let complete = complete.await.unwrap();

        let final_state = state.trip_snapshots.get(&trip.id).unwrap().state;
        match final_state {
            TripState::Cancelled => {
                assert!(cancel.is_ok());
                assert!(matches!(complete, Err(AppError::InvalidTransition(_))));
            }
            TripState::Completed => {
                assert!(complete.is_ok());
                assert!(matches!(cancel, Err(AppError::InvalidState(_))));
            }
            other => panic!("unexpected final state {other:?}"),
        }
        assert!(!state.reservations.is_reserved(&trip.driver_id));
        assert_eq!(state.metrics.active_trips.get(), 0);
    }

    #[tokio::test]
    async fn checkpoint_location_moves_driver_and_feed_follows() {
        let state = app_state();
        add_driver(&state, 0.5, 4.8);
        let trip = assigned_trip(&state);
        advance_to(&state, trip.id, CheckpointLabel::Arrived).await;

        record_checkpoint(
            &state,
            trip.id,
            CheckpointLabel::ChildPickedUp,
            Utc::now() + Duration::minutes(1),
            Some(trip.origin),
        )
        .await
        .unwrap();

        let view = feed::snapshot(&state, trip.id).unwrap();
        assert_eq!(view.current_state, TripState::ChildPickedUp);
        assert_eq!(view.checkpoints.len(), 3);
        assert_eq!(view.driver_location, Some(trip.origin));
        let eta = view.eta_minutes.unwrap();
        let expected = state.geo.eta_minutes(&trip.origin, &DROPOFF).unwrap();
        assert!((eta - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn checkpoint_event_carries_transition_time_and_reported_position() {
        let state = app_state();
        add_driver(&state, 0.5, 4.8);
        let trip = assigned_trip(&state);
        advance_to(&state, trip.id, CheckpointLabel::Arrived).await;
        state.dispatcher.drain();

        let picked_up_at = Utc::now() + Duration::minutes(2);
        record_checkpoint(
            &state,
            trip.id,
            CheckpointLabel::ChildPickedUp,
            picked_up_at,
            Some(trip.origin),
        )
        .await
        .unwrap();

        let events = state.dispatcher.drain();
        assert_eq!(events.len(), 1);
        let payload = &events[0].payload;
        assert_eq!(payload.state, Some(TripState::ChildPickedUp));
        assert_eq!(payload.occurred_at, Some(picked_up_at));
        let expected = state.geo.eta_minutes(&trip.origin, &DROPOFF).unwrap();
        assert!((payload.eta_minutes.unwrap() - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn decline_rematches_without_the_declining_driver() {
        let state = app_state();
        let near = add_driver(&state, 0.5, 4.8);
        let far = add_driver(&state, 2.0, 4.8);
        let trip = assigned_trip(&state);
        assert_eq!(trip.driver_id, near);

        let outcome = decline_assignment(&state, trip.id, near).await.unwrap();

        assert_eq!(outcome.declined.state, TripState::Declined);
        let reassigned = outcome.reassigned.expect("second driver should be matched");
        assert_eq!(reassigned.driver_id, far);
        assert!(!state.reservations.is_reserved(&near));

        let request = state.requests.get(&trip.request_id).unwrap().clone();
        assert_eq!(request.status, RequestStatus::Assigned);
        assert_eq!(request.active_trip, Some(reassigned.id));
        assert_eq!(request.declined_by, vec![near]);
    }

    #[tokio::test]
    async fn decline_without_alternatives_leaves_request_pending() {
        let state = app_state();
        let only = add_driver(&state, 0.5, 4.8);
        let trip = assigned_trip(&state);

        let outcome = decline_assignment(&state, trip.id, only).await.unwrap();

        assert!(outcome.reassigned.is_none());
        let request = state.requests.get(&trip.request_id).unwrap().clone();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.active_trip, None);
    }

    #[tokio::test]
    async fn decline_rules() {
        let state = app_state();
        let driver = add_driver(&state, 0.5, 4.8);
        let trip = assigned_trip(&state);

        let stranger = decline_assignment(&state, trip.id, Uuid::new_v4()).await;
        assert!(matches!(stranger, Err(AppError::InvalidState(_))));

        advance_to(&state, trip.id, CheckpointLabel::EnRoute).await;
        let too_late = decline_assignment(&state, trip.id, driver).await;
        assert!(matches!(too_late, Err(AppError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn accept_is_idempotent_and_driver_scoped() {
        let state = app_state();
        let driver = add_driver(&state, 0.5, 4.8);
        let trip = assigned_trip(&state);

        let first = accept_assignment(&state, trip.id, driver).await.unwrap();
        let queued = state.dispatcher.queued();
        let second = accept_assignment(&state, trip.id, driver).await.unwrap();

        assert_eq!(first.state, TripState::Assigned);
        assert_eq!(first.accepted_at, second.accepted_at);
        assert_eq!(state.dispatcher.queued(), queued);

        let stranger = accept_assignment(&state, trip.id, Uuid::new_v4()).await;
        assert!(matches!(stranger, Err(AppError::InvalidState(_))));

        cancel_trip(&state, trip.id).await.unwrap();
        let cancelled = accept_assignment(&state, trip.id, driver).await;
        assert!(matches!(cancelled, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn cancel_request_paths() {
        let state = app_state();

        let pending = create_ride_request(&state, ride_request()).unwrap();
        let cancelled = cancel_request(&state, pending.id).await.unwrap();
        assert_eq!(cancelled.status, RequestStatus::Cancelled);
        let again = cancel_request(&state, pending.id).await;
        assert!(matches!(again, Err(AppError::InvalidState(_))));

        add_driver(&state, 0.5, 4.8);
        let trip = assigned_trip(&state);
        let cancelled = cancel_request(&state, trip.request_id).await.unwrap();
        assert_eq!(cancelled.status, RequestStatus::Cancelled);
        assert_eq!(
            state.trip_snapshots.get(&trip.id).unwrap().state,
            TripState::Cancelled
        );
        assert!(!state.reservations.is_reserved(&trip.driver_id));
    }

    #[tokio::test]
    async fn every_transition_emits_one_trip_update() {
        let state = app_state();
        add_driver(&state, 0.5, 4.8);
        let trip = assigned_trip(&state);
        advance_to(&state, trip.id, CheckpointLabel::Completed).await;

        let updates: Vec<TripState> = state
            .dispatcher
            .drain()
            .into_iter()
            .filter(|event| event.priority == PriorityClass::TripUpdate)
            .filter_map(|event| event.payload.state)
            .collect();

        assert_eq!(
            updates,
            vec![
                TripState::Assigned,
                TripState::EnRoute,
                TripState::Arrived,
                TripState::ChildPickedUp,
                TripState::ChildDropped,
                TripState::Completed,
            ]
        );
    }
}
