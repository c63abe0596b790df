use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::haversine_km;
use crate::models::trip::{Trip, TripState};
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryFilter {
    pub driver_id: Option<Uuid>,
    pub requester_id: Option<Uuid>,
    pub completed_after: Option<DateTime<Utc>>,
    pub completed_before: Option<DateTime<Utc>>,
}

/// One row of the completed-trip export handed to reporting.
#[derive(Debug, Clone, Serialize)]
pub struct TripRecord {
    pub trip_id: Uuid,
    pub request_id: Uuid,
    pub requester_id: Uuid,
    pub driver_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_minutes: f64,
    pub distance_km: f64,
    pub checkpoint_count: usize,
}

impl HistoryFilter {
    fn accepts(&self, trip: &Trip, completed_at: DateTime<Utc>) -> bool {
        self.driver_id.is_none_or(|id| id == trip.driver_id)
            && self.requester_id.is_none_or(|id| id == trip.requester_id)
            && self.completed_after.is_none_or(|after| completed_at >= after)
            && self.completed_before.is_none_or(|before| completed_at < before)
    }
}

/// Completed trips matching `filter`, oldest completion first.
pub fn completed_trips(state: &AppState, filter: &HistoryFilter) -> Vec<TripRecord> {
    let mut records: Vec<TripRecord> = state
        .trip_snapshots
        .iter()
        .filter(|trip| trip.state == TripState::Completed)
        .filter_map(|trip| {
            let completed_at = trip.completed_at?;
            filter.accepts(&trip, completed_at).then(|| to_record(&trip, completed_at))
        })
        .collect();

    records.sort_by(|a, b| {
        a.completed_at
            .cmp(&b.completed_at)
            .then_with(|| a.trip_id.cmp(&b.trip_id))
    });
    records
}

fn to_record(trip: &Trip, completed_at: DateTime<Utc>) -> TripRecord {
    let duration = completed_at - trip.created_at;

    TripRecord {
        trip_id: trip.id,
        request_id: trip.request_id,
        requester_id: trip.requester_id,
        driver_id: trip.driver_id,
        created_at: trip.created_at,
        completed_at,
        duration_minutes: (duration.num_milliseconds().max(0) as f64) / 60_000.0,
        distance_km: haversine_km(&trip.origin, &trip.destination),
        checkpoint_count: trip.checkpoints.len(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::engine::assignment::submit_ride_request;
    use crate::engine::lifecycle::{cancel_trip, decline_assignment, record_checkpoint};
    use crate::models::trip::CheckpointLabel;
    use crate::state::testing::{add_driver, app_state, ride_request};

    fn assigned_trip(state: &AppState) -> Trip {
        submit_ride_request(state, ride_request())
            .unwrap()
            .trip
            .expect("a driver should be in range")
    }

    /// Runs the trip to COMPLETED and returns its completion time.
    async fn complete(state: &AppState, trip: &Trip, start: DateTime<Utc>) -> DateTime<Utc> {
        for (step, label) in CheckpointLabel::ORDER.iter().enumerate() {
            record_checkpoint(state, trip.id, *label, start + Duration::minutes(step as i64), None)
                .await
                .unwrap();
        }
        state.trip_snapshots.get(&trip.id).unwrap().completed_at.unwrap()
    }

    #[tokio::test]
    async fn filters_by_party_and_half_open_completion_window() {
        let state = app_state();
        let first_driver = add_driver(&state, 0.5, 4.8);
        add_driver(&state, 1.5, 4.8);

        let first = assigned_trip(&state);
        assert_eq!(first.driver_id, first_driver);
        let start = Utc::now() + Duration::minutes(1);
        let first_done = complete(&state, &first, start).await;

        state.fleet.get_mut(&first_driver).unwrap().available = false;
        let second = assigned_trip(&state);
        assert_ne!(second.driver_id, first_driver);
        let second_done = complete(&state, &second, start + Duration::hours(1)).await;

        let ids = |filter: HistoryFilter| -> Vec<Uuid> {
            completed_trips(&state, &filter)
                .into_iter()
                .map(|record| record.trip_id)
                .collect()
        };

        assert_eq!(ids(HistoryFilter::default()), vec![first.id, second.id]);
        assert_eq!(
            ids(HistoryFilter {
                driver_id: Some(first_driver),
                ..HistoryFilter::default()
            }),
            vec![first.id]
        );
        assert_eq!(
            ids(HistoryFilter {
                requester_id: Some(second.requester_id),
                ..HistoryFilter::default()
            }),
            vec![second.id]
        );
        assert_eq!(
            ids(HistoryFilter {
                completed_after: Some(first_done),
                ..HistoryFilter::default()
            }),
            vec![first.id, second.id]
        );
        assert_eq!(
            ids(HistoryFilter {
                completed_before: Some(second_done),
                ..HistoryFilter::default()
            }),
            vec![first.id]
        );
        assert!(ids(HistoryFilter {
            completed_after: Some(second_done),
            completed_before: Some(second_done),
            ..HistoryFilter::default()
        })
        .is_empty());
    }

    #[tokio::test]
    async fn declined_and_cancelled_trips_are_left_out() {
        let state = app_state();
        let driver = add_driver(&state, 0.5, 4.8);

        let declined = assigned_trip(&state);
        let outcome = decline_assignment(&state, declined.id, driver).await.unwrap();
        assert!(outcome.reassigned.is_none());

        let cancelled = assigned_trip(&state);
        cancel_trip(&state, cancelled.id).await.unwrap();

        let finished = assigned_trip(&state);
        let completed_at = complete(&state, &finished, Utc::now()).await;

        let records = completed_trips(&state, &HistoryFilter::default());

        assert_eq!(state.trip_snapshots.len(), 3);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.trip_id, finished.id);
        assert_eq!(record.completed_at, completed_at);
        assert_eq!(record.checkpoint_count, CheckpointLabel::ORDER.len());
        assert!(record.distance_km > 0.0);
    }
}
