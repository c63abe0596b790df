use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::config::{Config, DeliveryConfig, MatchingConfig};
use crate::engine::reservation::Reservations;
use crate::error::AppError;
use crate::geo::GeoIndex;
use crate::models::driver::DriverCandidate;
use crate::models::notification::NotificationEvent;
use crate::models::request::RideRequest;
use crate::models::sos::SosAlert;
use crate::models::trip::Trip;
use crate::notify::dispatcher::NotificationDispatcher;
use crate::observability::metrics::Metrics;

pub struct AppState {
    /// Latest fleet snapshot, fed by driver location/availability updates.
    pub fleet: DashMap<Uuid, DriverCandidate>,
    pub requests: DashMap<Uuid, RideRequest>,
    /// Each trip behind its own lock; this is the trip's critical section.
    pub trips: DashMap<Uuid, Arc<Mutex<Trip>>>,
    /// Last committed copy of every trip, for readers that must not take the trip lock.
    pub trip_snapshots: DashMap<Uuid, Trip>,
    pub reservations: Reservations,
    pub sos_alerts: DashMap<Uuid, SosAlert>,
    pub dispatcher: NotificationDispatcher,
    pub notification_events_tx: broadcast::Sender<NotificationEvent>,
    pub geo: GeoIndex,
    pub matching: MatchingConfig,
    pub delivery: DeliveryConfig,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        config.validate()?;

        let metrics = Metrics::new();
        let (notification_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        Ok(Self {
            fleet: DashMap::new(),
            requests: DashMap::new(),
            trips: DashMap::new(),
            trip_snapshots: DashMap::new(),
            reservations: Reservations::default(),
            sos_alerts: DashMap::new(),
            dispatcher: NotificationDispatcher::new(
                config.delivery.clone(),
                metrics.notifications_in_queue.clone(),
            ),
            notification_events_tx,
            geo: GeoIndex::new(&config.matching)?,
            matching: config.matching.clone(),
            delivery: config.delivery.clone(),
            metrics,
        })
    }

    pub fn trip_handle(&self, trip_id: Uuid) -> Result<Arc<Mutex<Trip>>, AppError> {
        self.trips
            .get(&trip_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::Utc;
    use uuid::Uuid;

    use super::AppState;
    use crate::config::Config;
    use crate::engine::assignment::NewRideRequest;
    use crate::models::coordinate::Coordinate;
    use crate::models::driver::DriverCandidate;

    pub const PICKUP: Coordinate = Coordinate {
        lat: 40.7128,
        lng: -74.0060,
    };
    pub const DROPOFF: Coordinate = Coordinate {
        lat: 40.7306,
        lng: -73.9866,
    };

    pub fn app_state() -> AppState {
        AppState::new(&Config::default()).unwrap()
    }

    /// Registers an available driver `north_km` north of the pickup.
    pub fn add_driver(state: &AppState, north_km: f64, rating: f64) -> Uuid {
        let id = Uuid::new_v4();
        state.fleet.insert(
            id,
            DriverCandidate {
                id,
                name: format!("driver-{id}"),
                location: Coordinate {
                    lat: PICKUP.lat + north_km / 111.195,
                    lng: PICKUP.lng,
                },
                available: true,
                at_capacity: false,
                rating,
                updated_at: Utc::now(),
            },
        );
        id
    }

    pub fn ride_request() -> NewRideRequest {
        NewRideRequest {
            requester_id: Uuid::new_v4(),
            origin: PICKUP,
            destination: DROPOFF,
            max_distance_km: None,
            min_rating: None,
        }
    }
}
