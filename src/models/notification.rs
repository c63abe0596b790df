use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::trip::TripState;

/// Delivery priority. Variant order is dequeue order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityClass {
    Emergency,
    TripUpdate,
    Informational,
}

impl PriorityClass {
    pub fn as_str(self) -> &'static str {
        match self {
            PriorityClass::Emergency => "EMERGENCY",
            PriorityClass::TripUpdate => "TRIP_UPDATE",
            PriorityClass::Informational => "INFORMATIONAL",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Audience {
    Requester,
    Driver,
    Both,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryState {
    Pending,
    Delivered,
    FailedRetrying,
    FailedPermanent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NotificationPayload {
    pub label: String,
    pub message: String,
    pub trip_id: Option<Uuid>,
    pub request_id: Option<Uuid>,
    pub requester_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub state: Option<TripState>,
    pub eta_minutes: Option<f64>,
    /// When the announced change happened, as reported by its source.
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: Uuid,
    pub priority: PriorityClass,
    pub payload: NotificationPayload,
    pub audience: Audience,
    pub created_at: DateTime<Utc>,
    pub delivery_state: DeliveryState,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

impl NotificationEvent {
    pub fn new(priority: PriorityClass, audience: Audience, payload: NotificationPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            priority,
            payload,
            audience,
            created_at: Utc::now(),
            delivery_state: DeliveryState::Pending,
            attempts: 0,
            last_error: None,
            next_attempt_at: None,
            read_at: None,
        }
    }

    /// A TRIP_UPDATE event announcing that a trip entered `state` at `occurred_at`.
    pub fn trip_update(
        trip_id: Uuid,
        request_id: Uuid,
        requester_id: Uuid,
        driver_id: Uuid,
        state: TripState,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            PriorityClass::TripUpdate,
            Audience::Both,
            NotificationPayload {
                label: state.as_str().to_string(),
                message: trip_message(state).to_string(),
                trip_id: Some(trip_id),
                request_id: Some(request_id),
                requester_id: Some(requester_id),
                driver_id: Some(driver_id),
                state: Some(state),
                eta_minutes: None,
                occurred_at: Some(occurred_at),
            },
        )
    }
}

fn trip_message(state: TripState) -> &'static str {
    match state {
        TripState::PendingAssignment => "Looking for a driver",
        TripState::Assigned => "A driver has been assigned to your ride",
        TripState::EnRoute => "Your driver is on the way",
        TripState::Arrived => "Your driver has arrived at the pickup point",
        TripState::ChildPickedUp => "Your child has been picked up",
        TripState::ChildDropped => "Your child has been dropped off at the destination",
        TripState::Completed => "Trip completed",
        TripState::Cancelled => "Trip cancelled",
        TripState::Declined => "The driver declined; finding another driver",
    }
}
