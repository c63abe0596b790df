use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::coordinate::Coordinate;
use crate::models::notification::{
    Audience, NotificationEvent, NotificationPayload, PriorityClass,
};
use crate::models::sos::SosAlert;
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SosTrigger {
    pub trip_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub raised_by: Option<Uuid>,
    pub location: Option<Coordinate>,
    pub message: Option<String>,
}

/// Raises an emergency alert. Reads only committed snapshots, so it never
/// waits behind a trip mutation, and its EMERGENCY event jumps the queue.
pub fn trigger_sos(state: &AppState, trigger: SosTrigger) -> Result<SosAlert, AppError> {
    if trigger.trip_id.is_none() && trigger.driver_id.is_none() {
        return Err(AppError::BadRequest(
            "an SOS needs a trip_id or a driver_id".to_string(),
        ));
    }
    if let Some(location) = &trigger.location {
        location.validate()?;
    }

    // A driver-only alert attaches to the trip the driver currently holds.
    let trip_id = trigger.trip_id.or_else(|| {
        trigger
            .driver_id
            .and_then(|driver_id| state.reservations.holder(&driver_id))
    });
    let trip = match trip_id {
        Some(trip_id) => Some(
            state
                .trip_snapshots
                .get(&trip_id)
                .map(|trip| trip.clone())
                .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))?,
        ),
        None => None,
    };

    let driver_id = trigger.driver_id.or(trip.as_ref().map(|trip| trip.driver_id));
    let driver_location = match driver_id {
        Some(driver_id) => match state.fleet.get(&driver_id) {
            Some(driver) => Some(driver.location),
            None if trip.is_none() => {
                return Err(AppError::NotFound(format!("driver {driver_id} not found")));
            }
            None => None,
        },
        None => None,
    };
    let location = trigger.location.or(driver_location);

    let message = trigger
        .message
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| "Emergency alert raised".to_string());

    let raised_at = Utc::now();
    let event = NotificationEvent::new(
        PriorityClass::Emergency,
        Audience::Both,
        NotificationPayload {
            label: "SOS".to_string(),
            message: match &location {
                Some(at) => format!("{message} at ({:.6}, {:.6})", at.lat, at.lng),
                None => message.clone(),
            },
            trip_id: trip.as_ref().map(|trip| trip.id),
            request_id: trip.as_ref().map(|trip| trip.request_id),
            requester_id: trip.as_ref().map(|trip| trip.requester_id),
            driver_id,
            state: trip.as_ref().map(|trip| trip.state),
            eta_minutes: None,
            occurred_at: Some(raised_at),
        },
    );

    let alert = SosAlert {
        id: Uuid::new_v4(),
        trip_id: trip.as_ref().map(|trip| trip.id),
        driver_id,
        raised_by: trigger.raised_by,
        location,
        message,
        notification_id: event.id,
        resolved: false,
        resolved_at: None,
        notes: None,
        created_at: event.created_at,
    };

    state.dispatcher.enqueue(event);
    state.sos_alerts.insert(alert.id, alert.clone());

    error!(
        alert_id = %alert.id,
        trip_id = ?alert.trip_id,
        driver_id = ?alert.driver_id,
        "SOS alert raised"
    );

    Ok(alert)
}

pub fn resolve_sos(
    state: &AppState,
    alert_id: Uuid,
    notes: Option<String>,
) -> Result<SosAlert, AppError> {
    let mut alert = state
        .sos_alerts
        .get_mut(&alert_id)
        .ok_or_else(|| AppError::NotFound(format!("sos alert {alert_id} not found")))?;

    if alert.resolved {
        return Err(AppError::InvalidState(format!(
            "sos alert {alert_id} is already resolved"
        )));
    }

    alert.resolved = true;
    alert.resolved_at = Some(Utc::now());
    alert.notes = notes;

    state.dispatcher.enqueue(NotificationEvent::new(
        PriorityClass::Informational,
        Audience::Both,
        NotificationPayload {
            label: "SOS_RESOLVED".to_string(),
            message: "The emergency alert has been resolved".to_string(),
            trip_id: alert.trip_id,
            driver_id: alert.driver_id,
            occurred_at: alert.resolved_at,
            ..NotificationPayload::default()
        },
    ));

    info!(alert_id = %alert_id, "SOS alert resolved");
    Ok(alert.clone())
}

pub fn list_alerts(state: &AppState) -> Vec<SosAlert> {
    let mut alerts: Vec<SosAlert> = state
        .sos_alerts
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    alerts
}
