use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::notification::NotificationEvent;
use crate::state::AppState;
use crate::tracking::history::{completed_trips, HistoryFilter, TripRecord};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(notification_log))
        .route("/notifications/:id/read", post(mark_read))
        .route("/history", get(trip_history))
}

#[derive(Deserialize)]
pub struct LogQuery {
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread: bool,
}

async fn notification_log(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogQuery>,
) -> Json<Vec<NotificationEvent>> {
    let mut events = state.dispatcher.history(query.since);
    if query.unread {
        events.retain(|event| event.read_at.is_none());
    }
    Json(events)
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationEvent>, AppError> {
    Ok(Json(state.dispatcher.mark_read(id, Utc::now())?))
}

async fn trip_history(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<HistoryFilter>,
) -> Json<Vec<TripRecord>> {
    Json(completed_trips(&state, &filter))
}
