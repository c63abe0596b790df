use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::sos::{list_alerts, resolve_sos, trigger_sos, SosTrigger};
use crate::error::AppError;
use crate::models::sos::SosAlert;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sos", post(raise).get(list))
        .route("/sos/:id/resolve", post(resolve))
}

#[derive(Deserialize, Default)]
pub struct ResolveRequest {
    pub notes: Option<String>,
}

async fn raise(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SosTrigger>,
) -> Result<(StatusCode, Json<SosAlert>), AppError> {
    let alert = trigger_sos(&state, payload)?;
    Ok((StatusCode::CREATED, Json(alert)))
}

async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<SosAlert>> {
    Json(list_alerts(&state))
}

async fn resolve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<ResolveRequest>>,
) -> Result<Json<SosAlert>, AppError> {
    let notes = payload.and_then(|Json(body)| body.notes);
    Ok(Json(resolve_sos(&state, id, notes)?))
}
