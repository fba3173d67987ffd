use crate::endpoints::map::INDEX_HTML;
use crate::engine::overlay::ToggleOutcome;
use crate::engine::raster::ActivationOutcome;
use crate::engine::session::Session;
use crate::engine::status::{StatusBoard, StatusSnapshot};
use crate::error::LayerError;
use crate::models::resource::{LayerRole, ResourceKind};
use crate::viewport::{MapViewport, ViewportSnapshot};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse},
};
use serde::Serialize;
use std::sync::Arc;

pub struct AppState {
    pub session: Session,
    pub viewport: Arc<MapViewport>,
    pub status: Arc<StatusBoard>,
}

#[derive(Serialize)]
struct LayerResponse {
    key: String,
    label: String,
    role: LayerRole,
    kind: ResourceKind,
    opacity: f32,
    loaded: bool,
}

#[derive(Serialize)]
struct ActionResponse {
    ok: bool,
    outcome: &'static str,
    error: Option<String>,
    status: StatusSnapshot,
}

#[derive(Serialize)]
struct StateResponse {
    status: StatusSnapshot,
    viewport: ViewportSnapshot,
}

fn error_code(err: &LayerError) -> StatusCode {
    match err {
        LayerError::UnknownLayer(_) => StatusCode::NOT_FOUND,
        LayerError::WrongRole { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn respond(
    state: &AppState,
    outcome: &'static str,
    failure: Option<LayerError>,
) -> (StatusCode, Json<ActionResponse>) {
    let code = failure.as_ref().map(error_code).unwrap_or(StatusCode::OK);
    (
        code,
        Json(ActionResponse {
            ok: failure.is_none(),
            outcome,
            error: failure.map(|e| e.to_string()),
            status: state.status.snapshot(),
        }),
    )
}

pub async fn viewer_handler() -> impl IntoResponse {
    Html(INDEX_HTML)
}

pub async fn list_layers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cache = state.session.cache();
    let layers: Vec<LayerResponse> = state
        .session
        .catalog()
        .resources()
        .iter()
        .map(|spec| LayerResponse {
            key: spec.key.clone(),
            label: spec.label.clone(),
            role: spec.role,
            kind: spec.kind,
            opacity: spec.opacity,
            loaded: cache.contains(&spec.key),
        })
        .collect();

    (StatusCode::OK, Json(layers))
}

pub async fn activate_base(
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.session.activate_base(&key).await {
        ActivationOutcome::Activated { .. } => respond(&state, "activated", None),
        ActivationOutcome::Superseded { .. } => respond(&state, "superseded", None),
        ActivationOutcome::Failed(err) => respond(&state, "failed", Some(err)),
    }
}

pub async fn toggle_overlay(
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.session.toggle_overlay(&key).await {
        ToggleOutcome::Attached { .. } => respond(&state, "shown", None),
        ToggleOutcome::Detached { .. } => respond(&state, "hidden", None),
        ToggleOutcome::Failed(err) => respond(&state, "failed", Some(err)),
    }
}

pub async fn clear_overlays(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.session.clear_overlays();
    respond(&state, "cleared", None)
}

pub async fn get_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(StateResponse {
        status: state.status.snapshot(),
        viewport: state.viewport.snapshot(),
    })
}
