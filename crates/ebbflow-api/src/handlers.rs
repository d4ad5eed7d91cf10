//! HTTP handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use ebbflow_core::TargetConfig;

use crate::status::render_status;
use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

/// One configured target with its effective switch.
#[derive(Serialize)]
struct TargetView<'a> {
    id: String,
    /// A control loop was launched for this target.
    running: bool,
    /// Running, with the global and per-target flags both on.
    active: bool,
    #[serde(flatten)]
    config: &'a TargetConfig,
}

/// GET /
pub async fn index(State(state): State<ApiState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        render_status(state.enabled, &state.targets, &state.running),
    )
}

/// GET /api/v1/targets
pub async fn list_targets(State(state): State<ApiState>) -> impl IntoResponse {
    let views: Vec<TargetView<'_>> = state
        .targets
        .iter()
        .map(|t| {
            let id = t.id();
            let running = state.running.contains(&id);
            TargetView {
                active: running && state.enabled && t.enabled,
                running,
                id,
                config: t,
            }
        })
        .collect();
    ApiResponse::ok(views).into_response()
}

/// GET /metrics (Prometheus exposition format)
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let families = state.recorder.snapshot().await;
    let body = ebbflow_metrics::render_prometheus(&families);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
