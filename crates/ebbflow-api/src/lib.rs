//! ebbflow-api — HTTP surface for the ebbflow daemon.
//!
//! Read-only: the configured targets and the metrics the control loops
//! record.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | Plain-text status page |
//! | GET | `/api/v1/targets` | Configured targets and loop state as JSON |
//! | GET | `/metrics` | Prometheus exposition |

pub mod handlers;
pub mod status;

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use ebbflow_core::{Config, TargetConfig};
use ebbflow_metrics::MetricsRecorder;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    /// Global scaling switch after environment overrides.
    pub enabled: bool,
    pub targets: Arc<Vec<TargetConfig>>,
    /// Ids of the targets that have a control loop running.
    pub running: Arc<BTreeSet<String>>,
    pub recorder: Arc<MetricsRecorder>,
}

impl ApiState {
    /// `running` is what the orchestrator actually launched; configured
    /// targets missing from it are reported as skipped.
    pub fn new(
        config: &Config,
        running: impl IntoIterator<Item = String>,
        recorder: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            enabled: config.enabled,
            targets: Arc::new(config.targets.clone()),
            running: Arc::new(running.into_iter().collect()),
            recorder,
        }
    }
}

/// Build the complete router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/targets", get(handlers::list_targets))
        .with_state(state.clone());

    Router::new()
        .route("/", get(handlers::index))
        .route("/metrics", get(handlers::prometheus_metrics))
        .with_state(state)
        .nest("/api/v1", api_routes)
}
