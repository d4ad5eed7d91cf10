//! ebbflowd — the ebbflow daemon.
//!
//! Loads the target configuration, logs in to the PaaS controller, starts
//! one control loop per target and serves the status page and metrics.
//!
//! # Usage
//!
//! ```text
//! ebbflowd --config /etc/ebbflow/ebbflow.toml --port 8080
//! ```

mod backends;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ebbflow_api::{build_router, ApiState};
use ebbflow_control::Orchestrator;
use ebbflow_core::config::{CONFIG_ENV, DEFAULT_CONFIG_PATH, STATE_ENV};
use ebbflow_core::Config;
use ebbflow_metrics::MetricsRecorder;
use ebbflow_sources::ControllerClient;

use crate::backends::{controller_credentials, needs_controller, DaemonBackends};

#[derive(Parser)]
#[command(name = "ebbflowd", about = "Queue-backlog autoscaler daemon")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = CONFIG_ENV, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Port for the status and metrics server.
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Per-request timeout for backend calls, in seconds.
    #[arg(long, default_value = "10")]
    timeout: u64,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    run(cli).await
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ebbflow=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!(config = ?cli.config, "ebbflow daemon starting");

    let state = std::env::var(STATE_ENV).ok();
    let config = Config::load(&cli.config, state.as_deref())?;
    info!(
        targets = config.targets.len(),
        enabled = config.enabled,
        "configuration loaded"
    );

    let timeout = Duration::from_secs(cli.timeout);

    // ── Controller login ───────────────────────────────────────

    let controller = if needs_controller(&config) {
        let (url, username, password) = controller_credentials(|key| std::env::var(key).ok())?;
        let client = ControllerClient::login(&url, &username, &password, timeout).await?;
        Some(Arc::new(client))
    } else {
        None
    };

    // ── Control loops ──────────────────────────────────────────

    let recorder = Arc::new(MetricsRecorder::new());
    let mut orchestrator = Orchestrator::new(recorder.clone());
    let backends = DaemonBackends::new(timeout, controller);
    let started = orchestrator.launch(&config, &backends)?;
    if started < config.targets.len() {
        warn!(
            skipped = config.targets.len() - started,
            "some targets have no backend and will not run"
        );
    }

    // ── Status server ──────────────────────────────────────────

    let router = build_router(ApiState::new(
        &config,
        orchestrator.active_targets(),
        recorder,
    ));
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "status server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    orchestrator.shutdown().await;
    info!("ebbflow daemon stopped");
    Ok(())
}
