//! Restart loop: restarts a process type when an alert fires or its queue
//! backs up.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use ebbflow_autoscale::{
    decide_alert_restart, decide_backlog_restart, gate, Action, CooldownTracker, Decision, Reason,
};
use ebbflow_core::{
    AlertSource, AlertState, MetricSample, MetricSource, RestartTarget, RestartTrigger,
    TargetConfig, TargetKind,
};
use ebbflow_metrics::{MetricsRecorder, Outcome};

use crate::Iteration;

/// Where a restart loop gets its signal from.
pub enum RestartSignal {
    Alerts {
        source: Arc<dyn AlertSource>,
        alert_name: String,
        degraded_alert: String,
        suppression_interval: Duration,
    },
    Backlog {
        source: Arc<dyn MetricSource>,
        queue: String,
        threshold: u64,
    },
}

/// Control loop for a restart target.
pub struct RestartLoop {
    id: String,
    service: String,
    signal: RestartSignal,
    poll_interval: Duration,
    enabled: bool,
    cooldown: CooldownTracker,
    target: Arc<dyn RestartTarget>,
    recorder: Arc<MetricsRecorder>,
}

impl RestartLoop {
    /// Build a loop for a `Restart` target. `signal` must match the
    /// target's trigger.
    pub fn new(
        config: &TargetConfig,
        global_enabled: bool,
        signal: RestartSignal,
        target: Arc<dyn RestartTarget>,
        recorder: Arc<MetricsRecorder>,
    ) -> anyhow::Result<Self> {
        let TargetKind::Restart {
            app,
            process_type,
            trigger,
        } = &config.kind
        else {
            anyhow::bail!("target {} is not a restart target", config.id());
        };

        match (trigger, &signal) {
            (RestartTrigger::Alert { .. }, RestartSignal::Alerts { .. })
            | (RestartTrigger::Backlog { .. }, RestartSignal::Backlog { .. }) => {}
            _ => anyhow::bail!(
                "target {}: signal does not match restart trigger",
                config.id()
            ),
        }

        Ok(Self {
            id: config.id(),
            service: format!("{app}-{process_type}"),
            signal,
            poll_interval: config.poll_interval,
            enabled: global_enabled && config.enabled,
            cooldown: CooldownTracker::new(config.cooldown),
            target,
            recorder,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cooldown(&self) -> &CooldownTracker {
        &self.cooldown
    }

    /// One iteration: read the signal, decide, restart.
    pub async fn run_once(&mut self, now: Instant) -> Iteration {
        let decision = match self.observe(now).await {
            Some(decision) => decision,
            None => return Iteration::FetchFailed,
        };

        if decision.reason == Reason::MonitoringDegraded {
            warn!(target_id = %self.id, "alert feed degraded, suppressing restarts");
            return Iteration::Suppressed;
        }

        let decision = gate(decision, None, &self.cooldown, now);
        match decision.action {
            Action::Restart => self.restart(decision.reason, now).await,
            Action::NoOp | Action::ScaleTo(_) => {
                if decision.reason == Reason::WithinCooldown {
                    info!(
                        target_id = %self.id,
                        remaining_secs = self.cooldown.remaining(now).as_secs(),
                        "restarted recently, waiting"
                    );
                } else {
                    debug!(target_id = %self.id, reason = %decision.reason, "no restart needed");
                }
                Iteration::Held(decision.reason)
            }
        }
    }

    /// Run until `shutdown` fires. While the alert feed is degraded the
    /// loop sleeps the suppression interval instead of the poll interval.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            target_id = %self.id,
            interval_secs = self.poll_interval.as_secs(),
            enabled = self.enabled,
            "restart loop started"
        );

        loop {
            let outcome = self.run_once(tokio::time::Instant::now().into_std()).await;
            let pause = match (&outcome, &self.signal) {
                (
                    Iteration::Suppressed,
                    RestartSignal::Alerts {
                        suppression_interval,
                        ..
                    },
                ) => *suppression_interval,
                _ => self.poll_interval,
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.changed() => {
                    info!(target_id = %self.id, "restart loop shutting down");
                    break;
                }
            }
        }
    }

    async fn observe(&self, now: Instant) -> Option<Decision> {
        match &self.signal {
            RestartSignal::Alerts {
                source,
                alert_name,
                degraded_alert,
                ..
            } => match source.firing_alerts().await {
                Ok(firing) => {
                    let state = AlertState::new(firing, degraded_alert);
                    Some(decide_alert_restart(&state, alert_name))
                }
                Err(e) => {
                    warn!(target_id = %self.id, error = %e, "failed to fetch alerts");
                    None
                }
            },
            RestartSignal::Backlog {
                source,
                queue,
                threshold,
            } => match source.fetch_depth(queue).await {
                Ok(depth) => {
                    debug!(target_id = %self.id, %queue, depth, "queue depth");
                    Some(decide_backlog_restart(
                        &MetricSample::new(depth, now),
                        *threshold,
                    ))
                }
                Err(e) => {
                    warn!(target_id = %self.id, %queue, error = %e, "failed to fetch queue depth");
                    None
                }
            },
        }
    }

    async fn restart(&mut self, reason: Reason, now: Instant) -> Iteration {
        if !self.enabled {
            info!(target_id = %self.id, service = %self.service, %reason, "restarts disabled, not restarting");
            return Iteration::DryRun(Action::Restart);
        }

        info!(target_id = %self.id, service = %self.service, %reason, "restarting");
        match self.target.restart().await {
            Ok(()) => {
                self.cooldown.record(now);
                self.recorder
                    .record_restart(&self.service, Outcome::Success)
                    .await;
                Iteration::Restarted
            }
            Err(e) => {
                self.recorder
                    .record_restart(&self.service, Outcome::Failed)
                    .await;
                warn!(target_id = %self.id, error = %e, "restart failed");
                Iteration::RestartFailed
            }
        }
    }
}
