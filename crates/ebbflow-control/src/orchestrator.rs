//! Orchestrator: builds one control loop per configured target and runs
//! each on its own tokio task.
//!
//! Every loop is built before any is spawned, so a bad credential or URL
//! aborts startup with nothing running.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use ebbflow_core::{
    AlertSource, Bounds, CapacityTarget, Config, MetricSource, QueueRef, RestartTarget,
    RestartTrigger, TargetConfig, TargetKind,
};
use ebbflow_metrics::MetricsRecorder;

use crate::restart_loop::{RestartLoop, RestartSignal};
use crate::scale_loop::ScaleLoop;

/// Builds the collaborators a loop needs. Called once per target during
/// [`Orchestrator::launch`].
pub trait Backends {
    fn metric_source(&self, queue: &QueueRef) -> anyhow::Result<Arc<dyn MetricSource>>;

    fn alert_source(
        &self,
        alert_host: &str,
        alert_path: &str,
    ) -> anyhow::Result<Arc<dyn AlertSource>>;

    fn pod_scaler(
        &self,
        app: &str,
        process_type: &str,
        bounds: Bounds,
    ) -> anyhow::Result<Arc<dyn CapacityTarget>>;

    fn restarter(&self, app: &str, process_type: &str) -> anyhow::Result<Arc<dyn RestartTarget>>;

    /// `None` when no group provider is available; the target is skipped.
    fn group_scaler(
        &self,
        group: &str,
        region: &str,
        honor_cooldown: bool,
    ) -> anyhow::Result<Option<Arc<dyn CapacityTarget>>>;
}

/// A ready-to-run loop of either kind.
pub enum ControlLoop {
    Scale(ScaleLoop),
    Restart(RestartLoop),
}

impl ControlLoop {
    /// Build the loop for `target`, or `None` if its backend is unavailable.
    pub fn build(
        target: &TargetConfig,
        global_enabled: bool,
        backends: &dyn Backends,
        recorder: &Arc<MetricsRecorder>,
    ) -> anyhow::Result<Option<Self>> {
        let control = match &target.kind {
            TargetKind::PodScale {
                app,
                process_type,
                queue,
                bounds,
                ..
            } => {
                let source = backends.metric_source(queue)?;
                let capacity = backends.pod_scaler(app, process_type, *bounds)?;
                ControlLoop::Scale(ScaleLoop::new(
                    target,
                    global_enabled,
                    source,
                    capacity,
                    recorder.clone(),
                )?)
            }
            TargetKind::GroupScale {
                group,
                region,
                queue,
                honor_cooldown,
                ..
            } => {
                let Some(capacity) = backends.group_scaler(group, region, *honor_cooldown)? else {
                    warn!(target_id = %target.id(), "no group provider configured, skipping");
                    return Ok(None);
                };
                let source = backends.metric_source(queue)?;
                ControlLoop::Scale(ScaleLoop::new(
                    target,
                    global_enabled,
                    source,
                    capacity,
                    recorder.clone(),
                )?)
            }
            TargetKind::Restart {
                app,
                process_type,
                trigger,
            } => {
                let signal = match trigger {
                    RestartTrigger::Alert {
                        alert_host,
                        alert_path,
                        alert_name,
                        degraded_alert,
                        suppression_interval,
                    } => RestartSignal::Alerts {
                        source: backends.alert_source(alert_host, alert_path)?,
                        alert_name: alert_name.clone(),
                        degraded_alert: degraded_alert.clone(),
                        suppression_interval: *suppression_interval,
                    },
                    RestartTrigger::Backlog { queue, threshold } => RestartSignal::Backlog {
                        source: backends.metric_source(queue)?,
                        queue: queue.name.clone(),
                        threshold: *threshold,
                    },
                };
                let restarter = backends.restarter(app, process_type)?;
                ControlLoop::Restart(RestartLoop::new(
                    target,
                    global_enabled,
                    signal,
                    restarter,
                    recorder.clone(),
                )?)
            }
        };
        Ok(Some(control))
    }

    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        match self {
            ControlLoop::Scale(l) => l.run(shutdown).await,
            ControlLoop::Restart(l) => l.run(shutdown).await,
        }
    }
}

/// Owns the running loops.
pub struct Orchestrator {
    recorder: Arc<MetricsRecorder>,
    /// Running loops: target id → task.
    loops: BTreeMap<String, JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Orchestrator {
    pub fn new(recorder: Arc<MetricsRecorder>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            recorder,
            loops: BTreeMap::new(),
            shutdown_tx,
        }
    }

    pub fn recorder(&self) -> &Arc<MetricsRecorder> {
        &self.recorder
    }

    /// Build and spawn a loop for every target in `config`. Returns the
    /// number of loops started.
    pub fn launch(&mut self, config: &Config, backends: &dyn Backends) -> anyhow::Result<usize> {
        if !config.enabled {
            warn!("scaling disabled globally, loops will only log intended actions");
        }

        let mut built = Vec::with_capacity(config.targets.len());
        for target in &config.targets {
            let id = target.id();
            if self.loops.contains_key(&id) {
                anyhow::bail!("target {id} is already running");
            }
            let control = ControlLoop::build(target, config.enabled, backends, &self.recorder)
                .with_context(|| format!("failed to set up {id}"))?;
            if let Some(control) = control {
                built.push((id, control));
            }
        }

        let started = built.len();
        for (id, control) in built {
            let shutdown_rx = self.shutdown_tx.subscribe();
            let handle = tokio::spawn(control.run(shutdown_rx));
            debug!(target_id = %id, "control loop spawned");
            self.loops.insert(id, handle);
        }

        info!(count = started, "control loops started");
        Ok(started)
    }

    /// Ids of the targets with a spawned loop, sorted.
    pub fn active_targets(&self) -> Vec<String> {
        self.loops.keys().cloned().collect()
    }

    /// Signal every loop and wait for them to finish their current
    /// iteration.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for (id, handle) in self.loops {
            if let Err(e) = handle.await {
                warn!(target_id = %id, error = %e, "control loop ended abnormally");
            }
        }
        info!("all control loops stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use ebbflow_core::{CapacityState, ScalePolicy, DEFAULT_ALERT_PATH, DEFAULT_DEGRADED_ALERT};
    use ebbflow_metrics::Outcome;
    use ebbflow_sources::{GroupScaler, InMemoryGroups};

    use crate::testing::{FakeAlerts, FakeCapacity, FakeMetrics, FakeRestarter};

    struct FakeBackends {
        metrics: Arc<FakeMetrics>,
        alerts: Arc<FakeAlerts>,
        pods: Arc<FakeCapacity>,
        restarter: Arc<FakeRestarter>,
        groups: Option<Arc<InMemoryGroups>>,
        missing_broker_env: Option<String>,
    }

    impl FakeBackends {
        fn new() -> Self {
            Self {
                metrics: Arc::new(FakeMetrics::new(0)),
                alerts: Arc::new(FakeAlerts::new()),
                pods: Arc::new(FakeCapacity::new(CapacityState::new(2, 1, 10))),
                restarter: Arc::new(FakeRestarter::new()),
                groups: None,
                missing_broker_env: None,
            }
        }
    }

    impl Backends for FakeBackends {
        fn metric_source(&self, queue: &QueueRef) -> anyhow::Result<Arc<dyn MetricSource>> {
            if self.missing_broker_env.as_deref() == Some(queue.broker_env.as_str()) {
                anyhow::bail!("environment variable {} is not set", queue.broker_env);
            }
            Ok(self.metrics.clone())
        }

        fn alert_source(
            &self,
            _alert_host: &str,
            _alert_path: &str,
        ) -> anyhow::Result<Arc<dyn AlertSource>> {
            Ok(self.alerts.clone())
        }

        fn pod_scaler(
            &self,
            _app: &str,
            _process_type: &str,
            _bounds: Bounds,
        ) -> anyhow::Result<Arc<dyn CapacityTarget>> {
            Ok(self.pods.clone())
        }

        fn restarter(
            &self,
            _app: &str,
            _process_type: &str,
        ) -> anyhow::Result<Arc<dyn RestartTarget>> {
            Ok(self.restarter.clone())
        }

        fn group_scaler(
            &self,
            group: &str,
            region: &str,
            honor_cooldown: bool,
        ) -> anyhow::Result<Option<Arc<dyn CapacityTarget>>> {
            Ok(self.groups.as_ref().map(|groups| {
                Arc::new(GroupScaler::new(groups.clone(), group, region, honor_cooldown))
                    as Arc<dyn CapacityTarget>
            }))
        }
    }

    fn queue(name: &str, broker_env: &str) -> QueueRef {
        QueueRef {
            name: name.to_string(),
            broker_env: broker_env.to_string(),
        }
    }

    fn config(enabled: bool) -> Config {
        Config {
            enabled,
            targets: vec![
                TargetConfig {
                    name: "billing-worker".to_string(),
                    kind: TargetKind::PodScale {
                        app: "billing".to_string(),
                        process_type: "worker".to_string(),
                        queue: queue("invoices", "AMQ"),
                        policy: ScalePolicy {
                            threshold: 100,
                            watermark: 20,
                            scale_up_by: 2,
                            scale_down_by: 1,
                        },
                        bounds: Bounds { min: 1, max: 10 },
                    },
                    cooldown: Duration::ZERO,
                    poll_interval: Duration::from_secs(95),
                    enabled: true,
                },
                TargetConfig {
                    name: "ReportWorkerStuck".to_string(),
                    kind: TargetKind::Restart {
                        app: "reports".to_string(),
                        process_type: "worker".to_string(),
                        trigger: RestartTrigger::Alert {
                            alert_host: "http://alerts:9093".to_string(),
                            alert_path: DEFAULT_ALERT_PATH.to_string(),
                            alert_name: "ReportWorkerStuck".to_string(),
                            degraded_alert: DEFAULT_DEGRADED_ALERT.to_string(),
                            suppression_interval: Duration::from_secs(150),
                        },
                    },
                    cooldown: Duration::from_secs(120),
                    poll_interval: Duration::from_secs(60),
                    enabled: true,
                },
                TargetConfig {
                    name: "agents".to_string(),
                    kind: TargetKind::GroupScale {
                        group: "agents".to_string(),
                        region: "us-east-1".to_string(),
                        queue: queue("builds", "BUILD_AMQ"),
                        policy: ScalePolicy {
                            threshold: 100,
                            watermark: 20,
                            scale_up_by: 4,
                            scale_down_by: 2,
                        },
                        honor_cooldown: true,
                    },
                    cooldown: Duration::ZERO,
                    poll_interval: Duration::from_secs(95),
                    enabled: true,
                },
            ],
        }
    }

    #[tokio::test]
    async fn group_without_provider_is_skipped() {
        let mut orchestrator = Orchestrator::new(Arc::new(MetricsRecorder::new()));
        let started = orchestrator.launch(&config(false), &FakeBackends::new()).unwrap();

        assert_eq!(started, 2);
        assert_eq!(
            orchestrator.active_targets(),
            vec![
                "pod-scale/billing-worker".to_string(),
                "restart/ReportWorkerStuck".to_string(),
            ]
        );
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn group_with_provider_is_started() {
        let mut backends = FakeBackends::new();
        backends.groups = Some(Arc::new(
            InMemoryGroups::new().with_group("agents", CapacityState::new(2, 1, 8)),
        ));
        let mut orchestrator = Orchestrator::new(Arc::new(MetricsRecorder::new()));

        assert_eq!(orchestrator.launch(&config(false), &backends).unwrap(), 3);
        assert!(
            orchestrator
                .active_targets()
                .contains(&"group-scale/agents".to_string())
        );
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn setup_error_starts_nothing() {
        let mut backends = FakeBackends::new();
        backends.groups = Some(Arc::new(InMemoryGroups::new()));
        backends.missing_broker_env = Some("BUILD_AMQ".to_string());
        let mut orchestrator = Orchestrator::new(Arc::new(MetricsRecorder::new()));

        let err = orchestrator.launch(&config(true), &backends).unwrap_err();
        assert!(format!("{err:#}").contains("BUILD_AMQ"));
        assert!(orchestrator.active_targets().is_empty());
        assert_eq!(backends.metrics.fetches(), 0);
    }

    #[tokio::test]
    async fn relaunching_same_target_fails() {
        let backends = FakeBackends::new();
        let mut orchestrator = Orchestrator::new(Arc::new(MetricsRecorder::new()));
        orchestrator.launch(&config(false), &backends).unwrap();

        assert!(orchestrator.launch(&config(false), &backends).is_err());
        assert_eq!(orchestrator.active_targets().len(), 2);
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn loops_run_independently_until_shutdown() {
        let backends = FakeBackends::new();
        backends.metrics.set_depth(150);
        backends.alerts.set_firing(&["ReportWorkerStuck"]);
        let recorder = Arc::new(MetricsRecorder::new());
        let mut orchestrator = Orchestrator::new(recorder.clone());
        orchestrator.launch(&config(true), &backends).unwrap();

        // Pod loop at t=0 and t=95; restart loop at t=0, 60 (cooldown), 120.
        tokio::time::sleep(Duration::from_secs(121)).await;
        assert_eq!(backends.pods.set_calls(), vec![4, 6]);
        assert_eq!(backends.restarter.count(), 2);
        assert_eq!(
            recorder.pod_capacity("billing-worker", Outcome::Success).await,
            Some(6)
        );
        assert_eq!(recorder.restarts("reports-worker", Outcome::Success).await, 2);

        orchestrator.shutdown().await;
        let calls = backends.pods.set_calls().len();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(backends.pods.set_calls().len(), calls);
    }

    #[tokio::test]
    async fn disabled_config_never_acts() {
        let backends = FakeBackends::new();
        backends.metrics.set_depth(150);
        let mut orchestrator = Orchestrator::new(Arc::new(MetricsRecorder::new()));
        orchestrator.launch(&config(false), &backends).unwrap();

        tokio::task::yield_now().await;
        orchestrator.shutdown().await;
        assert!(backends.pods.set_calls().is_empty());
    }
}
