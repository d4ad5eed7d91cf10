//! Scale loop: queue depth in, capacity change out.
//!
//! Serves both pod targets and autoscaling groups; they differ only in
//! which metrics are recorded and whether the new capacity is re-read
//! after a successful change.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use ebbflow_autoscale::{decide, Action, CooldownTracker, Reason};
use ebbflow_core::{
    CapacityState, CapacityTarget, MetricSample, MetricSource, ScalePolicy, TargetConfig,
    TargetKind,
};
use ebbflow_metrics::{MetricsRecorder, Outcome};

use crate::Iteration;

/// Which observability series a scale loop feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleFlavor {
    /// `pod_scale_event{service, status}`.
    Pod { service: String },
    /// `group_capacity{name}` and `group_scale_event{name}`.
    Group { group: String },
}

/// Control loop for a capacity target.
pub struct ScaleLoop {
    id: String,
    name: String,
    flavor: ScaleFlavor,
    queue: String,
    policy: ScalePolicy,
    poll_interval: Duration,
    enabled: bool,
    cooldown: CooldownTracker,
    source: Arc<dyn MetricSource>,
    target: Arc<dyn CapacityTarget>,
    recorder: Arc<MetricsRecorder>,
}

impl ScaleLoop {
    /// Build a loop for a `PodScale` or `GroupScale` target. Actions are
    /// only applied when both `global_enabled` and the target's own flag
    /// are set.
    pub fn new(
        config: &TargetConfig,
        global_enabled: bool,
        source: Arc<dyn MetricSource>,
        target: Arc<dyn CapacityTarget>,
        recorder: Arc<MetricsRecorder>,
    ) -> anyhow::Result<Self> {
        let (flavor, queue, policy) = match &config.kind {
            TargetKind::PodScale {
                app,
                process_type,
                queue,
                policy,
                ..
            } => (
                ScaleFlavor::Pod {
                    service: format!("{app}-{process_type}"),
                },
                queue.name.clone(),
                *policy,
            ),
            TargetKind::GroupScale {
                group,
                queue,
                policy,
                ..
            } => (
                ScaleFlavor::Group {
                    group: group.clone(),
                },
                queue.name.clone(),
                *policy,
            ),
            TargetKind::Restart { .. } => {
                anyhow::bail!("target {} is not a capacity target", config.id())
            }
        };

        Ok(Self {
            id: config.id(),
            name: config.name.clone(),
            flavor,
            queue,
            policy,
            poll_interval: config.poll_interval,
            enabled: global_enabled && config.enabled,
            cooldown: CooldownTracker::new(config.cooldown),
            source,
            target,
            recorder,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cooldown(&self) -> &CooldownTracker {
        &self.cooldown
    }

    /// One iteration: fetch depth, fetch capacity, decide, act.
    pub async fn run_once(&mut self, now: Instant) -> Iteration {
        let depth = match self.source.fetch_depth(&self.queue).await {
            Ok(depth) => depth,
            Err(e) => {
                warn!(target_id = %self.id, queue = %self.queue, error = %e, "failed to fetch queue depth");
                return Iteration::FetchFailed;
            }
        };
        let sample = MetricSample::new(depth, now);
        debug!(target_id = %self.id, queue = %self.queue, depth, "queue depth");

        let capacity = match self.target.capacity().await {
            Ok(capacity) => capacity,
            Err(e) => {
                warn!(target_id = %self.id, error = %e, "failed to fetch capacity");
                return Iteration::FetchFailed;
            }
        };
        self.record_observed(&capacity).await;

        let decision = decide(&sample, &capacity, &self.policy, &self.cooldown, now);
        match decision.action {
            Action::ScaleTo(desired) => self.apply(&capacity, desired, decision.reason, now).await,
            Action::NoOp | Action::Restart => {
                self.log_hold(&capacity, depth, decision.reason, now);
                Iteration::Held(decision.reason)
            }
        }
    }

    /// Run until `shutdown` fires, sleeping `poll_interval` between
    /// iterations.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            target_id = %self.id,
            queue = %self.queue,
            interval_secs = self.poll_interval.as_secs(),
            enabled = self.enabled,
            "scale loop started"
        );

        loop {
            self.run_once(tokio::time::Instant::now().into_std()).await;

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown.changed() => {
                    info!(target_id = %self.id, "scale loop shutting down");
                    break;
                }
            }
        }
    }

    async fn apply(
        &mut self,
        capacity: &CapacityState,
        desired: u32,
        reason: Reason,
        now: Instant,
    ) -> Iteration {
        let from = capacity.current;

        if !self.enabled {
            info!(target_id = %self.id, from, to = desired, %reason, "scaling disabled, not applying");
            return Iteration::DryRun(Action::ScaleTo(desired));
        }

        info!(target_id = %self.id, from, to = desired, %reason, "scaling");
        if let ScaleFlavor::Group { group } = &self.flavor {
            self.recorder.record_group_scale(group).await;
        }

        match self.target.set_capacity(desired).await {
            Ok(()) => {
                self.cooldown.record(now);
                if let ScaleFlavor::Pod { service } = &self.flavor {
                    self.recorder
                        .record_pod_capacity(service, Outcome::Success, desired)
                        .await;
                    match self.target.capacity().await {
                        Ok(after) => info!(target_id = %self.id, pods = after.current, "pod count now"),
                        Err(e) => debug!(target_id = %self.id, error = %e, "could not re-read pod count"),
                    }
                }
                Iteration::Scaled { from, to: desired }
            }
            Err(e) => {
                if let ScaleFlavor::Pod { service } = &self.flavor {
                    self.recorder
                        .record_pod_capacity(service, Outcome::Failed, desired)
                        .await;
                }
                warn!(target_id = %self.id, to = desired, error = %e, "scale request rejected");
                Iteration::ScaleFailed { to: desired }
            }
        }
    }

    async fn record_observed(&self, capacity: &CapacityState) {
        match &self.flavor {
            ScaleFlavor::Pod { service } => {
                self.recorder
                    .record_pod_capacity(service, Outcome::Success, capacity.current)
                    .await
            }
            ScaleFlavor::Group { group } => {
                self.recorder
                    .record_group_capacity(group, capacity.current)
                    .await
            }
        }
    }

    fn log_hold(&self, capacity: &CapacityState, depth: u64, reason: Reason, now: Instant) {
        match reason {
            Reason::Anomaly => warn!(
                target_id = %self.id,
                current = capacity.current,
                min = capacity.min,
                max = capacity.max,
                "capacity outside bounds, leaving it alone"
            ),
            Reason::WithinCooldown => info!(
                target_id = %self.id,
                depth,
                remaining_secs = self.cooldown.remaining(now).as_secs(),
                "within cooldown, not scaling"
            ),
            _ => debug!(
                target_id = %self.id,
                depth,
                current = capacity.current,
                %reason,
                "no scaling needed"
            ),
        }
    }
}
