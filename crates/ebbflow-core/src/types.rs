//! Domain types shared by the decision engine, the control loops and the
//! backend adapters.
//!
//! `TargetConfig` is resolved once from the configuration file and never
//! mutated. `CapacityState`, `MetricSample` and `AlertState` are built fresh
//! on every loop iteration and dropped once the decision has been made.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Default alert that signals the alert feed itself is unreliable.
pub const DEFAULT_DEGRADED_ALERT: &str = "RabbitMQStatsZero";

/// Default Alertmanager path listing firing alerts.
pub const DEFAULT_ALERT_PATH: &str = "/api/v1/alerts";

// ── Target configuration ─────────────────────────────────────────

/// Immutable configuration for one control loop.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TargetConfig {
    /// Display name. Pod targets use `{app}-{process_type}`, alert
    /// restarts use the alert name, groups use the group name.
    pub name: String,
    /// What the loop watches and what it acts on.
    pub kind: TargetKind,
    /// Minimum interval between two successful mutating actions.
    #[serde(with = "secs")]
    pub cooldown: Duration,
    /// Sleep between iterations.
    #[serde(with = "secs")]
    pub poll_interval: Duration,
    /// Per-target switch. Combined with the global flag; when either is off
    /// the loop only logs what it would have done.
    pub enabled: bool,
}

impl TargetConfig {
    /// Unique key for this target: `{kind}/{name}`.
    pub fn id(&self) -> String {
        format!("{}/{}", self.kind.label(), self.name)
    }
}

/// The closed set of target kinds, each carrying its own references.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetKind {
    /// Scale a PaaS process type on queue backlog.
    PodScale {
        app: String,
        process_type: String,
        queue: QueueRef,
        policy: ScalePolicy,
        bounds: Bounds,
    },
    /// Restart a PaaS process type when its trigger fires.
    Restart {
        app: String,
        process_type: String,
        trigger: RestartTrigger,
    },
    /// Set the desired capacity of a cloud autoscaling group.
    GroupScale {
        group: String,
        region: String,
        queue: QueueRef,
        policy: ScalePolicy,
        honor_cooldown: bool,
    },
}

impl TargetKind {
    pub fn label(&self) -> &'static str {
        match self {
            TargetKind::PodScale { .. } => "pod-scale",
            TargetKind::Restart { .. } => "restart",
            TargetKind::GroupScale { .. } => "group-scale",
        }
    }
}

/// A queue on a message broker. `broker_env` names the environment
/// variable holding the broker management URL (with credentials).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QueueRef {
    pub name: String,
    pub broker_env: String,
}

/// Linear step scaling parameters.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ScalePolicy {
    /// Depth at or above which the target scales up.
    pub threshold: u64,
    /// Depth below which the target scales down.
    pub watermark: u64,
    pub scale_up_by: u32,
    pub scale_down_by: u32,
}

/// Capacity bounds configured locally (pod targets).
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Bounds {
    pub min: u32,
    pub max: u32,
}

/// What makes a restart target fire.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RestartTrigger {
    /// A named alert firing on an Alertmanager instance.
    Alert {
        alert_host: String,
        /// Path under `alert_host`, `/api/v2/alerts` on Alertmanager 0.27+.
        alert_path: String,
        alert_name: String,
        /// Alert whose presence marks the feed as untrustworthy.
        degraded_alert: String,
        /// Sleep used instead of the poll interval while degraded.
        #[serde(with = "secs")]
        suppression_interval: Duration,
    },
    /// Queue depth at or above `threshold`.
    Backlog { queue: QueueRef, threshold: u64 },
}

// ── Per-iteration snapshots ──────────────────────────────────────

/// A single backlog depth reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSample {
    pub depth: u64,
    pub taken_at: Instant,
}

impl MetricSample {
    pub fn new(depth: u64, taken_at: Instant) -> Self {
        Self { depth, taken_at }
    }
}

/// Current capacity of a target and the bounds it must stay within.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct CapacityState {
    pub current: u32,
    pub min: u32,
    pub max: u32,
}

impl CapacityState {
    pub fn new(current: u32, min: u32, max: u32) -> Self {
        Self { current, min, max }
    }

    /// `min <= current <= max`.
    pub fn in_bounds(&self) -> bool {
        self.min <= self.current && self.current <= self.max
    }
}

/// Firing alerts at one poll, plus whether the feed can be trusted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertState {
    pub firing: BTreeSet<String>,
    /// Set when the degraded-monitoring alert is among `firing`.
    pub monitoring_degraded: bool,
}

impl AlertState {
    pub fn new(firing: BTreeSet<String>, degraded_alert: &str) -> Self {
        let monitoring_degraded = firing.contains(degraded_alert);
        Self {
            firing,
            monitoring_degraded,
        }
    }

    pub fn is_firing(&self, alert_name: &str) -> bool {
        self.firing.contains(alert_name)
    }
}

/// Serialize durations as whole seconds.
mod secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}
