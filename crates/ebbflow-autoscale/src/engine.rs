//! Decision engine: pure functions from one iteration's inputs to an
//! [`Action`].
//!
//! Nothing here performs I/O or logging. The control loop logs the
//! [`Reason`] attached to every [`Decision`].

use std::fmt;
use std::time::Instant;

use ebbflow_core::{AlertState, CapacityState, MetricSample, ScalePolicy};

use crate::cooldown::CooldownTracker;

/// What the control loop should do this iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Leave the target alone.
    NoOp,
    /// Set capacity to exactly this value.
    ScaleTo(u32),
    /// Restart the target's processes.
    Restart,
}

impl Action {
    /// `ScaleTo` and `Restart` change the target; `NoOp` does not.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Action::NoOp)
    }
}

/// Why a decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// Current capacity lies outside `[min, max]`.
    Anomaly,
    OverThreshold,
    AtMaximum,
    UnderWatermark,
    AtMinimum,
    /// Depth within `[watermark, threshold)`.
    DeadZone,
    AlertFiring,
    AlertQuiet,
    MonitoringDegraded,
    BelowThreshold,
    /// The requested capacity equals the current one.
    Unchanged,
    WithinCooldown,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Anomaly => "capacity outside bounds",
            Reason::OverThreshold => "over threshold",
            Reason::AtMaximum => "already at maximum",
            Reason::UnderWatermark => "under watermark",
            Reason::AtMinimum => "already at minimum",
            Reason::DeadZone => "within normal range",
            Reason::AlertFiring => "alert firing",
            Reason::AlertQuiet => "alert not firing",
            Reason::MonitoringDegraded => "monitoring degraded",
            Reason::BelowThreshold => "below threshold",
            Reason::Unchanged => "capacity unchanged",
            Reason::WithinCooldown => "within cooldown",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action together with the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub reason: Reason,
}

impl Decision {
    fn noop(reason: Reason) -> Self {
        Self {
            action: Action::NoOp,
            reason,
        }
    }

    fn scale_to(n: u32, reason: Reason) -> Self {
        Self {
            action: Action::ScaleTo(n),
            reason,
        }
    }

    fn restart() -> Self {
        Self {
            action: Action::Restart,
            reason: Reason::AlertFiring,
        }
    }
}

/// Threshold/watermark rule for capacity targets.
///
/// Rules, in order: out-of-bounds capacity is left alone; depth at or above
/// the threshold steps up by `scale_up_by`, clamped to `max`; depth below
/// the watermark steps down by `scale_down_by`, clamped to `min`; anything
/// in between is the dead zone.
pub fn decide_scale(
    sample: &MetricSample,
    capacity: &CapacityState,
    policy: &ScalePolicy,
) -> Decision {
    if !capacity.in_bounds() {
        return Decision::noop(Reason::Anomaly);
    }

    let current = capacity.current;

    if sample.depth >= policy.threshold {
        let candidate = current.saturating_add(policy.scale_up_by);
        if candidate >= capacity.max {
            if current < capacity.max {
                return Decision::scale_to(capacity.max, Reason::OverThreshold);
            }
            return Decision::noop(Reason::AtMaximum);
        }
        return Decision::scale_to(candidate, Reason::OverThreshold);
    }

    if sample.depth < policy.watermark {
        if current == capacity.min {
            return Decision::noop(Reason::AtMinimum);
        }
        let desired = current
            .saturating_sub(policy.scale_down_by)
            .max(capacity.min);
        return Decision::scale_to(desired, Reason::UnderWatermark);
    }

    Decision::noop(Reason::DeadZone)
}

/// Alert rule for restart targets. A degraded alert feed suppresses every
/// restart regardless of what else is firing.
pub fn decide_alert_restart(alerts: &AlertState, alert_name: &str) -> Decision {
    if alerts.monitoring_degraded {
        return Decision::noop(Reason::MonitoringDegraded);
    }
    if alerts.is_firing(alert_name) {
        Decision::restart()
    } else {
        Decision::noop(Reason::AlertQuiet)
    }
}

/// Backlog rule for restart targets.
pub fn decide_backlog_restart(sample: &MetricSample, threshold: u64) -> Decision {
    if sample.depth >= threshold {
        Decision {
            action: Action::Restart,
            reason: Reason::OverThreshold,
        }
    } else {
        Decision::noop(Reason::BelowThreshold)
    }
}

/// Apply the cooldown rule to a decision.
///
/// A `ScaleTo` equal to the current capacity is a no-op whatever the
/// cooldown says. Any other mutating action inside the window becomes a
/// no-op with [`Reason::WithinCooldown`].
pub fn gate(
    decision: Decision,
    capacity: Option<&CapacityState>,
    cooldown: &CooldownTracker,
    now: Instant,
) -> Decision {
    if let (Action::ScaleTo(n), Some(cap)) = (decision.action, capacity)
        && n == cap.current
    {
        return Decision::noop(Reason::Unchanged);
    }
    if decision.action.is_mutating() && !cooldown.is_ready(now) {
        return Decision::noop(Reason::WithinCooldown);
    }
    decision
}

/// Full decision for a capacity target: scaling rule, then cooldown.
pub fn decide(
    sample: &MetricSample,
    capacity: &CapacityState,
    policy: &ScalePolicy,
    cooldown: &CooldownTracker,
    now: Instant,
) -> Decision {
    gate(decide_scale(sample, capacity, policy), Some(capacity), cooldown, now)
}
