//! ebbflow-control — one polling task per target.
//!
//! Each loop cycles through fetch → decide → act → sleep on its own tokio
//! task. Loops share nothing but the [`MetricsRecorder`](ebbflow_metrics::MetricsRecorder)
//! and stop when the orchestrator's shutdown channel fires.
//!
//! ```text
//! Orchestrator::launch(config, backends)
//!   ├── ScaleLoop   (pod-scale, group-scale)   depth → capacity → decide → set_capacity
//!   └── RestartLoop (restart)                  alerts | depth  → decide → restart
//! ```

pub mod orchestrator;
pub mod restart_loop;
pub mod scale_loop;

#[cfg(test)]
mod testing;

pub use orchestrator::{Backends, ControlLoop, Orchestrator};
pub use restart_loop::{RestartLoop, RestartSignal};
pub use scale_loop::{ScaleFlavor, ScaleLoop};

use ebbflow_autoscale::{Action, Reason};

/// What one loop iteration ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iteration {
    /// A source or target could not be read; retried next cycle.
    FetchFailed,
    /// Nothing to do, or blocked by cooldown.
    Held(Reason),
    Scaled { from: u32, to: u32 },
    ScaleFailed { to: u32 },
    /// Target or global switch off; the action was only logged.
    DryRun(Action),
    Restarted,
    RestartFailed,
    /// Alert feed degraded; restarts suppressed.
    Suppressed,
}
