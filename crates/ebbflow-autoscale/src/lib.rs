//! ebbflow-autoscale — backlog-driven scaling decisions.
//!
//! Compares a queue depth against a target's threshold and watermark and
//! emits a step-scaling or restart decision. Cooldown windows keep two
//! mutating actions on the same target apart.
//!
//! # Scaling Algorithm
//!
//! ```text
//! if current outside [min, max]:
//!     NoOp                          // anomaly, logged only
//!
//! if depth >= threshold:
//!     ScaleTo(min(current + scale_up_by, max))   // NoOp when already at max
//!
//! else if depth < watermark:
//!     ScaleTo(max(current - scale_down_by, min)) // NoOp when already at min
//!
//! else:
//!     NoOp                          // dead zone [watermark, threshold)
//! ```
//!
//! Restart targets fire on a named alert (suppressed while the alert feed
//! reports itself degraded) or on a backlog threshold.

pub mod cooldown;
pub mod engine;

pub use cooldown::CooldownTracker;
pub use engine::{
    decide, decide_alert_restart, decide_backlog_restart, decide_scale, gate, Action, Decision,
    Reason,
};
