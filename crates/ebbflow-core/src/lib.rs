//! ebbflow-core — shared types, configuration, and backend traits.
//!
//! Everything the decision engine, the control loops and the HTTP adapters
//! agree on lives here: the resolved [`TargetConfig`], the per-iteration
//! snapshots ([`MetricSample`], [`CapacityState`], [`AlertState`]) and the
//! async collaborator traits in [`backend`].

pub mod backend;
pub mod config;
pub mod error;
pub mod types;

pub use backend::{AlertSource, CapacityTarget, MetricSource, RestartTarget};
pub use config::{Config, FileConfig};
pub use error::{BackendError, BackendResult, ConfigError};
pub use types::*;
