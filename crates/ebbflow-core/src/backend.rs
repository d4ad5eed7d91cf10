//! Collaborator traits consumed by the control loops.
//!
//! Capacity and restart targets are bound to a concrete reference (an app
//! and process type, or a group and region) when they are built, so the
//! loops never re-dispatch on the target kind.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::BackendResult;
use crate::types::CapacityState;

/// Yields the backlog depth of a named queue.
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn fetch_depth(&self, queue: &str) -> BackendResult<u64>;
}

/// Yields the names of currently firing alerts.
#[async_trait]
pub trait AlertSource: Send + Sync {
    async fn firing_alerts(&self) -> BackendResult<BTreeSet<String>>;
}

/// Something whose capacity can be read and set (pods, instance groups).
#[async_trait]
pub trait CapacityTarget: Send + Sync {
    /// Fresh capacity snapshot. Never cached by the caller.
    async fn capacity(&self) -> BackendResult<CapacityState>;

    /// Request a new capacity.
    async fn set_capacity(&self, desired: u32) -> BackendResult<()>;
}

/// Something that can be restarted (a PaaS process type).
#[async_trait]
pub trait RestartTarget: Send + Sync {
    async fn restart(&self) -> BackendResult<()>;
}
