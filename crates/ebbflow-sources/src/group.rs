//! Cloud autoscaling groups.
//!
//! The provider API sits behind [`GroupBackend`]; [`GroupScaler`] binds one
//! group and region to it and exposes it as a [`CapacityTarget`].
//! [`InMemoryGroups`] is a provider-free backend for tests and embedding.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use ebbflow_core::{BackendError, BackendResult, CapacityState, CapacityTarget};

/// Provider-side operations on autoscaling groups.
#[async_trait]
pub trait GroupBackend: Send + Sync {
    /// Desired, minimum and maximum capacity of a group.
    async fn describe(&self, group: &str, region: &str) -> BackendResult<CapacityState>;

    /// Request a new desired capacity. With `honor_cooldown` the provider
    /// may refuse the change while its own cooldown is active.
    async fn set_desired(
        &self,
        group: &str,
        region: &str,
        desired: u32,
        honor_cooldown: bool,
    ) -> BackendResult<()>;
}

/// One autoscaling group as a capacity target.
pub struct GroupScaler {
    backend: Arc<dyn GroupBackend>,
    group: String,
    region: String,
    honor_cooldown: bool,
}

impl GroupScaler {
    pub fn new(
        backend: Arc<dyn GroupBackend>,
        group: &str,
        region: &str,
        honor_cooldown: bool,
    ) -> Self {
        Self {
            backend,
            group: group.to_string(),
            region: region.to_string(),
            honor_cooldown,
        }
    }
}

#[async_trait]
impl CapacityTarget for GroupScaler {
    async fn capacity(&self) -> BackendResult<CapacityState> {
        self.backend.describe(&self.group, &self.region).await
    }

    async fn set_capacity(&self, desired: u32) -> BackendResult<()> {
        self.backend
            .set_desired(&self.group, &self.region, desired, self.honor_cooldown)
            .await
    }
}

/// A `set_desired` call seen by [`InMemoryGroups`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDesiredCall {
    pub group: String,
    pub desired: u32,
    pub honor_cooldown: bool,
}

/// Groups kept in memory, keyed by name.
#[derive(Default)]
pub struct InMemoryGroups {
    groups: Mutex<HashMap<String, CapacityState>>,
    calls: Mutex<Vec<SetDesiredCall>>,
    reject_with_cooldown: Mutex<bool>,
}

impl InMemoryGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(self, group: &str, capacity: CapacityState) -> Self {
        self.put(group, capacity);
        self
    }

    pub fn put(&self, group: &str, capacity: CapacityState) {
        lock(&self.groups).insert(group.to_string(), capacity);
    }

    pub fn get(&self, group: &str) -> Option<CapacityState> {
        lock(&self.groups).get(group).copied()
    }

    /// Make `set_desired` with `honor_cooldown` fail, as a provider does
    /// while its cooldown is active.
    pub fn set_provider_cooldown(&self, active: bool) {
        *lock(&self.reject_with_cooldown) = active;
    }

    pub fn calls(&self) -> Vec<SetDesiredCall> {
        lock(&self.calls).clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl GroupBackend for InMemoryGroups {
    async fn describe(&self, group: &str, _region: &str) -> BackendResult<CapacityState> {
        self.get(group)
            .ok_or_else(|| BackendError::NotFound(format!("group {group}")))
    }

    async fn set_desired(
        &self,
        group: &str,
        _region: &str,
        desired: u32,
        honor_cooldown: bool,
    ) -> BackendResult<()> {
        lock(&self.calls).push(SetDesiredCall {
            group: group.to_string(),
            desired,
            honor_cooldown,
        });

        if honor_cooldown && *lock(&self.reject_with_cooldown) {
            return Err(BackendError::Status {
                status: 400,
                body: "scaling activity in progress or cooldown active".to_string(),
            });
        }

        let mut groups = lock(&self.groups);
        let state = groups
            .get_mut(group)
            .ok_or_else(|| BackendError::NotFound(format!("group {group}")))?;
        if desired < state.min || desired > state.max {
            return Err(BackendError::Status {
                status: 400,
                body: format!("desired {desired} outside [{}, {}]", state.min, state.max),
            });
        }
        state.current = desired;
        debug!(%group, desired, "group desired capacity updated");
        Ok(())
    }
}
