//! In-process collaborators for loop and orchestrator tests.

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;

use ebbflow_core::{
    AlertSource, BackendError, BackendResult, CapacityState, CapacityTarget, MetricSource,
    RestartTarget,
};

fn unavailable() -> BackendError {
    BackendError::Connect("connection refused".to_string())
}

/// Fixed queue depth, optionally failing the next fetch.
pub struct FakeMetrics {
    depth: AtomicU64,
    fail_next: AtomicBool,
    fetches: AtomicUsize,
}

impl FakeMetrics {
    pub fn new(depth: u64) -> Self {
        Self {
            depth: AtomicU64::new(depth),
            fail_next: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn set_depth(&self, depth: u64) {
        self.depth.store(depth, Ordering::SeqCst);
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricSource for FakeMetrics {
    async fn fetch_depth(&self, _queue: &str) -> BackendResult<u64> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.depth.load(Ordering::SeqCst))
    }
}

/// Capacity held in memory. Accepted scale requests update `current`.
pub struct FakeCapacity {
    state: Mutex<CapacityState>,
    set_calls: Mutex<Vec<u32>>,
    capacity_calls: AtomicUsize,
    fail_capacity: AtomicBool,
    reject_set: AtomicBool,
}

impl FakeCapacity {
    pub fn new(state: CapacityState) -> Self {
        Self {
            state: Mutex::new(state),
            set_calls: Mutex::new(Vec::new()),
            capacity_calls: AtomicUsize::new(0),
            fail_capacity: AtomicBool::new(false),
            reject_set: AtomicBool::new(false),
        }
    }

    pub fn set_current(&self, current: u32) {
        self.state.lock().unwrap().current = current;
    }

    pub fn fail_capacity(&self, fail: bool) {
        self.fail_capacity.store(fail, Ordering::SeqCst);
    }

    pub fn reject_set(&self, reject: bool) {
        self.reject_set.store(reject, Ordering::SeqCst);
    }

    /// Accepted scale requests, in order.
    pub fn set_calls(&self) -> Vec<u32> {
        self.set_calls.lock().unwrap().clone()
    }

    pub fn capacity_calls(&self) -> usize {
        self.capacity_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CapacityTarget for FakeCapacity {
    async fn capacity(&self) -> BackendResult<CapacityState> {
        self.capacity_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_capacity.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(*self.state.lock().unwrap())
    }

    async fn set_capacity(&self, desired: u32) -> BackendResult<()> {
        if self.reject_set.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 409,
                body: "scale in progress".to_string(),
            });
        }
        self.set_calls.lock().unwrap().push(desired);
        self.state.lock().unwrap().current = desired;
        Ok(())
    }
}

/// Configurable set of firing alerts.
pub struct FakeAlerts {
    firing: Mutex<BTreeSet<String>>,
    fail_next: AtomicBool,
    fetches: AtomicUsize,
}

impl FakeAlerts {
    pub fn new() -> Self {
        Self {
            firing: Mutex::new(BTreeSet::new()),
            fail_next: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn set_firing(&self, names: &[&str]) {
        *self.firing.lock().unwrap() = names.iter().map(|n| n.to_string()).collect();
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertSource for FakeAlerts {
    async fn firing_alerts(&self) -> BackendResult<BTreeSet<String>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(BackendError::Timeout(std::time::Duration::from_secs(10)));
        }
        Ok(self.firing.lock().unwrap().clone())
    }
}

/// Counts restarts; can be told to fail.
pub struct FakeRestarter {
    restarts: AtomicUsize,
    fail: AtomicBool,
}

impl FakeRestarter {
    pub fn new() -> Self {
        Self {
            restarts: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Successful restarts.
    pub fn count(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RestartTarget for FakeRestarter {
    async fn restart(&self) -> BackendResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
