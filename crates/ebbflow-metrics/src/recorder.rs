//! Metrics recorder: the one structure shared by every control loop.
//!
//! Each series is an `AtomicU64`; the label index sits behind an async
//! `RwLock` that is only written the first time a label set is seen.
//! Callers never need their own locking.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

const NAMESPACE: &str = "ebbflow";

/// Outcome label for scale and restart metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failed => "failed",
        }
    }
}

/// Prometheus metric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

/// Point-in-time copy of one metric family, ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilySnapshot {
    pub name: String,
    pub help: &'static str,
    pub kind: MetricKind,
    pub label_names: &'static [&'static str],
    /// Label values (same order as `label_names`) and the current value.
    pub samples: Vec<(Vec<String>, u64)>,
}

/// A named metric with a fixed label schema.
struct Family {
    name: &'static str,
    help: &'static str,
    kind: MetricKind,
    label_names: &'static [&'static str],
    series: RwLock<BTreeMap<Vec<String>, Arc<AtomicU64>>>,
}

impl Family {
    fn new(
        name: &'static str,
        help: &'static str,
        kind: MetricKind,
        label_names: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            help,
            kind,
            label_names,
            series: RwLock::new(BTreeMap::new()),
        }
    }

    async fn series(&self, labels: &[&str]) -> Arc<AtomicU64> {
        debug_assert_eq!(labels.len(), self.label_names.len());
        let key: Vec<String> = labels.iter().map(|l| l.to_string()).collect();

        if let Some(s) = self.series.read().await.get(&key) {
            return Arc::clone(s);
        }

        let mut series = self.series.write().await;
        let entry = series.entry(key).or_insert_with(|| {
            debug!(metric = self.name, ?labels, "new metric series");
            Arc::new(AtomicU64::new(0))
        });
        Arc::clone(entry)
    }

    async fn set(&self, labels: &[&str], value: u64) {
        self.series(labels).await.store(value, Ordering::Relaxed);
    }

    async fn inc(&self, labels: &[&str]) {
        self.series(labels).await.fetch_add(1, Ordering::Relaxed);
    }

    async fn get(&self, labels: &[&str]) -> Option<u64> {
        let key: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        self.series
            .read()
            .await
            .get(&key)
            .map(|s| s.load(Ordering::Relaxed))
    }

    async fn snapshot(&self) -> FamilySnapshot {
        let series = self.series.read().await;
        FamilySnapshot {
            name: format!("{NAMESPACE}_{}", self.name),
            help: self.help,
            kind: self.kind,
            label_names: self.label_names,
            samples: series
                .iter()
                .map(|(labels, v)| (labels.clone(), v.load(Ordering::Relaxed)))
                .collect(),
        }
    }
}

/// Counters and gauges for all targets.
pub struct MetricsRecorder {
    pod_scale: Family,
    service_restart: Family,
    group_capacity: Family,
    group_scale: Family,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            pod_scale: Family::new(
                "pod_scale_event",
                "Pod count observed or requested per service.",
                MetricKind::Gauge,
                &["service", "status"],
            ),
            service_restart: Family::new(
                "service_restart",
                "Service restart attempts.",
                MetricKind::Counter,
                &["service", "status"],
            ),
            group_capacity: Family::new(
                "group_capacity",
                "Autoscaling group desired capacity as reported by the provider.",
                MetricKind::Gauge,
                &["name"],
            ),
            group_scale: Family::new(
                "group_scale_event",
                "Autoscaling group scale requests.",
                MetricKind::Counter,
                &["name"],
            ),
        }
    }

    /// Record the pod count for a service (observed, or requested by a
    /// scale call with the given outcome).
    pub async fn record_pod_capacity(&self, service: &str, outcome: Outcome, pods: u32) {
        self.pod_scale
            .set(&[service, outcome.as_str()], pods as u64)
            .await;
    }

    /// Count a restart attempt.
    pub async fn record_restart(&self, service: &str, outcome: Outcome) {
        self.service_restart
            .inc(&[service, outcome.as_str()])
            .await;
    }

    /// Record the desired capacity reported for a group.
    pub async fn record_group_capacity(&self, group: &str, desired: u32) {
        self.group_capacity.set(&[group], desired as u64).await;
    }

    /// Count a scale request sent for a group.
    pub async fn record_group_scale(&self, group: &str) {
        self.group_scale.inc(&[group]).await;
    }

    pub async fn pod_capacity(&self, service: &str, outcome: Outcome) -> Option<u64> {
        self.pod_scale.get(&[service, outcome.as_str()]).await
    }

    pub async fn restarts(&self, service: &str, outcome: Outcome) -> u64 {
        self.service_restart
            .get(&[service, outcome.as_str()])
            .await
            .unwrap_or(0)
    }

    pub async fn group_capacity(&self, group: &str) -> Option<u64> {
        self.group_capacity.get(&[group]).await
    }

    pub async fn group_scale_events(&self, group: &str) -> u64 {
        self.group_scale.get(&[group]).await.unwrap_or(0)
    }

    /// Copy every family for exposition.
    pub async fn snapshot(&self) -> Vec<FamilySnapshot> {
        vec![
            self.pod_scale.snapshot().await,
            self.service_restart.snapshot().await,
            self.group_capacity.snapshot().await,
            self.group_scale.snapshot().await,
        ]
    }
}
