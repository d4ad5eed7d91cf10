//! ebbflow-metrics — observability for ebbflow control loops.
//!
//! Tracks per-target scaling and restart outcomes and renders them in the
//! Prometheus text format.
//!
//! # Architecture
//!
//! ```text
//! MetricsRecorder (Arc, shared by all loops)
//!   ├── record_pod_capacity()   gauge   {service, status}
//!   ├── record_restart()        counter {service, status}
//!   ├── record_group_capacity() gauge   {name}
//!   ├── record_group_scale()    counter {name}
//!   └── snapshot() → Vec<FamilySnapshot>
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for /metrics endpoint
//! ```

pub mod prometheus;
pub mod recorder;

pub use prometheus::render_prometheus;
pub use recorder::{FamilySnapshot, MetricKind, MetricsRecorder, Outcome};
