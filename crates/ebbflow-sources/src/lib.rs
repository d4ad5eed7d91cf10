//! ebbflow-sources — backend adapters for the control loops.
//!
//! Thin HTTP wrappers implementing the traits from `ebbflow_core::backend`:
//!
//! ```text
//! BrokerClient        → MetricSource    GET  /api/queues/{vhost}/{queue}
//! AlertmanagerClient  → AlertSource     GET  /api/v1/alerts
//! ControllerClient
//!   ├── PodScaler     → CapacityTarget  GET  /v2/apps/{app}/pods/
//!   │                                   POST /v2/apps/{app}/scale/
//!   └── ProcessRestarter → RestartTarget POST /v2/apps/{app}/pods/{type}/restart/
//! GroupScaler         → CapacityTarget  via GroupBackend
//! ```
//!
//! All adapters speak plain HTTP/1 and check the response status before
//! decoding a body.

pub mod alertmanager;
pub mod broker;
pub mod controller;
pub mod group;
pub mod http;

pub use alertmanager::AlertmanagerClient;
pub use broker::BrokerClient;
pub use controller::{ControllerClient, PodScaler, ProcessRestarter};
pub use group::{GroupBackend, GroupScaler, InMemoryGroups};
pub use http::{Endpoint, HttpClient};
