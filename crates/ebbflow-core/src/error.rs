//! Error types shared across ebbflow crates.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Failures talking to a broker, alert feed, controller or cloud API.
///
/// Every variant is transient from the control loop's point of view: the
/// iteration ends and the loop retries on the next cycle.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Errors detected before any control loop is started. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid target {target}: {reason}")]
    Invalid { target: String, reason: String },

    #[error("duplicate target {0}")]
    Duplicate(String),

    #[error("missing environment variable {0}")]
    MissingEnv(String),

    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}
