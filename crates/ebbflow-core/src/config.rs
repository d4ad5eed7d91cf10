//! ebbflow.toml configuration parser.
//!
//! The file lists three kinds of entries (`[[queues]]`, `[[alerts]]` and
//! `[[groups]]`), each selecting its behaviour through a `method` string.
//! [`FileConfig::resolve`] turns them into the closed [`TargetKind`] enum
//! once, at load time. Entries with an unknown method are skipped with a
//! warning; every other problem is a fatal [`ConfigError`].
//!
//! ```toml
//! enabled = true
//!
//! [[queues]]
//! queue = "invoices"
//! broker_env = "AMQ_PROD"
//! threshold = 100
//! watermark = 20
//! scale_by = 4
//! scale_min = 1
//! scale_max = 20
//! method = "scale"
//! app = "billing"
//! process_type = "worker"
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::types::*;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "EBBFLOW_CONFIG";

/// Default config file path.
pub const DEFAULT_CONFIG_PATH: &str = "./ebbflow.toml";

/// Environment variable that forces the global enable flag on when set to
/// `enabled`.
pub const STATE_ENV: &str = "EBBFLOW_STATE";

const POD_POLL: Duration = Duration::from_secs(95);
const BACKLOG_RESTART_POLL: Duration = Duration::from_secs(101);
const BACKLOG_RESTART_COOLDOWN: Duration = Duration::from_secs(600);
const ALERT_POLL: Duration = Duration::from_secs(60);
const ALERT_COOLDOWN: Duration = Duration::from_secs(120);
const ALERT_SUPPRESSION: Duration = Duration::from_secs(150);
const GROUP_POLL: Duration = Duration::from_secs(95);
const GROUP_SCALE_UP_BY: u32 = 4;
const GROUP_SCALE_DOWN_BY: u32 = 2;

/// The configuration file as written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    /// Global switch. When off every loop runs in dry-run mode.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub queues: Vec<QueueEntry>,
    #[serde(default)]
    pub alerts: Vec<AlertEntry>,
    #[serde(default)]
    pub groups: Vec<GroupEntry>,
}

/// Queue-driven pod scaling or restarting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub queue: String,
    pub broker_env: String,
    pub threshold: u64,
    #[serde(default)]
    pub watermark: u64,
    #[serde(default = "one")]
    pub scale_by: u32,
    #[serde(default)]
    pub scale_min: u32,
    #[serde(default)]
    pub scale_max: u32,
    /// `scale` or `restart`.
    pub method: String,
    pub app: String,
    pub process_type: String,
    pub poll_interval: Option<String>,
    pub cooldown: Option<String>,
}

/// Alert-driven restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEntry {
    /// Alert name that triggers the restart.
    pub name: String,
    /// Alertmanager base URL.
    pub alert_host: String,
    /// Alert list path, `/api/v1/alerts` when absent.
    pub alert_path: Option<String>,
    /// `restartworker`.
    pub method: String,
    pub app: String,
    pub process_type: String,
    pub degraded_alert: Option<String>,
    pub poll_interval: Option<String>,
    pub cooldown: Option<String>,
    pub suppression_interval: Option<String>,
}

/// Queue-driven cloud autoscaling group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupEntry {
    pub name: String,
    pub region: String,
    pub queue: String,
    pub broker_env: String,
    pub threshold: u64,
    #[serde(default)]
    pub watermark: u64,
    pub scale_up_by: Option<u32>,
    pub scale_down_by: Option<u32>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub disable_cooldown: bool,
    /// `scale`.
    pub method: String,
    pub poll_interval: Option<String>,
    pub cooldown: Option<String>,
}

fn one() -> u32 {
    1
}

/// Resolved, validated configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub enabled: bool,
    pub targets: Vec<TargetConfig>,
}

impl Config {
    /// Read, parse and resolve a config file, then apply the environment
    /// override (`state` is the value of [`STATE_ENV`], if set).
    pub fn load(path: &Path, state: Option<&str>) -> Result<Self, ConfigError> {
        let mut file = FileConfig::from_file(path)?;
        file.apply_state_override(state);
        file.resolve()
    }
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// `enabled` in the environment forces the global flag on. Any other
    /// value leaves the file setting alone.
    pub fn apply_state_override(&mut self, state: Option<&str>) {
        if state.map(str::trim) == Some("enabled") {
            self.enabled = true;
        }
    }

    /// Turn the file entries into target configurations.
    pub fn resolve(&self) -> Result<Config, ConfigError> {
        let mut targets = Vec::new();

        for q in &self.queues {
            match q.method.as_str() {
                "scale" => targets.push(q.pod_scale_target()?),
                "restart" => targets.push(q.backlog_restart_target()?),
                other => {
                    warn!(queue = %q.queue, method = %other, "unknown queue method, skipping");
                }
            }
        }

        for a in &self.alerts {
            match a.method.as_str() {
                "restartworker" => targets.push(a.restart_target()?),
                other => {
                    warn!(alert = %a.name, method = %other, "unknown alert method, skipping");
                }
            }
        }

        for g in &self.groups {
            match g.method.as_str() {
                "scale" => targets.push(g.group_target()?),
                other => {
                    warn!(group = %g.name, method = %other, "unknown group method, skipping");
                }
            }
        }

        let mut seen = HashSet::new();
        for t in &targets {
            if !seen.insert(t.id()) {
                return Err(ConfigError::Duplicate(t.id()));
            }
        }

        Ok(Config {
            enabled: self.enabled,
            targets,
        })
    }
}

impl QueueEntry {
    fn service(&self) -> String {
        format!("{}-{}", self.app, self.process_type)
    }

    fn queue_ref(&self) -> QueueRef {
        QueueRef {
            name: self.queue.clone(),
            broker_env: self.broker_env.clone(),
        }
    }

    fn pod_scale_target(&self) -> Result<TargetConfig, ConfigError> {
        let name = self.service();
        let policy = ScalePolicy {
            threshold: self.threshold,
            watermark: self.watermark,
            scale_up_by: self.scale_by,
            scale_down_by: 1,
        };
        validate_policy(&name, &policy)?;
        if self.scale_max == 0 {
            return Err(invalid(&name, "scale_max must be at least 1"));
        }
        if self.scale_min > self.scale_max {
            return Err(invalid(
                &name,
                format!("scale_min {} exceeds scale_max {}", self.scale_min, self.scale_max),
            ));
        }

        Ok(TargetConfig {
            kind: TargetKind::PodScale {
                app: self.app.clone(),
                process_type: self.process_type.clone(),
                queue: self.queue_ref(),
                policy,
                bounds: Bounds {
                    min: self.scale_min,
                    max: self.scale_max,
                },
            },
            cooldown: duration_or(&name, self.cooldown.as_deref(), Duration::ZERO)?,
            poll_interval: duration_or(&name, self.poll_interval.as_deref(), POD_POLL)?,
            enabled: true,
            name,
        })
    }

    fn backlog_restart_target(&self) -> Result<TargetConfig, ConfigError> {
        let name = self.service();
        Ok(TargetConfig {
            kind: TargetKind::Restart {
                app: self.app.clone(),
                process_type: self.process_type.clone(),
                trigger: RestartTrigger::Backlog {
                    queue: self.queue_ref(),
                    threshold: self.threshold,
                },
            },
            cooldown: duration_or(&name, self.cooldown.as_deref(), BACKLOG_RESTART_COOLDOWN)?,
            poll_interval: duration_or(&name, self.poll_interval.as_deref(), BACKLOG_RESTART_POLL)?,
            enabled: true,
            name,
        })
    }
}

impl AlertEntry {
    fn restart_target(&self) -> Result<TargetConfig, ConfigError> {
        let name = self.name.clone();
        if self.alert_host.trim().is_empty() {
            return Err(invalid(&name, "alert_host is empty"));
        }
        let alert_path = self
            .alert_path
            .clone()
            .unwrap_or_else(|| DEFAULT_ALERT_PATH.to_string());
        if !alert_path.starts_with('/') {
            return Err(invalid(
                &name,
                format!("alert_path {alert_path:?} must start with '/'"),
            ));
        }

        Ok(TargetConfig {
            kind: TargetKind::Restart {
                app: self.app.clone(),
                process_type: self.process_type.clone(),
                trigger: RestartTrigger::Alert {
                    alert_host: self.alert_host.clone(),
                    alert_path,
                    alert_name: self.name.clone(),
                    degraded_alert: self
                        .degraded_alert
                        .clone()
                        .unwrap_or_else(|| DEFAULT_DEGRADED_ALERT.to_string()),
                    suppression_interval: duration_or(
                        &name,
                        self.suppression_interval.as_deref(),
                        ALERT_SUPPRESSION,
                    )?,
                },
            },
            cooldown: duration_or(&name, self.cooldown.as_deref(), ALERT_COOLDOWN)?,
            poll_interval: duration_or(&name, self.poll_interval.as_deref(), ALERT_POLL)?,
            enabled: true,
            name,
        })
    }
}

impl GroupEntry {
    fn group_target(&self) -> Result<TargetConfig, ConfigError> {
        let name = self.name.clone();
        let policy = ScalePolicy {
            threshold: self.threshold,
            watermark: self.watermark,
            scale_up_by: self.scale_up_by.unwrap_or(GROUP_SCALE_UP_BY),
            scale_down_by: self.scale_down_by.unwrap_or(GROUP_SCALE_DOWN_BY),
        };
        validate_policy(&name, &policy)?;

        Ok(TargetConfig {
            kind: TargetKind::GroupScale {
                group: self.name.clone(),
                region: self.region.clone(),
                queue: QueueRef {
                    name: self.queue.clone(),
                    broker_env: self.broker_env.clone(),
                },
                policy,
                honor_cooldown: !self.disable_cooldown,
            },
            cooldown: duration_or(&name, self.cooldown.as_deref(), Duration::ZERO)?,
            poll_interval: duration_or(&name, self.poll_interval.as_deref(), GROUP_POLL)?,
            enabled: self.enabled,
            name,
        })
    }
}

fn validate_policy(target: &str, policy: &ScalePolicy) -> Result<(), ConfigError> {
    if policy.watermark > policy.threshold {
        return Err(invalid(
            target,
            format!(
                "watermark {} exceeds threshold {}",
                policy.watermark, policy.threshold
            ),
        ));
    }
    if policy.scale_up_by == 0 || policy.scale_down_by == 0 {
        return Err(invalid(target, "scale step must be at least 1"));
    }
    Ok(())
}

fn invalid(target: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        target: target.to_string(),
        reason: reason.into(),
    }
}

fn duration_or(
    target: &str,
    value: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(s) => parse_duration(s)
            .ok_or_else(|| invalid(target, format!("invalid duration {s:?}"))),
    }
}

/// Parse a duration string like "95s", "500ms", "10m" or a plain number of
/// seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
