//! Production collaborators for the orchestrator.
//!
//! Broker URLs come from the environment variable each queue names in
//! `broker_env`. Pod scaling and restarts go through one logged-in
//! controller client. No cloud group provider is wired in, so group targets
//! are skipped.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use ebbflow_control::Backends;
use ebbflow_core::{
    AlertSource, Bounds, CapacityTarget, Config, ConfigError, MetricSource, QueueRef,
    RestartTarget, TargetKind,
};
use ebbflow_sources::{
    AlertmanagerClient, BrokerClient, ControllerClient, Endpoint, HttpClient, PodScaler,
    ProcessRestarter,
};

pub const CONTROLLER_URL_ENV: &str = "CONTROLLER_URL";
pub const CONTROLLER_USERNAME_ENV: &str = "CONTROLLER_USERNAME";
pub const CONTROLLER_PASSWORD_ENV: &str = "CONTROLLER_PASSWORD";

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct DaemonBackends {
    timeout: Duration,
    controller: Option<Arc<ControllerClient>>,
    env: EnvLookup,
}

impl DaemonBackends {
    /// Backends reading broker URLs from the process environment.
    pub fn new(timeout: Duration, controller: Option<Arc<ControllerClient>>) -> Self {
        Self::with_env(timeout, controller, |key| std::env::var(key).ok())
    }

    pub fn with_env(
        timeout: Duration,
        controller: Option<Arc<ControllerClient>>,
        env: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            timeout,
            controller,
            env: Arc::new(env),
        }
    }

    fn http(&self, url: &str) -> Result<HttpClient, ConfigError> {
        Ok(HttpClient::new(Endpoint::parse(url)?).with_timeout(self.timeout))
    }

    fn controller(&self) -> anyhow::Result<Arc<ControllerClient>> {
        self.controller
            .clone()
            .context("controller credentials are not configured")
    }
}

impl Backends for DaemonBackends {
    fn metric_source(&self, queue: &QueueRef) -> anyhow::Result<Arc<dyn MetricSource>> {
        let url = (self.env)(&queue.broker_env)
            .ok_or_else(|| ConfigError::MissingEnv(queue.broker_env.clone()))?;
        Ok(Arc::new(BrokerClient::new(self.http(&url)?)))
    }

    fn alert_source(
        &self,
        alert_host: &str,
        alert_path: &str,
    ) -> anyhow::Result<Arc<dyn AlertSource>> {
        Ok(Arc::new(
            AlertmanagerClient::new(self.http(alert_host)?).with_path(alert_path),
        ))
    }

    fn pod_scaler(
        &self,
        app: &str,
        process_type: &str,
        bounds: Bounds,
    ) -> anyhow::Result<Arc<dyn CapacityTarget>> {
        Ok(Arc::new(PodScaler::new(
            self.controller()?,
            app,
            process_type,
            bounds,
        )))
    }

    fn restarter(&self, app: &str, process_type: &str) -> anyhow::Result<Arc<dyn RestartTarget>> {
        Ok(Arc::new(ProcessRestarter::new(
            self.controller()?,
            app,
            process_type,
        )))
    }

    fn group_scaler(
        &self,
        _group: &str,
        _region: &str,
        _honor_cooldown: bool,
    ) -> anyhow::Result<Option<Arc<dyn CapacityTarget>>> {
        Ok(None)
    }
}

/// Whether any target acts through the PaaS controller.
pub fn needs_controller(config: &Config) -> bool {
    config.targets.iter().any(|t| {
        matches!(
            t.kind,
            TargetKind::PodScale { .. } | TargetKind::Restart { .. }
        )
    })
}

/// Controller URL, username and password from the environment.
pub fn controller_credentials(
    env: impl Fn(&str) -> Option<String>,
) -> Result<(String, String, String), ConfigError> {
    let get = |key: &str| env(key).ok_or_else(|| ConfigError::MissingEnv(key.to_string()));
    Ok((
        get(CONTROLLER_URL_ENV)?,
        get(CONTROLLER_USERNAME_ENV)?,
        get(CONTROLLER_PASSWORD_ENV)?,
    ))
}
