//! PaaS controller (Deis Workflow v2 API) client, plus the pod scaler and
//! process restarter built on top of it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use ebbflow_core::{
    BackendError, BackendResult, Bounds, CapacityState, CapacityTarget, ConfigError,
    RestartTarget,
};

use crate::http::{encode_segment, Endpoint, HttpClient};

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// Pods listed per request.
const POD_PAGE_SIZE: usize = 100;

/// One page of a paginated list.
#[derive(Debug, Deserialize)]
struct PodList {
    results: Vec<Pod>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Pod {
    #[serde(rename = "type")]
    process_type: String,
}

/// Authenticated controller client.
#[derive(Debug, Clone)]
pub struct ControllerClient {
    http: HttpClient,
    authorization: String,
}

impl ControllerClient {
    /// Log in with username and password and keep the issued token. The
    /// timeout applies to the login request and every later call.
    pub async fn login(
        url: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = HttpClient::new(Endpoint::parse(url)?).with_timeout(timeout);
        let body = http
            .post_json(
                "/v2/auth/login/",
                &[],
                &json!({ "username": username, "password": password }),
            )
            .await
            .map_err(|e| anyhow::anyhow!("controller login failed: {e}"))?;
        let login: LoginResponse = serde_json::from_slice(&body)
            .map_err(|e| anyhow::anyhow!("controller login response: {e}"))?;

        info!(address = %http.endpoint().address, %username, "logged in to controller");
        Ok(Self::with_token(http, &login.token))
    }

    /// Use an existing API token.
    pub fn with_token(http: HttpClient, token: &str) -> Self {
        Self {
            http,
            authorization: format!("token {token}"),
        }
    }

    /// Parse `url` and use an existing API token.
    pub fn from_token(url: &str, token: &str) -> Result<Self, ConfigError> {
        Ok(Self::with_token(HttpClient::new(Endpoint::parse(url)?), token))
    }

    fn auth(&self) -> [(&str, &str); 1] {
        [("authorization", self.authorization.as_str())]
    }

    /// Number of pods of `process_type` in `app`, across every page of
    /// the pod list.
    pub async fn pod_count(&self, app: &str, process_type: &str) -> BackendResult<u32> {
        let mut count = 0;
        let mut offset = 0;
        loop {
            let path = format!(
                "/v2/apps/{}/pods/?limit={POD_PAGE_SIZE}&offset={offset}",
                encode_segment(app)
            );
            let body = self.http.get(&path, &self.auth()).await?;
            let page: PodList = serde_json::from_slice(&body)
                .map_err(|e| BackendError::Decode(format!("pods of {app}: {e}")))?;

            count += page
                .results
                .iter()
                .filter(|p| p.process_type == process_type)
                .count();
            if page.next.is_none() || page.results.is_empty() {
                break;
            }
            offset += page.results.len();
        }
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Set the pod count of `process_type` in `app`.
    pub async fn scale(&self, app: &str, process_type: &str, desired: u32) -> BackendResult<()> {
        let path = format!("/v2/apps/{}/scale/", encode_segment(app));
        let mut body = serde_json::Map::new();
        body.insert(process_type.to_string(), json!(desired));
        self.http
            .post_json(&path, &self.auth(), &serde_json::Value::Object(body))
            .await?;
        debug!(%app, %process_type, desired, "scale accepted");
        Ok(())
    }

    /// Restart every pod of `process_type` in `app`.
    pub async fn restart(&self, app: &str, process_type: &str) -> BackendResult<()> {
        let path = format!(
            "/v2/apps/{}/pods/{}/restart/",
            encode_segment(app),
            encode_segment(process_type)
        );
        self.http
            .post_json(&path, &self.auth(), &json!({}))
            .await?;
        debug!(%app, %process_type, "restart accepted");
        Ok(())
    }
}

/// Pod count of one process type, bounded by locally configured limits.
pub struct PodScaler {
    client: Arc<ControllerClient>,
    app: String,
    process_type: String,
    bounds: Bounds,
}

impl PodScaler {
    pub fn new(client: Arc<ControllerClient>, app: &str, process_type: &str, bounds: Bounds) -> Self {
        Self {
            client,
            app: app.to_string(),
            process_type: process_type.to_string(),
            bounds,
        }
    }
}

#[async_trait]
impl CapacityTarget for PodScaler {
    async fn capacity(&self) -> BackendResult<CapacityState> {
        let current = self.client.pod_count(&self.app, &self.process_type).await?;
        Ok(CapacityState::new(current, self.bounds.min, self.bounds.max))
    }

    async fn set_capacity(&self, desired: u32) -> BackendResult<()> {
        self.client
            .scale(&self.app, &self.process_type, desired)
            .await
    }
}

/// Restarts one process type.
pub struct ProcessRestarter {
    client: Arc<ControllerClient>,
    app: String,
    process_type: String,
}

impl ProcessRestarter {
    pub fn new(client: Arc<ControllerClient>, app: &str, process_type: &str) -> Self {
        Self {
            client,
            app: app.to_string(),
            process_type: process_type.to_string(),
        }
    }
}

#[async_trait]
impl RestartTarget for ProcessRestarter {
    async fn restart(&self) -> BackendResult<()> {
        self.client.restart(&self.app, &self.process_type).await
    }
}
