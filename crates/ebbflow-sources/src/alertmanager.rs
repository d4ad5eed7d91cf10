//! Alertmanager as an [`AlertSource`].
//!
//! Understands the v1 envelope (`{"status": "success", "data": [...]}`) and
//! the bare array returned by v2. Alert names come from
//! `labels.alertname`.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use ebbflow_core::{AlertSource, BackendError, BackendResult, ConfigError, DEFAULT_ALERT_PATH};

use crate::http::{Endpoint, HttpClient};

#[derive(Debug, Clone)]
pub struct AlertmanagerClient {
    http: HttpClient,
    path: String,
}

impl AlertmanagerClient {
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(HttpClient::new(Endpoint::parse(url)?)))
    }

    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            path: DEFAULT_ALERT_PATH.to_string(),
        }
    }

    /// Query a different path, e.g. `/api/v2/alerts`.
    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }
}

#[async_trait]
impl AlertSource for AlertmanagerClient {
    async fn firing_alerts(&self) -> BackendResult<BTreeSet<String>> {
        let body = self.http.get(&self.path, &[]).await?;
        let names = parse_alert_names(&body)?;
        debug!(count = names.len(), "fetched firing alerts");
        Ok(names)
    }
}

fn parse_alert_names(body: &[u8]) -> BackendResult<BTreeSet<String>> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| BackendError::Decode(e.to_string()))?;

    let alerts = match &value {
        Value::Array(items) => items,
        Value::Object(obj) => {
            if let Some(Value::String(status)) = obj.get("status")
                && status != "success"
            {
                return Err(BackendError::Decode(format!("alert feed status {status}")));
            }
            match obj.get("data") {
                Some(Value::Array(items)) => items,
                _ => return Err(BackendError::Decode("missing data array".to_string())),
            }
        }
        _ => return Err(BackendError::Decode("unexpected alert payload".to_string())),
    };

    Ok(alerts
        .iter()
        .filter_map(|a| a.pointer("/labels/alertname"))
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect())
}
