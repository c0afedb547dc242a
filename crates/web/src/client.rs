//! Task boundary HTTP client
//!
//! [`BoundaryClient`] implements [`TaskInvoker`], so the user commands run
//! unchanged against a remote boundary server.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use taskbridge_common::{BridgeError, BridgeResult, ErrorBody};
use taskbridge_tasks::TaskInvoker;

/// Default boundary address
pub const DEFAULT_BOUNDARY_URL: &str = "http://127.0.0.1:7878";

pub struct BoundaryClient {
    base_url: String,
    http: reqwest::Client,
}

impl BoundaryClient {
    pub fn new(base_url: impl Into<String>) -> BridgeResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BridgeError::Configuration(format!("http client: {}", e)))?;
        Ok(Self::with_client(base_url, http))
    }

    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> BridgeResult<Value> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(transport_error)?;
        response.json().await.map_err(transport_error)
    }
}

#[async_trait]
impl TaskInvoker for BoundaryClient {
    async fn invoke(&self, task: &str, payload: Value) -> BridgeResult<Value> {
        let url = format!("{}/tasks/{}", self.base_url, task);
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(transport_error);
        }

        let text = response.text().await.map_err(transport_error)?;
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => Err(BridgeError::from(body)),
            Err(_) => Err(BridgeError::Connection(format!(
                "boundary answered {}: {}",
                status, text
            ))),
        }
    }
}

fn transport_error(e: reqwest::Error) -> BridgeError {
    BridgeError::Connection(format!("task boundary unreachable: {}", e))
}
