//! HTTP Delivery Client
//!
//! Posts a single message to the third-party SMS provider:
//! - `POST {base_url}/send-message` with `{"content": ..., "to": ...}`
//! - `202 Accepted` carries `{"message": ..., "messageId": ...}`
//!
//! Any other status is an unrecognized response, not an error: the message
//! simply stays `unsent` and is picked up again on a later cycle.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DispatchError, Result};

/// Acceptance payload returned by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryConfirmation {
    pub message: String,
    pub message_id: String,
}

#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Ask the provider to deliver `content` to `recipient`.
    ///
    /// `Ok(None)` means the provider answered without accepting the message.
    async fn send(&self, content: &str, recipient: &str) -> Result<Option<DeliveryConfirmation>>;
}

#[derive(Debug, Clone)]
pub struct HttpDeliveryClientConfig {
    pub base_url: String,
    /// Optional Bearer token for authentication
    pub api_token: Option<String>,
    pub connect_timeout: Duration,
    /// `None` leaves the request unbounded
    pub request_timeout: Option<Duration>,
}

impl Default for HttpDeliveryClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_token: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    content: &'a str,
    to: &'a str,
}

pub struct HttpDeliveryClient {
    config: HttpDeliveryClientConfig,
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDeliveryClient {
    pub fn new(config: HttpDeliveryClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        let endpoint = format!("{}/send-message", config.base_url.trim_end_matches('/'));

        Ok(Self {
            config,
            client,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn send(&self, content: &str, recipient: &str) -> Result<Option<DeliveryConfirmation>> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&SendRequest { content, to: recipient });

        if let Some(ref token) = self.config.api_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?;
        let status = response.status();

        if status != StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Delivery provider did not accept message");
            return Ok(None);
        }

        let body = response.text().await?;
        let confirmation: DeliveryConfirmation = serde_json::from_str(&body)
            .map_err(|e| DispatchError::Delivery(format!("Invalid acceptance body: {}", e)))?;

        debug!(provider_message_id = %confirmation.message_id, "Delivery accepted");
        Ok(Some(confirmation))
    }
}
