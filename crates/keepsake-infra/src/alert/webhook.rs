use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::Notifier;

/// Discord-compatible webhook body.
#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    content: &'a str,
}

/// Posts alerts to a chat webhook.
#[derive(Clone)]
pub struct WebhookNotifier {
    http_client: Client,
    url: String,
    hostname: String,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for alerts")?;

        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self {
            http_client,
            url,
            hostname,
        })
    }

    fn format_message(&self, message: &str) -> String {
        format!("[{}] {}", self.hostname, message)
    }

    async fn send(&self, content: &str) -> Result<()> {
        let response = self
            .http_client
            .post(&self.url)
            .json(&WebhookMessage { content })
            .send()
            .await
            .context("Failed to send alert webhook")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Alert webhook returned status {}", status);
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[tracing::instrument(skip(self, message))]
    async fn notify(&self, message: &str) {
        let content = self.format_message(message);
        match self.send(&content).await {
            Ok(()) => tracing::info!("Alert delivered"),
            Err(e) => tracing::warn!(error = %e, "Alert delivery failed"),
        }
    }
}
