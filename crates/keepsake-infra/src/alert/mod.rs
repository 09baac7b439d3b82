//! Operator alerting
//!
//! Alerts are fire-and-forget: delivery failures are logged and never
//! interrupt the daemon.

use async_trait::async_trait;
use std::sync::Arc;

use keepsake_core::DaemonConfig;

pub use webhook::WebhookNotifier;

mod webhook;

/// Sends a one-line message to whoever watches the daemon.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str);
}

/// No-op notifier used when no alert channel is configured.
pub struct NoOpNotifier;

#[async_trait]
impl Notifier for NoOpNotifier {
    async fn notify(&self, message: &str) {
        tracing::debug!(message = %message, "Alert not sent (no channel configured)");
    }
}

/// Webhook notifier when `DISCORD_WEBHOOK_URL` is set, otherwise a no-op.
pub fn create_notifier(config: &DaemonConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    match &config.alert_webhook_url {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(url.clone(), config.alert_timeout())?)),
        None => Ok(Arc::new(NoOpNotifier)),
    }
}
