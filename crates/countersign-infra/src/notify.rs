//! Webhook notification delivery.
//!
//! Notifications are posted as JSON to a configured endpoint (the ERP's
//! mail relay). When no endpoint is configured, sends are logged and
//! dropped, which keeps local development quiet.

use std::time::Duration;

use countersign_core::external::notify::{Notification, Notifier};
use countersign_types::error::NotifyError;

/// HTTP webhook implementation of `Notifier`.
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl WebhookNotifier {
    /// Build a notifier for the given endpoint. `None` disables delivery.
    pub fn new(endpoint: Option<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        Ok(Self { client, endpoint })
    }

    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: None,
        }
    }
}

impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let Some(endpoint) = &self.endpoint else {
            tracing::debug!(
                recipient = %notification.recipient,
                subject = %notification.subject,
                "notifier disabled, dropping notification"
            );
            return Ok(());
        };

        let response = self
            .client
            .post(endpoint)
            .json(notification)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Timeout
                } else {
                    NotifyError::Delivery(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(NotifyError::Delivery(format!(
                "webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
