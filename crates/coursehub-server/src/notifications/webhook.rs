//! Webhook notification sink.
//!
//! Each notification is serialized as JSON and POSTed to the configured URL
//! on a spawned task, so the caller never waits on the network.

use tracing::{debug, warn};

use super::{Notification, NotificationError, Notifier};

/// POSTs notifications to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub const fn new(http: reqwest::Client, url: String) -> Self {
        Self { http, url }
    }

    /// Build a notifier with its own HTTP client.
    pub fn connect(url: &str) -> Result<Self, NotificationError> {
        // reqwest is built with rustls-no-provider; Err means one is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| NotificationError::Request(e.to_string()))?;
        Ok(Self::new(http, url.trim().to_string()))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver one notification and wait for the response.
    pub async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let response = self
            .http
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| NotificationError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(kind = notification.kind.as_str(), "Webhook notification delivered");
            Ok(())
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            Err(NotificationError::Sink {
                status: status.as_u16(),
                body,
            })
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        let handle =
            tokio::runtime::Handle::try_current().map_err(|_| NotificationError::NoRuntime)?;
        let sink = self.clone();
        handle.spawn(async move {
            if let Err(e) = sink.send(&notification).await {
                warn!(
                    kind = notification.kind.as_str(),
                    error = %e,
                    "Webhook notification failed"
                );
            }
        });
        Ok(())
    }
}
