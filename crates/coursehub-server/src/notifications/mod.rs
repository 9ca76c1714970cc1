//! Best-effort notifications (welcome, enrollment, completion).
//!
//! The enrollment and session services hand a [`Notification`] to a
//! [`Notifier`] after their state change is persisted. Delivery is
//! fire-and-forget: a notifier error is logged by the caller and never undoes
//! the state change.
//!
//! - [`LogNotifier`] only emits a tracing event (the default sink)
//! - `WebhookNotifier` POSTs JSON to a configured URL (feature
//!   `webhook-notifications`)

mod logging;
#[cfg(feature = "webhook-notifications")]
mod webhook;

use std::collections::BTreeMap;

use serde::Serialize;

pub use logging::LogNotifier;
#[cfg(feature = "webhook-notifications")]
pub use webhook::WebhookNotifier;

/// What happened to the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Welcome,
    Enrolled,
    Completed,
}

impl NotificationKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::Enrolled => "enrolled",
            Self::Completed => "completed",
        }
    }
}

/// A single outbound notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    /// Recipient address (the user's e-mail).
    pub recipient: String,
    pub payload: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(kind: NotificationKind, recipient: impl Into<String>) -> Self {
        Self {
            kind,
            recipient: recipient.into(),
            payload: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }
}

/// Errors a notifier can report at hand-off time.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// There is no async runtime to run the delivery on.
    #[error("no runtime available for delivery")]
    NoRuntime,

    /// HTTP request to the sink failed.
    #[error("notification request error: {0}")]
    Request(String),

    /// The sink returned a non-success status code.
    #[error("notification sink error (status {status}): {body}")]
    Sink {
        /// HTTP status code returned by the sink.
        status: u16,
        /// Response body.
        body: String,
    },
}

/// Outbound notification sink.
///
/// `notify` must not block on delivery; implementations that do I/O spawn it.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}
