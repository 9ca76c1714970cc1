//! Notification sink that only logs.

use tracing::info;

use super::{Notification, NotificationError, Notifier};

/// Emits each notification as a tracing event and reports success.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        info!(
            kind = notification.kind.as_str(),
            recipient = %notification.recipient,
            payload = ?notification.payload,
            "Notification"
        );
        Ok(())
    }
}
