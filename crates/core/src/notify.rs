//! Operator-facing notification channel.
//!
//! [`NotificationBus`] is an in-process fan-out backed by a
//! `tokio::sync::broadcast` channel, shared via `Arc` between the list views,
//! the batch orchestrator, and whatever renders toasts.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::Timestamp;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Warning,
    Error,
}

/// A message for the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
    pub timestamp: Timestamp,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Severity::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }
}

/// Sink for operator notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Broadcast-backed [`Notifier`].
pub struct NotificationBus {
    sender: broadcast::Sender<Notification>,
}

impl NotificationBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer wraps.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Notifier for NotificationBus {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Success => tracing::info!(text = %notification.message, "Notify"),
            Severity::Warning => tracing::warn!(text = %notification.message, "Notify"),
            Severity::Error => tracing::error!(text = %notification.message, "Notify"),
        }
        // A send error only means nobody is listening.
        let _ = self.sender.send(notification);
    }
}
