//! Notification delivery for the daemon.

use async_trait::async_trait;

use vitalink_core::{Notification, NotificationSink, Result};
use vitalink_types::AlertSeverity;

/// Sink that surfaces alerts on the daemon's console and log output.
///
/// A deployment with a platform notification service would swap this for
/// a sink that talks to it; the monitoring core only sees the trait.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    /// Create a console sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for ConsoleSink {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        match notification.severity {
            AlertSeverity::Critical | AlertSeverity::High => {
                tracing::error!(
                    severity = %notification.severity,
                    "{}: {}",
                    notification.title,
                    notification.body
                );
            }
            AlertSeverity::Medium | AlertSeverity::Low => {
                tracing::warn!(
                    severity = %notification.severity,
                    "{}: {}",
                    notification.title,
                    notification.body
                );
            }
        }
        println!("[{}] {} - {}", notification.severity, notification.title, notification.body);
        Ok(())
    }
}
