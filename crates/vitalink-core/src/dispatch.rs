//! Alert dispatch: rate limiting, notification building, and delivery.
//!
//! The dispatcher is best-effort and fire-and-forget: it never returns an
//! error to its caller. Sink delivery failures are logged and do not roll
//! back the history append.
//!
//! Every raised alert is appended to the history store, including ones
//! whose live delivery was suppressed by the rate limiter; `last_fired`
//! is only advanced when delivery actually occurred. The per-category
//! minimum intervals live on [`AlertCategory`] and prevent alert storms
//! from a device that oscillates near a threshold.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use vitalink_types::{AlertCategory, AlertSeverity, VitalKind};

use crate::events::{EventDispatcher, MonitorEvent};
use crate::history::HistoryStore;
use crate::thresholds::{violation_severity, Violation};
use crate::traits::{Notification, NotificationSink};

/// Turns threshold violations and device-state changes into notifications
/// and history entries.
pub struct AlertDispatcher {
    sink: Arc<dyn NotificationSink>,
    history: Arc<HistoryStore>,
    events: EventDispatcher,
    enabled: AtomicBool,
    /// Last successful delivery per category. Held across delivery so the
    /// check-then-update is atomic when transport callbacks race the
    /// loop's periodic evaluation.
    last_fired: Mutex<HashMap<AlertCategory, Instant>>,
}

impl AlertDispatcher {
    /// Create a dispatcher with alerting enabled.
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        history: Arc<HistoryStore>,
        events: EventDispatcher,
    ) -> Self {
        Self {
            sink,
            history,
            events,
            enabled: AtomicBool::new(true),
            last_fired: Mutex::new(HashMap::new()),
        }
    }

    /// Globally enable or disable alerting. While disabled, `raise` is a
    /// complete no-op (no delivery, no history).
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Whether alerting is currently enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// The history store the dispatcher appends to.
    #[must_use]
    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    /// Raise an alert for a threshold violation.
    pub async fn raise_violation(&self, violation: &Violation) {
        let Some(severity) = violation_severity(violation.status) else {
            return;
        };
        let category = if severity == AlertSeverity::Critical {
            AlertCategory::CriticalValue
        } else {
            AlertCategory::WarningValue
        };
        self.raise(
            category,
            Some(violation.kind),
            Some(violation.value),
            Some(violation.threshold.min),
            Some(violation.threshold.max),
            severity,
        )
        .await;
    }

    /// Raise a device-state alert (disconnected, battery low, not worn).
    ///
    /// `value` carries the battery level for battery alerts.
    pub async fn raise_device(&self, category: AlertCategory, value: Option<f64>) {
        self.raise(category, None, value, None, None, category.default_severity())
            .await;
    }

    /// Raise an alert.
    ///
    /// Rate-limited per category; suppressed alerts still reach the
    /// history store, which recomputes their severity independently.
    pub async fn raise(
        &self,
        category: AlertCategory,
        parameter: Option<VitalKind>,
        value: Option<f64>,
        min: Option<f64>,
        max: Option<f64>,
        severity: AlertSeverity,
    ) {
        if !self.is_enabled() {
            return;
        }

        let mut delivered = false;
        {
            let mut last_fired = self.last_fired.lock().await;
            let now = Instant::now();
            let suppressed = last_fired
                .get(&category)
                .is_some_and(|last| now.duration_since(*last) < category.min_interval());

            if suppressed {
                debug!(%category, "alert suppressed by rate limit");
            } else {
                let notification = build_notification(category, parameter, value, min, max, severity);
                match self.sink.deliver(&notification).await {
                    Ok(()) => {
                        info!(%category, %severity, title = %notification.title, "alert delivered");
                        last_fired.insert(category, now);
                        delivered = true;
                    }
                    Err(e) => {
                        warn!(%category, "notification delivery failed: {e}");
                    }
                }
            }
        }

        // Recorded regardless of suppression; see the module docs.
        let event = self.history.add(category, parameter, value, min, max);
        self.events.send(MonitorEvent::AlertRaised { event, delivered });
    }
}

/// Build the human-readable title/body pair for a category.
fn build_notification(
    category: AlertCategory,
    parameter: Option<VitalKind>,
    value: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    severity: AlertSeverity,
) -> Notification {
    let (title, body) = match category {
        AlertCategory::CriticalValue | AlertCategory::WarningValue => {
            let label = parameter.map_or("Reading", |k| k.label());
            let unit = parameter.map_or("", |k| k.unit());
            let prefix = if category == AlertCategory::CriticalValue {
                "Critical"
            } else {
                "Warning"
            };
            let title = format!("{prefix}: {label}");
            let body = match (value, min, max) {
                (Some(v), Some(min), Some(max)) => {
                    format!("{label} is {v} {unit} (allowed {min}-{max} {unit})")
                }
                (Some(v), _, _) => format!("{label} is {v} {unit}"),
                _ => format!("{label} is outside the configured range"),
            };
            (title, body)
        }
        AlertCategory::DeviceDisconnected => (
            "Device disconnected".to_string(),
            "Connection to the wearable device was lost.".to_string(),
        ),
        AlertCategory::BatteryLow => {
            let body = match value {
                Some(level) => format!("Device battery level is {level}%."),
                None => "Device battery level is low.".to_string(),
            };
            ("Device battery low".to_string(), body)
        }
        AlertCategory::NotWorn => (
            "Device not worn".to_string(),
            "No readings received; the device appears to be off-wrist.".to_string(),
        ),
    };

    Notification {
        title,
        body,
        severity,
        // Critical alerts get the distinct audio treatment; anything at
        // High or above vibrates.
        vibrate: severity >= AlertSeverity::High,
        sound: severity == AlertSeverity::Critical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use vitalink_types::Threshold;

    use crate::mock::MemorySink;
    use crate::thresholds::evaluate;

    fn dispatcher() -> (AlertDispatcher, Arc<MemorySink>, Arc<HistoryStore>) {
        let sink = Arc::new(MemorySink::new());
        let history = Arc::new(HistoryStore::in_memory());
        let dispatcher = AlertDispatcher::new(
            Arc::clone(&sink) as Arc<dyn NotificationSink>,
            Arc::clone(&history),
            EventDispatcher::default(),
        );
        (dispatcher, sink, history)
    }

    fn hr_violation(value: f64) -> Violation {
        let threshold = Threshold::new(VitalKind::HeartRate, 60.0, 100.0).unwrap();
        let status = evaluate(value, &threshold);
        Violation {
            kind: VitalKind::HeartRate,
            value,
            threshold,
            status,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_raise_within_interval_suppressed_but_recorded() {
        let (dispatcher, sink, history) = dispatcher();

        dispatcher.raise_violation(&hr_violation(145.0)).await;
        dispatcher.raise_violation(&hr_violation(145.0)).await;

        assert_eq!(sink.delivered().len(), 1);
        assert_eq!(history.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_resumes_after_interval_elapsed() {
        let (dispatcher, sink, _) = dispatcher();

        dispatcher.raise_violation(&hr_violation(145.0)).await;
        tokio::time::advance(AlertCategory::CriticalValue.min_interval() + Duration::from_secs(1))
            .await;
        dispatcher.raise_violation(&hr_violation(145.0)).await;

        assert_eq!(sink.delivered().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_categories_rate_limited_independently() {
        let (dispatcher, sink, _) = dispatcher();

        dispatcher.raise_violation(&hr_violation(145.0)).await;
        dispatcher
            .raise_device(AlertCategory::DeviceDisconnected, None)
            .await;
        dispatcher.raise_device(AlertCategory::NotWorn, None).await;

        assert_eq!(sink.delivered().len(), 3);
    }

    #[tokio::test]
    async fn test_disabled_dispatcher_is_complete_noop() {
        let (dispatcher, sink, history) = dispatcher();
        dispatcher.set_enabled(false);

        dispatcher.raise_violation(&hr_violation(145.0)).await;

        assert!(sink.delivered().is_empty());
        assert!(history.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_failure_keeps_history_and_allows_retry() {
        let (dispatcher, sink, history) = dispatcher();
        sink.fail_next(1);

        dispatcher.raise_violation(&hr_violation(145.0)).await;
        assert!(sink.delivered().is_empty());
        assert_eq!(history.len(), 1);

        // last_fired was not advanced on the failed delivery, so the next
        // raise goes straight through.
        dispatcher.raise_violation(&hr_violation(145.0)).await;
        assert_eq!(sink.delivered().len(), 1);
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_notification_shape_for_critical_value() {
        let (dispatcher, sink, _) = dispatcher();

        dispatcher.raise_violation(&hr_violation(145.0)).await;

        let delivered = sink.delivered();
        let notification = &delivered[0];
        assert_eq!(notification.title, "Critical: Heart Rate");
        assert!(notification.body.contains("145 bpm"));
        assert!(notification.body.contains("60-100"));
        assert_eq!(notification.severity, AlertSeverity::Critical);
        assert!(notification.vibrate);
        assert!(notification.sound);
    }

    #[tokio::test]
    async fn test_notification_shape_for_battery_low() {
        let (dispatcher, sink, _) = dispatcher();

        dispatcher
            .raise_device(AlertCategory::BatteryLow, Some(15.0))
            .await;

        let delivered = sink.delivered();
        assert_eq!(delivered[0].title, "Device battery low");
        assert!(delivered[0].body.contains("15%"));
        assert!(!delivered[0].sound);
    }
}
