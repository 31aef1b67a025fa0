//! Monitor event system for state-change and alert notifications.
//!
//! Components publish events through a broadcast channel so that the
//! monitoring loop, the alert dispatcher, and any UI observer can react
//! to the same stream without coupling to each other.

use tokio::sync::broadcast;

use vitalink_types::{AlertEvent, BatteryStatus, DeviceFlags, Reading};

/// Events emitted by the monitoring core.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum MonitorEvent {
    /// The device state bitmask changed.
    StateChanged {
        /// Flags before the transition.
        old: DeviceFlags,
        /// Flags after the transition.
        new: DeviceFlags,
    },
    /// A fresh reading arrived from the transport.
    Reading {
        /// The reading as received.
        reading: Reading,
    },
    /// An alert was raised.
    AlertRaised {
        /// The recorded alert event.
        event: AlertEvent,
        /// Whether the live notification was actually delivered
        /// (false when rate limiting suppressed it).
        delivered: bool,
    },
    /// A new battery sample was processed.
    BatteryChanged {
        /// Raw battery percentage.
        level: u8,
        /// Derived qualitative status.
        status: BatteryStatus,
    },
}

/// Sender for monitor events.
pub type EventSender = broadcast::Sender<MonitorEvent>;

/// Receiver for monitor events.
pub type EventReceiver = broadcast::Receiver<MonitorEvent>;

/// Event dispatcher for broadcasting events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: MonitorEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_reach_subscriber() {
        let dispatcher = EventDispatcher::default();
        let mut rx = dispatcher.subscribe();

        dispatcher.send(MonitorEvent::StateChanged {
            old: DeviceFlags::empty(),
            new: DeviceFlags::CONNECTED,
        });

        match rx.recv().await.unwrap() {
            MonitorEvent::StateChanged { old, new } => {
                assert!(old.is_empty());
                assert!(new.contains(DeviceFlags::CONNECTED));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_send_without_receivers_is_noop() {
        let dispatcher = EventDispatcher::new(4);
        assert_eq!(dispatcher.receiver_count(), 0);
        dispatcher.send(MonitorEvent::BatteryChanged {
            level: 80,
            status: BatteryStatus::Good,
        });
    }
}
