//! Trait abstractions for the monitoring core's external collaborators.
//!
//! The core consumes a device [`Transport`], a [`ThresholdProvider`], a
//! durable [`MeasurementStore`], and a [`NotificationSink`]. All four are
//! injected as constructor arguments, which keeps the core testable with
//! the mock implementations in [`crate::mock`].

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use vitalink_types::{AlertSeverity, Reading, Threshold, VitalKind};

use crate::error::Result;

/// Events emitted by the device transport.
///
/// Transport commands are fire-and-forget; their outcomes arrive as these
/// events on the transport's broadcast channel.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum TransportEvent {
    /// A matching device was discovered during scanning.
    DeviceFound {
        /// Platform identifier (MAC address or peripheral UUID).
        address: String,
    },
    /// Connection to the device was established.
    Connected {
        /// The connected device's identifier.
        address: String,
    },
    /// A connection attempt failed. Device state is left unchanged so the
    /// caller may retry.
    ConnectFailed {
        /// The identifier the attempt targeted.
        address: String,
        /// Transport-specific failure description.
        reason: String,
    },
    /// The connection was lost or closed.
    Disconnected,
}

/// Abstract wearable device transport.
///
/// The core never implements the device protocol itself; it only issues
/// commands and consumes [`TransportEvent`]s and readings. All calls the
/// monitoring loop makes are additionally guarded by the loop's own
/// timeout, since the transport is untrusted external I/O.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin scanning for the wearable.
    async fn start_scan(&self) -> Result<()>;

    /// Stop an in-progress scan.
    async fn stop_scan(&self) -> Result<()>;

    /// Request a connection to the device at `address`.
    async fn connect(&self, address: &str) -> Result<()>;

    /// Close the current connection.
    async fn disconnect(&self) -> Result<()>;

    /// Drain the readings accumulated since the last poll.
    ///
    /// Returns an empty vec when the device reported nothing this cycle.
    async fn latest_readings(&self) -> Result<Vec<Reading>>;

    /// Read the battery percentage, or `None` when unknown.
    async fn battery_level(&self) -> Result<Option<u8>>;

    /// Subscribe to transport events.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;
}

/// A reading as held by the persistent measurement store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredReading {
    /// Store-assigned id.
    pub id: Uuid,
    /// The reading itself.
    pub reading: Reading,
    /// Whether the reading has been synced upstream.
    pub synced: bool,
}

/// Durable store for vital-sign readings.
///
/// Owned externally; the core only produces batches into it and never
/// blocks an iteration on its failures.
#[async_trait]
pub trait MeasurementStore: Send + Sync {
    /// Persist a batch of readings.
    async fn insert_all(&self, readings: &[Reading]) -> Result<()>;

    /// Readings not yet synced upstream.
    async fn unsynced(&self) -> Result<Vec<StoredReading>>;

    /// Mark the given readings as synced.
    async fn mark_synced(&self, ids: &[Uuid]) -> Result<()>;
}

/// Lookup of externally configured thresholds.
pub trait ThresholdProvider: Send + Sync {
    /// Get the configured threshold for a parameter, if any.
    ///
    /// A missing threshold means the parameter cannot be evaluated and is
    /// skipped, never an error.
    fn get(&self, kind: VitalKind) -> Option<Threshold>;
}

/// In-memory [`ThresholdProvider`] with clinical defaults.
///
/// # Examples
///
/// ```
/// use vitalink_core::ThresholdTable;
/// use vitalink_core::traits::ThresholdProvider;
/// use vitalink_types::VitalKind;
///
/// let table = ThresholdTable::default();
/// let hr = table.get(VitalKind::HeartRate).unwrap();
/// assert_eq!((hr.min, hr.max), (60.0, 100.0));
/// ```
#[derive(Debug, Clone)]
pub struct ThresholdTable {
    thresholds: HashMap<VitalKind, Threshold>,
}

impl ThresholdTable {
    /// Create an empty table.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            thresholds: HashMap::new(),
        }
    }

    /// Insert or replace a threshold.
    pub fn insert(&mut self, threshold: Threshold) {
        self.thresholds.insert(threshold.kind, threshold);
    }

    /// Remove the threshold for a parameter.
    pub fn remove(&mut self, kind: VitalKind) -> Option<Threshold> {
        self.thresholds.remove(&kind)
    }

    /// Number of configured thresholds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    /// Whether no thresholds are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }
}

impl Default for ThresholdTable {
    /// Default acceptable ranges for a resting adult.
    fn default() -> Self {
        let mut table = Self::empty();
        let defaults = [
            (VitalKind::HeartRate, 60.0, 100.0),
            (VitalKind::SystolicPressure, 90.0, 120.0),
            (VitalKind::DiastolicPressure, 60.0, 80.0),
            (VitalKind::SpO2, 95.0, 100.0),
            (VitalKind::BodyTemperature, 36.1, 37.2),
            (VitalKind::BloodGlucose, 70.0, 140.0),
        ];
        for (kind, min, max) in defaults {
            // Bounds are static and ordered; construction cannot fail.
            if let Ok(threshold) = Threshold::new(kind, min, max) {
                table.insert(threshold);
            }
        }
        table
    }
}

impl ThresholdProvider for ThresholdTable {
    fn get(&self, kind: VitalKind) -> Option<Threshold> {
        self.thresholds.get(&kind).cloned()
    }
}

/// A constructed alert ready for on-device delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Short title, e.g. `"Critical: Heart Rate"`.
    pub title: String,
    /// Full body text.
    pub body: String,
    /// Severity used for channel/priority mapping by the sink.
    pub severity: AlertSeverity,
    /// Whether the device should vibrate.
    pub vibrate: bool,
    /// Whether the device should play a sound.
    pub sound: bool,
}

/// Sink for on-device alert delivery.
///
/// Delivery is best-effort: failures are logged by the dispatcher and
/// never propagate to the monitoring loop.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver a notification to the user.
    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_covers_core_vitals() {
        let table = ThresholdTable::default();
        assert!(table.get(VitalKind::HeartRate).is_some());
        assert!(table.get(VitalKind::SpO2).is_some());
        assert!(table.get(VitalKind::BloodGlucose).is_some());
        // No sensible universal default for these
        assert!(table.get(VitalKind::Steps).is_none());
        assert!(table.get(VitalKind::BodyFat).is_none());
    }

    #[test]
    fn test_table_insert_remove() {
        let mut table = ThresholdTable::empty();
        assert!(table.is_empty());

        table.insert(Threshold::new(VitalKind::Steps, 0.0, 50_000.0).unwrap());
        assert_eq!(table.len(), 1);
        assert!(table.get(VitalKind::Steps).is_some());

        table.remove(VitalKind::Steps);
        assert!(table.get(VitalKind::Steps).is_none());
    }
}
