//! Platform-agnostic types for the vitalink wearable health monitor.
//!
//! This crate defines the data model shared by the monitoring core and any
//! frontends: vital-sign readings, configured thresholds, device state
//! flags, alert events, and battery status.
//!
//! # Features
//!
//! - `serde` (default): serde derives on all types, plus serde support on
//!   `time` and `uuid`.
//!
//! # Quick Start
//!
//! ```
//! use vitalink_types::{Reading, Threshold, VitalKind};
//!
//! let threshold = Threshold::new(VitalKind::HeartRate, 60.0, 100.0).unwrap();
//! let mut reading = Reading::empty();
//! reading.heart_rate = Some(72.0);
//!
//! let value = reading.value_of(VitalKind::HeartRate).unwrap();
//! assert!(value >= threshold.min && value <= threshold.max);
//! ```

pub mod error;
pub mod types;

pub use error::TypeError;
pub use types::{
    AlertCategory, AlertEvent, AlertSeverity, BatteryStatus, DeviceFlags, Reading, Threshold,
    ThresholdStatus, VitalKind,
};
