//! Core monitoring engine for vitalink wearable health devices.
//!
//! This crate contains the device-facing logic shared by every vitalink
//! frontend: the connectivity state machine, battery tracking, threshold
//! evaluation, rate-limited alert dispatch, the persistent alert history,
//! and the adaptive monitoring loop that drives them.
//!
//! External concerns are injected behind traits: the device protocol as
//! [`Transport`], durable reading storage as [`MeasurementStore`],
//! configured ranges as [`ThresholdProvider`], and alert delivery as
//! [`NotificationSink`]. The [`mock`] module provides in-memory
//! implementations of all four for tests and simulation.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vitalink_core::mock::{MemoryMeasurementStore, MemorySink, MockTransport};
//! use vitalink_core::{HistoryStore, Monitor, MonitorConfig, ThresholdTable};
//!
//! # #[tokio::main]
//! # async fn main() -> vitalink_core::Result<()> {
//! let monitor = Monitor::new(
//!     MonitorConfig::default(),
//!     Arc::new(MockTransport::simulated("AA:BB:CC:DD:EE:FF")),
//!     Arc::new(MemoryMeasurementStore::new()),
//!     Arc::new(ThresholdTable::default()),
//!     Arc::new(MemorySink::new()),
//!     Arc::new(HistoryStore::in_memory()),
//! );
//! monitor.start(Some("AA:BB:CC:DD:EE:FF")).await?;
//! # Ok(())
//! # }
//! ```

pub mod battery;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod history;
pub mod mock;
pub mod monitor;
pub mod state;
pub mod thresholds;
pub mod traits;

pub use battery::{BatteryTracker, BatteryUpdate};
pub use dispatch::AlertDispatcher;
pub use error::{Error, Result};
pub use events::{EventDispatcher, EventReceiver, EventSender, MonitorEvent};
pub use history::HistoryStore;
pub use monitor::{Monitor, MonitorConfig};
pub use state::DeviceStateMachine;
pub use thresholds::{evaluate, evaluate_reading, violation_severity, Violation};
pub use traits::{
    MeasurementStore, Notification, NotificationSink, StoredReading, ThresholdProvider,
    ThresholdTable, Transport, TransportEvent,
};
