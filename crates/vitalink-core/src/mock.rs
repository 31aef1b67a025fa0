//! Mock collaborators for testing and simulation.
//!
//! [`MockTransport`] stands in for the wearable's transport without any
//! real hardware: readings are scripted (or simulated with jitter),
//! transport events can be emitted on demand, and failures can be
//! injected per operation. [`MemoryMeasurementStore`] and [`MemorySink`]
//! do the same for the persistence and notification seams.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::broadcast;
use uuid::Uuid;

use vitalink_types::Reading;

use crate::error::{Error, Result};
use crate::traits::{
    MeasurementStore, Notification, NotificationSink, StoredReading, Transport, TransportEvent,
};

/// A scriptable in-memory transport.
///
/// # Example
///
/// ```
/// use vitalink_core::mock::MockTransport;
/// use vitalink_core::traits::Transport;
/// use vitalink_types::Reading;
///
/// # #[tokio::main]
/// # async fn main() {
/// let transport = MockTransport::new();
/// let mut reading = Reading::empty();
/// reading.heart_rate = Some(72.0);
/// transport.push_batch(vec![reading]);
///
/// let batch = transport.latest_readings().await.unwrap();
/// assert_eq!(batch.len(), 1);
/// assert!(transport.latest_readings().await.unwrap().is_empty());
/// # }
/// ```
pub struct MockTransport {
    events: broadcast::Sender<TransportEvent>,
    scanning: AtomicBool,
    connected: AtomicBool,
    simulate: AtomicBool,
    batches: Mutex<VecDeque<Vec<Reading>>>,
    battery: Mutex<Option<u8>>,
    auto_discover: Mutex<Option<String>>,
    fail_connect: AtomicBool,
    fail_next_readings: AtomicU32,
    stall_commands: AtomicBool,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a transport with no scripted readings and no battery.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            events,
            scanning: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            simulate: AtomicBool::new(false),
            batches: Mutex::new(VecDeque::new()),
            battery: Mutex::new(None),
            auto_discover: Mutex::new(None),
            fail_connect: AtomicBool::new(false),
            fail_next_readings: AtomicU32::new(0),
            stall_commands: AtomicBool::new(false),
        }
    }

    /// Create a transport that emits `DeviceFound` for `address` as soon
    /// as a scan starts, and generates plausible random readings on every
    /// poll. Used by the monitor binary's `--simulate` mode.
    pub fn simulated(address: &str) -> Self {
        let transport = Self::new();
        transport.set_auto_discover(address);
        transport.simulate.store(true, Ordering::Relaxed);
        *lock(&transport.battery) = Some(90);
        transport
    }

    /// Script a batch of readings to be returned by the next poll.
    pub fn push_batch(&self, readings: Vec<Reading>) {
        lock(&self.batches).push_back(readings);
    }

    /// Set the battery level reported by `battery_level`.
    pub fn set_battery(&self, level: Option<u8>) {
        *lock(&self.battery) = level;
    }

    /// Emit `DeviceFound { address }` whenever a scan starts.
    pub fn set_auto_discover(&self, address: &str) {
        *lock(&self.auto_discover) = Some(address.to_string());
    }

    /// Make subsequent `connect` calls fail.
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::Relaxed);
    }

    /// Fail the next `count` calls to `latest_readings`.
    pub fn fail_next_readings(&self, count: u32) {
        self.fail_next_readings.store(count, Ordering::Relaxed);
    }

    /// Make `stop_scan` and `connect` pend forever, as a transport whose
    /// device went out of range mid-command would.
    pub fn set_stall_commands(&self, stall: bool) {
        self.stall_commands.store(stall, Ordering::Relaxed);
    }

    /// Emit a transport event to all subscribers.
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    /// Whether a scan is in progress.
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Relaxed)
    }

    /// Whether the mock considers itself connected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn random_reading() -> Reading {
        let mut rng = rand::rng();
        let mut reading = Reading::empty();
        reading.heart_rate = Some(rng.random_range(55.0..110.0_f64).round());
        reading.spo2 = Some(rng.random_range(93.0..100.0_f64).round());
        reading.body_temperature = Some((rng.random_range(36.0..37.5_f64) * 10.0).round() / 10.0);
        reading.steps = Some(rng.random_range(0..200));
        reading
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn start_scan(&self) -> Result<()> {
        self.scanning.store(true, Ordering::Relaxed);
        if let Some(address) = lock(&self.auto_discover).clone() {
            self.emit(TransportEvent::DeviceFound { address });
        }
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        if self.stall_commands.load(Ordering::Relaxed) {
            std::future::pending::<()>().await;
        }
        self.scanning.store(false, Ordering::Relaxed);
        Ok(())
    }

    async fn connect(&self, address: &str) -> Result<()> {
        if self.stall_commands.load(Ordering::Relaxed) {
            std::future::pending::<()>().await;
        }
        if self.fail_connect.load(Ordering::Relaxed) {
            self.emit(TransportEvent::ConnectFailed {
                address: address.to_string(),
                reason: "injected connect failure".to_string(),
            });
            return Err(Error::transport("injected connect failure"));
        }
        self.connected.store(true, Ordering::Relaxed);
        self.emit(TransportEvent::Connected {
            address: address.to_string(),
        });
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::Relaxed);
        self.emit(TransportEvent::Disconnected);
        Ok(())
    }

    async fn latest_readings(&self) -> Result<Vec<Reading>> {
        let remaining = self.fail_next_readings.load(Ordering::Relaxed);
        if remaining > 0 {
            self.fail_next_readings.store(remaining - 1, Ordering::Relaxed);
            return Err(Error::transport("injected readings failure"));
        }
        if self.simulate.load(Ordering::Relaxed) {
            return Ok(vec![Self::random_reading()]);
        }
        Ok(lock(&self.batches).pop_front().unwrap_or_default())
    }

    async fn battery_level(&self) -> Result<Option<u8>> {
        Ok(*lock(&self.battery))
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }
}

/// In-memory [`MeasurementStore`] that assigns ids at insert time.
#[derive(Default)]
pub struct MemoryMeasurementStore {
    readings: Mutex<Vec<StoredReading>>,
    fail_inserts: AtomicBool,
}

impl MemoryMeasurementStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `insert_all` calls fail.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::Relaxed);
    }

    /// Number of stored readings.
    pub fn len(&self) -> usize {
        lock(&self.readings).len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of everything stored.
    pub fn all(&self) -> Vec<StoredReading> {
        lock(&self.readings).clone()
    }
}

#[async_trait]
impl MeasurementStore for MemoryMeasurementStore {
    async fn insert_all(&self, readings: &[Reading]) -> Result<()> {
        if self.fail_inserts.load(Ordering::Relaxed) {
            return Err(Error::store("injected insert failure"));
        }
        let mut stored = lock(&self.readings);
        for reading in readings {
            stored.push(StoredReading {
                id: Uuid::new_v4(),
                reading: reading.clone(),
                synced: false,
            });
        }
        Ok(())
    }

    async fn unsynced(&self) -> Result<Vec<StoredReading>> {
        Ok(lock(&self.readings)
            .iter()
            .filter(|r| !r.synced)
            .cloned()
            .collect())
    }

    async fn mark_synced(&self, ids: &[Uuid]) -> Result<()> {
        let mut stored = lock(&self.readings);
        for reading in stored.iter_mut() {
            if ids.contains(&reading.id) {
                reading.synced = true;
            }
        }
        Ok(())
    }
}

/// In-memory [`NotificationSink`] recording everything delivered.
#[derive(Default)]
pub struct MemorySink {
    delivered: Mutex<Vec<Notification>>,
    fail_next: AtomicU32,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` deliveries.
    pub fn fail_next(&self, count: u32) {
        self.fail_next.store(count, Ordering::Relaxed);
    }

    /// Snapshot of delivered notifications, oldest first.
    pub fn delivered(&self) -> Vec<Notification> {
        lock(&self.delivered).clone()
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let remaining = self.fail_next.load(Ordering::Relaxed);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::Relaxed);
            return Err(Error::sink("injected delivery failure"));
        }
        lock(&self.delivered).push(notification.clone());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
