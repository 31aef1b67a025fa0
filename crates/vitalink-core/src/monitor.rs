//! The adaptive monitoring loop.
//!
//! [`Monitor`] wires the transport, state machine, measurement store,
//! threshold provider, and alert dispatcher together and drives them on a
//! polling cadence that adapts to device state: a low battery stretches
//! the interval to 10x base to conserve the device, an undiscovered
//! device polls at 4x base, and a connected healthy device polls at the
//! base interval. Iteration errors are transient; the loop backs off and
//! continues rather than exiting.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vitalink_types::{AlertCategory, DeviceFlags};

use crate::dispatch::AlertDispatcher;
use crate::error::{Error, Result};
use crate::events::{EventDispatcher, EventReceiver, MonitorEvent};
use crate::history::HistoryStore;
use crate::state::DeviceStateMachine;
use crate::thresholds::evaluate_reading;
use crate::traits::{MeasurementStore, NotificationSink, ThresholdProvider, Transport};

/// Interval multiplier while `BATTERY_LOW` is set.
pub const BATTERY_LOW_MULTIPLIER: u32 = 10;

/// Interval multiplier while the device has not been found.
pub const NOT_FOUND_MULTIPLIER: u32 = 4;

/// Tuning knobs for the monitoring loop.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Base polling interval for a connected, healthy device.
    pub base_interval: Duration,
    /// Pause after a failed iteration before polling resumes.
    pub error_backoff: Duration,
    /// Upper bound on any single transport call.
    pub transport_timeout: Duration,
    /// Readings older than `staleness_factor * base_interval` mark the
    /// device as not worn.
    pub staleness_factor: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(30),
            error_backoff: Duration::from_secs(60),
            transport_timeout: Duration::from_secs(10),
            staleness_factor: 1.5,
        }
    }
}

/// Polling interval for the given device state.
///
/// `BATTERY_LOW` wins over discovery state: a connected device with a low
/// battery polls at 10x base even though it is found.
#[must_use]
pub fn poll_interval(flags: DeviceFlags, base: Duration) -> Duration {
    if flags.contains(DeviceFlags::BATTERY_LOW) {
        base * BATTERY_LOW_MULTIPLIER
    } else if !flags.contains(DeviceFlags::FOUND) {
        base * NOT_FOUND_MULTIPLIER
    } else {
        base
    }
}

struct RunningTasks {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Owns the monitoring loop and its supporting tasks.
///
/// Construct with [`Monitor::new`], then [`Monitor::start`] to begin
/// scanning and polling. `start` on a running monitor restarts it; `stop`
/// is idempotent.
pub struct Monitor {
    state: Arc<DeviceStateMachine>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn MeasurementStore>,
    thresholds: Arc<dyn ThresholdProvider>,
    dispatcher: Arc<AlertDispatcher>,
    events: EventDispatcher,
    config: Mutex<MonitorConfig>,
    address: Mutex<Option<String>>,
    running: Mutex<Option<RunningTasks>>,
}

impl Monitor {
    /// Assemble a monitor from its collaborators.
    pub fn new(
        config: MonitorConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn MeasurementStore>,
        thresholds: Arc<dyn ThresholdProvider>,
        sink: Arc<dyn NotificationSink>,
        history: Arc<HistoryStore>,
    ) -> Self {
        let events = EventDispatcher::default();
        let state = Arc::new(DeviceStateMachine::with_command_timeout(
            Arc::clone(&transport),
            events.clone(),
            config.transport_timeout,
        ));
        let dispatcher = Arc::new(AlertDispatcher::new(sink, history, events.clone()));
        Self {
            state,
            transport,
            store,
            thresholds,
            dispatcher,
            events,
            config: Mutex::new(config),
            address: Mutex::new(None),
            running: Mutex::new(None),
        }
    }

    /// The connectivity state machine.
    #[must_use]
    pub fn state(&self) -> &Arc<DeviceStateMachine> {
        &self.state
    }

    /// The alert dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<AlertDispatcher> {
        &self.dispatcher
    }

    /// The shared event stream.
    #[must_use]
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Subscribe to monitor events.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Whether the monitoring loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.running).is_some()
    }

    /// Start (or restart) monitoring.
    ///
    /// Spawns the transport event task, the alert-forwarding task, and the
    /// polling loop, then begins scanning. When `address` is given it is
    /// remembered for restarts and a direct connect is attempted alongside
    /// the scan.
    pub async fn start(&self, address: Option<&str>) -> Result<()> {
        self.stop().await;

        if let Some(address) = address {
            *lock(&self.address) = Some(address.to_string());
        }
        let config = lock(&self.config).clone();

        let cancel = CancellationToken::new();
        let tasks = vec![
            self.state.spawn_event_task(cancel.child_token()),
            tokio::spawn(forward_alerts(
                Arc::clone(&self.state),
                Arc::clone(&self.dispatcher),
                self.events.subscribe(),
                cancel.child_token(),
            )),
            tokio::spawn(run_loop(
                config.clone(),
                Arc::clone(&self.state),
                Arc::clone(&self.transport),
                Arc::clone(&self.store),
                Arc::clone(&self.thresholds),
                Arc::clone(&self.dispatcher),
                self.events.clone(),
                cancel.child_token(),
            )),
        ];
        *lock(&self.running) = Some(RunningTasks { cancel, tasks });

        if let Err(e) = self.state.scan().await {
            self.stop().await;
            return Err(e);
        }
        // Clone out of the guard before awaiting; holding it across the
        // connect would pin the lock and make this future !Send.
        let address = lock(&self.address).clone();
        if let Some(address) = address {
            // Failure is non-fatal; the scan may still discover the device.
            if let Err(e) = self.state.connect(&address).await {
                warn!(%address, "direct connect failed, relying on scan: {e}");
            }
        }

        info!(interval = ?config.base_interval, "monitoring started");
        Ok(())
    }

    /// Stop monitoring and wait for the tasks to wind down. Safe to call
    /// when already stopped.
    pub async fn stop(&self) {
        let running = lock(&self.running).take();
        if let Some(running) = running {
            running.cancel.cancel();
            for task in running.tasks {
                let _ = task.await;
            }
            info!("monitoring stopped");
        }
    }

    /// Change the base polling interval, restarting the loop if it is
    /// currently running so the new cadence takes effect immediately.
    pub async fn update_interval(&self, base_interval: Duration) -> Result<()> {
        lock(&self.config).base_interval = base_interval;
        if self.is_running() {
            self.start(None).await?;
        }
        Ok(())
    }
}

/// One polling cycle: drain readings, evaluate, persist, sample battery.
async fn iterate(
    config: &MonitorConfig,
    staleness_cutoff: Duration,
    last_reading: &mut Instant,
    state: &DeviceStateMachine,
    transport: &dyn Transport,
    store: &dyn MeasurementStore,
    thresholds: &dyn ThresholdProvider,
    dispatcher: &AlertDispatcher,
    events: &EventDispatcher,
) -> Result<()> {
    let readings = timeout(config.transport_timeout, transport.latest_readings())
        .await
        .map_err(|_| Error::timeout("latest_readings", config.transport_timeout))??;

    if readings.is_empty() {
        if last_reading.elapsed() > staleness_cutoff {
            state.mark_stale();
        }
    } else {
        *last_reading = Instant::now();
        state.mark_fresh();

        // Persistence failures never block the iteration.
        if let Err(e) = store.insert_all(&readings).await {
            warn!("failed to persist readings: {e}");
        }

        // The newest reading in the batch drives threshold evaluation.
        if let Some(latest) = readings.last() {
            events.send(MonitorEvent::Reading {
                reading: latest.clone(),
            });
            for violation in evaluate_reading(latest, thresholds) {
                dispatcher.raise_violation(&violation).await;
            }
        }
    }

    let battery = timeout(config.transport_timeout, transport.battery_level())
        .await
        .map_err(|_| Error::timeout("battery_level", config.transport_timeout))??;
    if let Some(level) = battery {
        state.on_battery(level);
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_loop(
    config: MonitorConfig,
    state: Arc<DeviceStateMachine>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn MeasurementStore>,
    thresholds: Arc<dyn ThresholdProvider>,
    dispatcher: Arc<AlertDispatcher>,
    events: EventDispatcher,
    cancel: CancellationToken,
) {
    let staleness_cutoff = config.base_interval.mul_f64(config.staleness_factor);
    let mut events_rx = events.subscribe();
    let mut last_reading = Instant::now();
    let mut last_poll = Instant::now();

    loop {
        // Re-derived every pass so a state transition (discovery, battery
        // low) re-anchors the next poll without waiting out the old sleep.
        let deadline = last_poll + poll_interval(state.flags(), config.base_interval);
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("monitoring loop cancelled");
                break;
            }
            event = events_rx.recv() => {
                match event {
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
                continue;
            }
            _ = tokio::time::sleep_until(deadline) => {}
        }

        last_poll = Instant::now();
        if let Err(e) = iterate(
            &config,
            staleness_cutoff,
            &mut last_reading,
            &state,
            transport.as_ref(),
            store.as_ref(),
            thresholds.as_ref(),
            &dispatcher,
            &events,
        )
        .await
        {
            warn!("monitoring iteration failed, backing off: {e}");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(config.error_backoff) => {}
            }
            last_poll = Instant::now();
        }
    }
}

/// Turn state-machine edge transitions into device alerts.
async fn forward_alerts(
    state: Arc<DeviceStateMachine>,
    dispatcher: Arc<AlertDispatcher>,
    mut rx: EventReceiver,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Ok(MonitorEvent::StateChanged { old, new }) => {
                    if new.falling_from(old).contains(DeviceFlags::CONNECTED) {
                        dispatcher
                            .raise_device(AlertCategory::DeviceDisconnected, None)
                            .await;
                    }
                    let rising = new.rising_from(old);
                    if rising.contains(DeviceFlags::BATTERY_LOW) {
                        let level = state.battery_level().map(f64::from);
                        dispatcher.raise_device(AlertCategory::BatteryLow, level).await;
                    }
                    if rising.contains(DeviceFlags::NOT_WORN) {
                        dispatcher.raise_device(AlertCategory::NotWorn, None).await;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("monitor event stream lagged, skipped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use vitalink_types::Reading;

    use crate::mock::{MemoryMeasurementStore, MemorySink, MockTransport};
    use crate::traits::ThresholdTable;

    const BASE: Duration = Duration::from_secs(30);

    #[test]
    fn test_poll_interval_adaptation() {
        let found = DeviceFlags::CONNECTED | DeviceFlags::FOUND;
        assert_eq!(poll_interval(found, BASE), BASE);
        assert_eq!(poll_interval(DeviceFlags::empty(), BASE), BASE * 4);
        assert_eq!(
            poll_interval(found | DeviceFlags::BATTERY_LOW, BASE),
            BASE * 10
        );
        // Battery wins even when the device was never found
        assert_eq!(poll_interval(DeviceFlags::BATTERY_LOW, BASE), BASE * 10);
    }

    struct Harness {
        monitor: Monitor,
        transport: Arc<MockTransport>,
        store: Arc<MemoryMeasurementStore>,
        sink: Arc<MemorySink>,
    }

    fn harness(transport: MockTransport) -> Harness {
        let transport = Arc::new(transport);
        let store = Arc::new(MemoryMeasurementStore::new());
        let sink = Arc::new(MemorySink::new());
        let monitor = Monitor::new(
            MonitorConfig::default(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::clone(&store) as Arc<dyn MeasurementStore>,
            Arc::new(ThresholdTable::default()),
            Arc::clone(&sink) as Arc<dyn NotificationSink>,
            Arc::new(HistoryStore::in_memory()),
        );
        Harness {
            monitor,
            transport,
            store,
            sink,
        }
    }

    fn hr_reading(bpm: f64) -> Reading {
        let mut reading = Reading::empty();
        reading.heart_rate = Some(bpm);
        reading
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_evaluates_and_persists_readings() {
        let transport = MockTransport::new();
        transport.set_auto_discover("AA:BB");
        transport.push_batch(vec![hr_reading(145.0)]);
        let h = harness(transport);

        h.monitor.start(Some("AA:BB")).await.unwrap();
        tokio::time::sleep(BASE + Duration::from_secs(1)).await;

        assert_eq!(h.store.len(), 1);
        let delivered = h.sink.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].title, "Critical: Heart Rate");

        h.monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_range_reading_raises_nothing() {
        let transport = MockTransport::new();
        transport.set_auto_discover("AA:BB");
        transport.push_batch(vec![hr_reading(72.0)]);
        let h = harness(transport);

        h.monitor.start(None).await.unwrap();
        tokio::time::sleep(BASE + Duration::from_secs(1)).await;

        assert_eq!(h.store.len(), 1);
        assert!(h.sink.delivered().is_empty());
        assert!(h.monitor.dispatcher().history().is_empty());

        h.monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_readings_raise_not_worn() {
        // No auto-discover: the device stays unfound, polling at 4x base,
        // and produces no readings at all.
        let h = harness(MockTransport::new());

        h.monitor.start(None).await.unwrap();
        tokio::time::sleep(BASE * 4 + Duration::from_secs(1)).await;

        assert!(h
            .monitor
            .state()
            .flags()
            .contains(DeviceFlags::NOT_WORN));
        let delivered = h.sink.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].title, "Device not worn");

        h.monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_battery_raises_alert_and_stretches_interval() {
        let transport = MockTransport::new();
        transport.set_auto_discover("AA:BB");
        transport.set_battery(Some(15));
        transport.push_batch(vec![hr_reading(72.0)]);
        let h = harness(transport);

        h.monitor.start(None).await.unwrap();
        tokio::time::sleep(BASE + Duration::from_secs(1)).await;

        assert!(h
            .monitor
            .state()
            .flags()
            .contains(DeviceFlags::BATTERY_LOW));
        let delivered = h.sink.delivered();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].body.contains("15%"));

        // Next poll happens at 10x base, not base.
        h.transport.push_batch(vec![hr_reading(72.0)]);
        tokio::time::sleep(BASE * 2).await;
        assert_eq!(h.store.len(), 1);
        tokio::time::sleep(BASE * 9).await;
        assert_eq!(h.store.len(), 2);

        h.monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_iteration_error_backs_off_then_recovers() {
        let transport = MockTransport::new();
        transport.set_auto_discover("AA:BB");
        transport.fail_next_readings(1);
        let h = harness(transport);

        h.monitor.start(None).await.unwrap();

        // First poll at ~30s fails; the loop backs off 60s before polling
        // again, so a batch queued now is not drained before ~90s.
        tokio::time::sleep(BASE + Duration::from_secs(1)).await;
        h.transport.push_batch(vec![hr_reading(72.0)]);
        tokio::time::sleep(Duration::from_secs(50)).await;
        assert_eq!(h.store.len(), 0);
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(h.store.len(), 1);

        h.monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_polling_and_is_idempotent() {
        let transport = MockTransport::new();
        transport.set_auto_discover("AA:BB");
        let h = harness(transport);

        h.monitor.start(None).await.unwrap();
        assert!(h.monitor.is_running());

        h.monitor.stop().await;
        h.monitor.stop().await;
        assert!(!h.monitor.is_running());

        h.transport.push_batch(vec![hr_reading(145.0)]);
        tokio::time::sleep(BASE * 12).await;
        assert_eq!(h.store.len(), 0);
        assert!(h.sink.delivered().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_interval_restarts_running_loop() {
        let transport = MockTransport::new();
        transport.set_auto_discover("AA:BB");
        let h = harness(transport);

        h.monitor.start(Some("AA:BB")).await.unwrap();
        h.monitor
            .update_interval(Duration::from_secs(5))
            .await
            .unwrap();
        assert!(h.monitor.is_running());

        h.transport.push_batch(vec![hr_reading(72.0)]);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(h.store.len(), 1);

        h.monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_event_raises_device_alert() {
        let transport = MockTransport::new();
        transport.set_auto_discover("AA:BB");
        let h = harness(transport);

        h.monitor.start(None).await.unwrap();
        // Let the discovery chain connect.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(h.monitor.state().flags().contains(DeviceFlags::CONNECTED));

        h.transport.emit(crate::traits::TransportEvent::Disconnected);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let delivered = h.sink.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].title, "Device disconnected");

        h.monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_returns_while_transport_commands_stall() {
        let transport = MockTransport::new();
        transport.set_auto_discover("AA:BB");
        transport.set_stall_commands(true);
        let h = harness(transport);

        // Discovery chains into a stop_scan that never completes; stop
        // must still wind down within the transport timeout.
        h.monitor.start(None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let stopped = timeout(Duration::from_secs(3600), h.monitor.stop()).await;
        assert!(stopped.is_ok());
        assert!(!h.monitor.is_running());
    }

    #[tokio::test]
    async fn test_lifecycle_runs_from_spawned_task() {
        let transport = Arc::new(MockTransport::new());
        transport.set_auto_discover("AA:BB");
        let monitor = Arc::new(Monitor::new(
            MonitorConfig::default(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::new(MemoryMeasurementStore::new()) as Arc<dyn MeasurementStore>,
            Arc::new(ThresholdTable::default()),
            Arc::new(MemorySink::new()) as Arc<dyn NotificationSink>,
            Arc::new(HistoryStore::in_memory()),
        ));

        // start must be spawnable, i.e. its future Send.
        let spawned = Arc::clone(&monitor);
        tokio::spawn(async move { spawned.start(Some("AA:BB")).await })
            .await
            .unwrap()
            .unwrap();
        assert!(monitor.is_running());

        monitor.stop().await;
    }
}
