//! Connectivity state machine for the wearable device.
//!
//! Owns the [`DeviceFlags`] bitmask and is the only component that mutates
//! it; everything else reacts to the published transitions. Reads are
//! lock-free snapshots of an atomic; writes are serialized behind an
//! internal mutex (single-writer), triggered by monitoring-loop calls or
//! transport events, never concurrently with themselves.
//!
//! No transition is synchronous with device I/O: commands issued to the
//! transport are fire-and-forget and bounded by a command timeout, and
//! their outcomes arrive as later [`TransportEvent`]s consumed by the
//! task spawned from [`DeviceStateMachine::spawn_event_task`].

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vitalink_types::{BatteryStatus, DeviceFlags};

use crate::battery::{BatteryTracker, BatteryUpdate};
use crate::error::{Error, Result};
use crate::events::{EventDispatcher, MonitorEvent};
use crate::traits::{Transport, TransportEvent};

/// Battery percentage below which `BATTERY_LOW` is raised.
pub const BATTERY_LOW_CUTOFF: u8 = 20;

/// Default upper bound on any single transport command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// State machine over the device's connectivity flags.
pub struct DeviceStateMachine {
    transport: Arc<dyn Transport>,
    flags: AtomicU8,
    /// Serializes transitions; also owns the battery tracker, whose
    /// updates are themselves transitions.
    write: Mutex<BatteryTracker>,
    events: EventDispatcher,
    command_timeout: Duration,
}

impl DeviceStateMachine {
    /// Create a state machine with all flags cleared and the default
    /// command timeout.
    pub fn new(transport: Arc<dyn Transport>, events: EventDispatcher) -> Self {
        Self::with_command_timeout(transport, events, DEFAULT_COMMAND_TIMEOUT)
    }

    /// Create a state machine with a custom transport command timeout.
    pub fn with_command_timeout(
        transport: Arc<dyn Transport>,
        events: EventDispatcher,
        command_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            flags: AtomicU8::new(0),
            write: Mutex::new(BatteryTracker::new()),
            events,
            command_timeout,
        }
    }

    /// Run a transport command with the configured timeout.
    ///
    /// The transport is untrusted external I/O; a stalled command must
    /// never wedge the caller or the event task.
    async fn command<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(operation, self.command_timeout)),
        }
    }

    /// Lock-free snapshot of the current flags.
    #[must_use]
    pub fn flags(&self) -> DeviceFlags {
        DeviceFlags::from_bits(self.flags.load(Ordering::Relaxed))
    }

    /// Begin scanning: clears `FOUND` and commands the transport to scan.
    ///
    /// A later [`TransportEvent::DeviceFound`] sets `FOUND`, stops the
    /// scan, and issues the connect command.
    pub async fn scan(&self) -> Result<()> {
        self.apply(|f| f.without(DeviceFlags::FOUND));
        info!("starting device scan");
        self.command("start_scan", self.transport.start_scan()).await
    }

    /// Command a connection attempt.
    ///
    /// `CONNECTED` is set by the resulting [`TransportEvent::Connected`];
    /// a failure leaves the flags unchanged so the caller may retry.
    pub async fn connect(&self, address: &str) -> Result<()> {
        debug!(address, "issuing connect command");
        self.command("connect", self.transport.connect(address)).await
    }

    /// Disconnect: clears `CONNECTED` and `FOUND`, commands the transport.
    pub async fn disconnect(&self) -> Result<()> {
        self.apply(|f| f.without(DeviceFlags::CONNECTED.with(DeviceFlags::FOUND)));
        self.command("disconnect", self.transport.disconnect()).await
    }

    /// Mark the device as presumed not worn (no fresh readings within the
    /// staleness window).
    pub fn mark_stale(&self) {
        self.apply(|f| f.with(DeviceFlags::NOT_WORN));
    }

    /// Clear `NOT_WORN` after a fresh reading arrived.
    pub fn mark_fresh(&self) {
        self.apply(|f| f.without(DeviceFlags::NOT_WORN));
    }

    /// Feed a battery sample through the tracker and update the battery
    /// flags.
    ///
    /// `BATTERY_LOW` and `RECHARGING` are kept mutually exclusive: a
    /// rising level sets `RECHARGING` and clears `BATTERY_LOW`; a falling
    /// level while `RECHARGING` clears `RECHARGING`; `BATTERY_LOW` is
    /// only raised while not recharging.
    pub fn on_battery(&self, level: u8) -> BatteryUpdate {
        let mut tracker = lock_or_recover(&self.write);
        let update = tracker.update(level);

        let old = self.flags();
        let mut new = old;
        if update.charging {
            new = new
                .with(DeviceFlags::RECHARGING)
                .without(DeviceFlags::BATTERY_LOW);
        } else {
            if update.fell && new.contains(DeviceFlags::RECHARGING) {
                new = new.without(DeviceFlags::RECHARGING);
            }
            if update.level < BATTERY_LOW_CUTOFF && !new.contains(DeviceFlags::RECHARGING) {
                new = new.with(DeviceFlags::BATTERY_LOW);
            }
        }
        self.publish(old, new);

        self.events.send(MonitorEvent::BatteryChanged {
            level: update.level,
            status: tracker.status(new.contains(DeviceFlags::CONNECTED)),
        });
        update
    }

    /// Qualitative battery status for display.
    #[must_use]
    pub fn battery_status(&self) -> BatteryStatus {
        let tracker = lock_or_recover(&self.write);
        tracker.status(self.flags().contains(DeviceFlags::CONNECTED))
    }

    /// The most recent battery sample, if any.
    #[must_use]
    pub fn battery_level(&self) -> Option<u8> {
        lock_or_recover(&self.write).level()
    }

    /// Consume transport events until cancelled.
    ///
    /// This is the only path through which transport outcomes reach the
    /// flags: discovery sets `FOUND` and chains stop-scan + connect,
    /// connection success sets `CONNECTED`, disconnection clears
    /// `CONNECTED` and `FOUND`.
    pub fn spawn_event_task(
        self: &Arc<Self>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let machine = Arc::clone(self);
        let mut rx = machine.transport.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("transport event task cancelled");
                        break;
                    }
                    event = rx.recv() => match event {
                        Ok(TransportEvent::DeviceFound { address }) => {
                            info!(%address, "device found");
                            machine.apply(|f| f.with(DeviceFlags::FOUND));
                            if let Err(e) =
                                machine.command("stop_scan", machine.transport.stop_scan()).await
                            {
                                debug!("stop_scan failed: {e}");
                            }
                            if let Err(e) = machine
                                .command("connect", machine.transport.connect(&address))
                                .await
                            {
                                warn!(%address, "connect command failed: {e}");
                            }
                        }
                        Ok(TransportEvent::Connected { address }) => {
                            info!(%address, "device connected");
                            machine.apply(|f| f.with(DeviceFlags::CONNECTED));
                        }
                        Ok(TransportEvent::ConnectFailed { address, reason }) => {
                            // State unchanged; the caller may retry.
                            warn!(%address, %reason, "connection attempt failed");
                        }
                        Ok(TransportEvent::Disconnected) => {
                            info!("device disconnected");
                            machine.apply(|f| {
                                f.without(DeviceFlags::CONNECTED.with(DeviceFlags::FOUND))
                            });
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("transport event stream lagged, skipped {skipped} events");
                        }
                        Err(RecvError::Closed) => {
                            debug!("transport event channel closed");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Apply a transition under the write lock, publishing the new mask
    /// when it changed.
    fn apply(&self, transition: impl FnOnce(DeviceFlags) -> DeviceFlags) -> DeviceFlags {
        let _guard = lock_or_recover(&self.write);
        let old = self.flags();
        let new = transition(old);
        self.publish(old, new);
        new
    }

    fn publish(&self, old: DeviceFlags, new: DeviceFlags) {
        if new != old {
            self.flags.store(new.bits(), Ordering::Relaxed);
            debug!(%old, %new, "device state transition");
            self.events.send(MonitorEvent::StateChanged { old, new });
        }
    }
}

/// Recover the guard from a poisoned mutex; the tracker state stays
/// consistent because every mutation is a single field write.
fn lock_or_recover<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
