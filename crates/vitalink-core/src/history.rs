//! Append-only, size-bounded log of dispatched alerts.
//!
//! The log is newest-first and capped at a configurable capacity
//! (default 50); inserting at capacity evicts the oldest entry. Severity
//! is recomputed on insert with the same distance rule the live
//! dispatcher uses ([`crate::thresholds`]), so historical classification
//! always matches live classification.
//!
//! Entries are persisted as a JSON file that survives process restart.
//! Persistence failures are logged and never fail the append: the history
//! is an observability aid, not a system of record.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use vitalink_types::{AlertCategory, AlertEvent, AlertSeverity, Threshold, VitalKind};

use crate::error::Result;
use crate::thresholds::{evaluate, violation_severity};

/// Default maximum number of retained alerts.
pub const DEFAULT_CAPACITY: usize = 50;

/// Bounded, persisted alert history.
pub struct HistoryStore {
    log: Mutex<VecDeque<AlertEvent>>,
    capacity: usize,
    path: Option<PathBuf>,
}

impl HistoryStore {
    /// Create an in-memory store with the default capacity (for tests and
    /// ephemeral monitors).
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an in-memory store with a custom capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            log: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            path: None,
        }
    }

    /// Open a file-backed store, loading any previously persisted log.
    ///
    /// A corrupt or unreadable file is logged and treated as empty rather
    /// than failing the monitor.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_capacity(path, DEFAULT_CAPACITY)
    }

    /// Open a file-backed store with a custom capacity.
    pub fn open_with_capacity<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let capacity = capacity.max(1);
        let mut log = VecDeque::with_capacity(capacity);
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match serde_json::from_str::<Vec<AlertEvent>>(&contents) {
                    Ok(events) => {
                        log.extend(events.into_iter().take(capacity));
                        debug!("loaded {} alerts from {}", log.len(), path.display());
                    }
                    Err(e) => {
                        warn!("alert history at {} is corrupt, starting empty: {e}", path.display());
                    }
                },
                Err(e) => {
                    warn!("could not read alert history at {}: {e}", path.display());
                }
            }
        }

        Ok(Self {
            log: Mutex::new(log),
            capacity,
            path: Some(path),
        })
    }

    /// Maximum number of retained alerts.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an alert, evicting the oldest entry at capacity.
    ///
    /// Severity is recomputed from the value and bounds with the 20%
    /// tolerance rule; alerts without threshold context fall back to the
    /// category's default severity.
    pub fn add(
        &self,
        category: AlertCategory,
        parameter: Option<VitalKind>,
        value: Option<f64>,
        min: Option<f64>,
        max: Option<f64>,
    ) -> AlertEvent {
        let severity = recompute_severity(category, parameter, value, min, max);
        let event = AlertEvent {
            id: Uuid::new_v4(),
            category,
            parameter,
            value,
            min,
            max,
            severity,
            raised_at: OffsetDateTime::now_utc(),
        };

        let snapshot = {
            let mut log = lock_or_recover(&self.log);
            log.push_front(event.clone());
            while log.len() > self.capacity {
                log.pop_back();
            }
            self.serialize(&log)
        };
        self.persist(snapshot);
        event
    }

    /// All retained alerts, newest first.
    #[must_use]
    pub fn list(&self) -> Vec<AlertEvent> {
        lock_or_recover(&self.log).iter().cloned().collect()
    }

    /// Retained alerts with the given severity, newest first.
    #[must_use]
    pub fn list_by_severity(&self, severity: AlertSeverity) -> Vec<AlertEvent> {
        lock_or_recover(&self.log)
            .iter()
            .filter(|e| e.severity == severity)
            .cloned()
            .collect()
    }

    /// Retained alerts with the given category, newest first.
    #[must_use]
    pub fn list_by_category(&self, category: AlertCategory) -> Vec<AlertEvent> {
        lock_or_recover(&self.log)
            .iter()
            .filter(|e| e.category == category)
            .cloned()
            .collect()
    }

    /// Delete one alert by id. Returns whether an entry was removed.
    pub fn delete(&self, id: Uuid) -> bool {
        let (removed, snapshot) = {
            let mut log = lock_or_recover(&self.log);
            let before = log.len();
            log.retain(|e| e.id != id);
            let removed = log.len() != before;
            let snapshot = if removed { self.serialize(&log) } else { None };
            (removed, snapshot)
        };
        self.persist(snapshot);
        removed
    }

    /// Remove all retained alerts.
    pub fn clear(&self) {
        let snapshot = {
            let mut log = lock_or_recover(&self.log);
            log.clear();
            self.serialize(&log)
        };
        self.persist(snapshot);
    }

    /// Remove alerts older than the given number of days. Returns the
    /// number of removed entries.
    pub fn prune_older_than(&self, days: u32) -> usize {
        let cutoff = OffsetDateTime::now_utc() - Duration::from_secs(u64::from(days) * 86_400);
        let (removed, snapshot) = {
            let mut log = lock_or_recover(&self.log);
            let before = log.len();
            log.retain(|e| e.raised_at >= cutoff);
            let removed = before - log.len();
            let snapshot = if removed > 0 {
                debug!("pruned {removed} alerts older than {days} days");
                self.serialize(&log)
            } else {
                None
            };
            (removed, snapshot)
        };
        self.persist(snapshot);
        removed
    }

    /// Number of retained alerts.
    #[must_use]
    pub fn len(&self) -> usize {
        lock_or_recover(&self.log).len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize the log while the caller still holds the guard. Returns
    /// `None` for in-memory stores and on serialization failure.
    fn serialize(&self, log: &VecDeque<AlertEvent>) -> Option<String> {
        let path = self.path.as_ref()?;
        let events: Vec<&AlertEvent> = log.iter().collect();
        match serde_json::to_string_pretty(&events) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!("failed to serialize alert history for {}: {e}", path.display());
                None
            }
        }
    }

    /// Write a serialized snapshot to disk via a temp file rename. Runs
    /// after the log guard has been released so the file I/O never blocks
    /// readers or the dispatch path. Failures are logged; the in-memory
    /// log stays authoritative until the next attempt.
    fn persist(&self, snapshot: Option<String>) {
        let (Some(path), Some(json)) = (self.path.as_ref(), snapshot) else {
            return;
        };
        let tmp = path.with_extension("json.tmp");
        let result = std::fs::write(&tmp, json).and_then(|()| std::fs::rename(&tmp, path));
        if let Err(e) = result {
            warn!("failed to persist alert history to {}: {e}", path.display());
        }
    }
}

/// Apply the 20%-of-range tolerance rule to classify an alert's severity
/// from its recorded threshold context.
fn recompute_severity(
    category: AlertCategory,
    parameter: Option<VitalKind>,
    value: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
) -> AlertSeverity {
    if let (Some(kind), Some(value), Some(min), Some(max)) = (parameter, value, min, max) {
        if let Ok(threshold) = Threshold::new(kind, min, max) {
            if let Some(severity) = violation_severity(evaluate(value, &threshold)) {
                return severity;
            }
        }
    }
    category.default_severity()
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
