//! Battery level tracking and qualitative status derivation.

use vitalink_types::BatteryStatus;

/// Result of feeding one battery sample into the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryUpdate {
    /// The sampled level, clamped to 0..=100.
    pub level: u8,
    /// Whether the level rose strictly relative to the previous sample.
    pub charging: bool,
    /// Whether the level fell strictly relative to the previous sample.
    pub fell: bool,
}

/// Derives a charging/discharging classification from successive battery
/// readings.
///
/// The derivation is pure: `charging` holds exactly when a previous sample
/// exists and the new level is strictly greater. The qualitative
/// [`BatteryStatus`] is used only for display and alerting; control
/// decisions go through the state machine's battery flags.
#[derive(Debug, Clone, Default)]
pub struct BatteryTracker {
    previous: Option<u8>,
    charging: bool,
}

impl BatteryTracker {
    /// Create a tracker with no history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a new battery sample (percent).
    ///
    /// Values above 100 are clamped; some transports report raw bytes.
    pub fn update(&mut self, level: u8) -> BatteryUpdate {
        let level = level.min(100);
        let charging = self.previous.is_some_and(|prev| level > prev);
        let fell = self.previous.is_some_and(|prev| level < prev);

        self.previous = Some(level);
        self.charging = charging;

        BatteryUpdate {
            level,
            charging,
            fell,
        }
    }

    /// The most recent sample, if any.
    #[must_use]
    pub fn level(&self) -> Option<u8> {
        self.previous
    }

    /// Forget all history (e.g. after a disconnect).
    pub fn reset(&mut self) {
        self.previous = None;
        self.charging = false;
    }

    /// Qualitative status for display.
    #[must_use]
    pub fn status(&self, connected: bool) -> BatteryStatus {
        if !connected {
            return BatteryStatus::Disconnected;
        }
        match self.previous {
            None => BatteryStatus::Unknown,
            Some(_) if self.charging => BatteryStatus::Charging,
            Some(level) if level <= 10 => BatteryStatus::Critical,
            Some(level) if level <= 20 => BatteryStatus::Low,
            Some(level) if level <= 50 => BatteryStatus::Medium,
            Some(_) => BatteryStatus::Good,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_is_not_charging() {
        let mut tracker = BatteryTracker::new();
        let update = tracker.update(50);
        assert!(!update.charging);
        assert!(!update.fell);
        assert_eq!(tracker.level(), Some(50));
    }

    #[test]
    fn test_charging_requires_strict_increase() {
        let mut tracker = BatteryTracker::new();
        tracker.update(50);

        assert!(tracker.update(51).charging);
        assert!(!tracker.update(51).charging);
        let update = tracker.update(49);
        assert!(!update.charging);
        assert!(update.fell);
    }

    #[test]
    fn test_status_bands() {
        let mut tracker = BatteryTracker::new();
        assert_eq!(tracker.status(false), BatteryStatus::Disconnected);
        assert_eq!(tracker.status(true), BatteryStatus::Unknown);

        tracker.update(100);
        assert_eq!(tracker.status(true), BatteryStatus::Good);
        tracker.update(50);
        assert_eq!(tracker.status(true), BatteryStatus::Medium);
        tracker.update(20);
        assert_eq!(tracker.status(true), BatteryStatus::Low);
        tracker.update(10);
        assert_eq!(tracker.status(true), BatteryStatus::Critical);
    }

    #[test]
    fn test_charging_status_wins_over_level_band() {
        let mut tracker = BatteryTracker::new();
        tracker.update(8);
        tracker.update(9);
        assert_eq!(tracker.status(true), BatteryStatus::Charging);
    }

    #[test]
    fn test_level_clamped_to_100() {
        let mut tracker = BatteryTracker::new();
        let update = tracker.update(255);
        assert_eq!(update.level, 100);
        assert_eq!(tracker.level(), Some(100));
    }

    #[test]
    fn test_reset_clears_history() {
        let mut tracker = BatteryTracker::new();
        tracker.update(40);
        tracker.update(41);
        tracker.reset();
        assert_eq!(tracker.level(), None);
        assert_eq!(tracker.status(true), BatteryStatus::Unknown);
        assert!(!tracker.update(42).charging);
    }
}
