//! Threshold evaluation for vital-sign readings.
//!
//! A value below `min` or above `max` is a violation. Violation severity
//! is classified by distance: a value beyond the bound by more than 20%
//! of the threshold's range is `Critical`, otherwise `Warning`. This
//! tolerance band is the single governing rule for severity escalation;
//! the alert history store applies the exact same rule when recomputing
//! severity, so live and historical classification always match.
//!
//! # Example
//!
//! ```
//! use vitalink_core::thresholds::evaluate;
//! use vitalink_types::{Threshold, ThresholdStatus, VitalKind};
//!
//! let hr = Threshold::new(VitalKind::HeartRate, 60.0, 100.0).unwrap();
//! // range = 40, tolerance = 8: anything above 108 is critical
//! assert_eq!(evaluate(104.0, &hr), ThresholdStatus::Warning);
//! assert_eq!(evaluate(145.0, &hr), ThresholdStatus::Critical);
//! ```

use vitalink_types::{AlertSeverity, Reading, Threshold, ThresholdStatus, VitalKind};

use crate::traits::ThresholdProvider;

/// Fraction of the threshold range that separates a warning from a
/// critical violation.
pub const TOLERANCE_FRACTION: f64 = 0.2;

/// Evaluate a value against a threshold.
///
/// A degenerate range (`min == max`) degrades to a binary
/// violation/no-violation check with `Warning` severity.
#[must_use]
pub fn evaluate(value: f64, threshold: &Threshold) -> ThresholdStatus {
    if value >= threshold.min && value <= threshold.max {
        return ThresholdStatus::Normal;
    }

    let range = threshold.range();
    if range <= 0.0 {
        return ThresholdStatus::Warning;
    }

    let tolerance = TOLERANCE_FRACTION * range;
    if value < threshold.min - tolerance || value > threshold.max + tolerance {
        ThresholdStatus::Critical
    } else {
        ThresholdStatus::Warning
    }
}

/// Map a violation status to the severity used for alerting.
///
/// Returns `None` for `Normal` (nothing to alert on).
#[must_use]
pub fn violation_severity(status: ThresholdStatus) -> Option<AlertSeverity> {
    match status {
        ThresholdStatus::Normal => None,
        ThresholdStatus::Warning => Some(AlertSeverity::Medium),
        ThresholdStatus::Critical => Some(AlertSeverity::Critical),
    }
}

/// One threshold violation found in a reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// The violating parameter.
    pub kind: VitalKind,
    /// The reported value.
    pub value: f64,
    /// The threshold it violated.
    pub threshold: Threshold,
    /// Warning or Critical.
    pub status: ThresholdStatus,
}

/// Evaluate every reported value in a reading against the configured
/// thresholds, returning the violations.
///
/// Parameters without a configured threshold, and parameters the device
/// did not report this cycle, are skipped.
#[must_use]
pub fn evaluate_reading(reading: &Reading, provider: &dyn ThresholdProvider) -> Vec<Violation> {
    let mut violations = Vec::new();

    for kind in VitalKind::ALL {
        let Some(value) = reading.value_of(kind) else {
            continue;
        };
        let Some(threshold) = provider.get(kind) else {
            continue;
        };

        let status = evaluate(value, &threshold);
        if status.is_violation() {
            violations.push(Violation {
                kind,
                value,
                threshold,
                status,
            });
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ThresholdTable;

    fn hr() -> Threshold {
        Threshold::new(VitalKind::HeartRate, 60.0, 100.0).unwrap()
    }

    #[test]
    fn test_normal_inside_range() {
        assert_eq!(evaluate(60.0, &hr()), ThresholdStatus::Normal);
        assert_eq!(evaluate(80.0, &hr()), ThresholdStatus::Normal);
        assert_eq!(evaluate(100.0, &hr()), ThresholdStatus::Normal);
    }

    #[test]
    fn test_warning_within_tolerance_band() {
        // range = 40, tolerance = 8
        assert_eq!(evaluate(101.0, &hr()), ThresholdStatus::Warning);
        assert_eq!(evaluate(108.0, &hr()), ThresholdStatus::Warning);
        assert_eq!(evaluate(59.0, &hr()), ThresholdStatus::Warning);
        assert_eq!(evaluate(52.0, &hr()), ThresholdStatus::Warning);
    }

    #[test]
    fn test_critical_beyond_tolerance_band() {
        assert_eq!(evaluate(108.1, &hr()), ThresholdStatus::Critical);
        assert_eq!(evaluate(145.0, &hr()), ThresholdStatus::Critical);
        assert_eq!(evaluate(51.9, &hr()), ThresholdStatus::Critical);
    }

    #[test]
    fn test_zero_range_degrades_to_binary_warning() {
        let exact = Threshold::new(VitalKind::SpO2, 98.0, 98.0).unwrap();
        assert_eq!(evaluate(98.0, &exact), ThresholdStatus::Normal);
        assert_eq!(evaluate(97.0, &exact), ThresholdStatus::Warning);
        assert_eq!(evaluate(200.0, &exact), ThresholdStatus::Warning);
    }

    #[test]
    fn test_violation_severity_mapping() {
        assert_eq!(violation_severity(ThresholdStatus::Normal), None);
        assert_eq!(
            violation_severity(ThresholdStatus::Warning),
            Some(AlertSeverity::Medium)
        );
        assert_eq!(
            violation_severity(ThresholdStatus::Critical),
            Some(AlertSeverity::Critical)
        );
    }

    #[test]
    fn test_evaluate_reading_skips_missing() {
        let mut reading = vitalink_types::Reading::empty();
        reading.heart_rate = Some(145.0);
        reading.body_fat = Some(99.0); // no default threshold configured
        reading.spo2 = Some(97.0); // within range

        let table = ThresholdTable::default();
        let violations = evaluate_reading(&reading, &table);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, VitalKind::HeartRate);
        assert_eq!(violations[0].status, ThresholdStatus::Critical);
    }

    #[test]
    fn test_evaluate_reading_empty_table() {
        let mut reading = vitalink_types::Reading::empty();
        reading.heart_rate = Some(300.0);

        let table = ThresholdTable::empty();
        assert!(evaluate_reading(&reading, &table).is_empty());
    }
}
