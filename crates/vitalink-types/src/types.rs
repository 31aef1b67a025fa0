//! Core types for vitalink sensor data and alerting.

use core::fmt;
use core::ops::{BitAnd, BitOr, BitOrAssign};
use core::str::FromStr;
use core::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::TypeError;

/// Bitmask of independent wearable device state flags.
///
/// Flags are set and cleared independently of each other; the mask as a
/// whole is published atomically by the connectivity state machine so that
/// readers always observe a consistent snapshot.
///
/// `NOT_WORN` is derived from reading staleness, never reported by the
/// device itself.
///
/// # Examples
///
/// ```
/// use vitalink_types::DeviceFlags;
///
/// let flags = DeviceFlags::CONNECTED | DeviceFlags::BATTERY_LOW;
/// assert!(flags.contains(DeviceFlags::CONNECTED));
/// assert!(!flags.contains(DeviceFlags::NOT_WORN));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DeviceFlags(u8);

impl DeviceFlags {
    /// Device has an active connection.
    pub const CONNECTED: DeviceFlags = DeviceFlags(1);
    /// Device was discovered during scanning.
    pub const FOUND: DeviceFlags = DeviceFlags(1 << 1);
    /// Battery level is below the low-battery cutoff (20%).
    pub const BATTERY_LOW: DeviceFlags = DeviceFlags(1 << 2);
    /// Battery level is rising between samples.
    pub const RECHARGING: DeviceFlags = DeviceFlags(1 << 3);
    /// No fresh readings within 1.5x the polling interval.
    pub const NOT_WORN: DeviceFlags = DeviceFlags(1 << 4);

    const ALL_BITS: u8 = 0b1_1111;

    /// An empty mask with every flag cleared.
    #[must_use]
    pub const fn empty() -> Self {
        DeviceFlags(0)
    }

    /// Raw bit representation of the mask.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Reconstruct a mask from raw bits, discarding unknown bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        DeviceFlags(bits & Self::ALL_BITS)
    }

    /// Check whether every flag in `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: DeviceFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Check whether no flags are set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Return a copy with the given flags set.
    #[must_use]
    pub const fn with(self, other: DeviceFlags) -> Self {
        DeviceFlags(self.0 | other.0)
    }

    /// Return a copy with the given flags cleared.
    #[must_use]
    pub const fn without(self, other: DeviceFlags) -> Self {
        DeviceFlags(self.0 & !other.0)
    }

    /// Flags that are set in `self` but not in `earlier`.
    ///
    /// Used to detect rising edges when comparing two snapshots.
    #[must_use]
    pub const fn rising_from(self, earlier: DeviceFlags) -> Self {
        DeviceFlags(self.0 & !earlier.0)
    }

    /// Flags that are set in `earlier` but not in `self`.
    #[must_use]
    pub const fn falling_from(self, earlier: DeviceFlags) -> Self {
        DeviceFlags(earlier.0 & !self.0)
    }
}

impl BitOr for DeviceFlags {
    type Output = DeviceFlags;

    fn bitor(self, rhs: DeviceFlags) -> DeviceFlags {
        DeviceFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for DeviceFlags {
    fn bitor_assign(&mut self, rhs: DeviceFlags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for DeviceFlags {
    type Output = DeviceFlags;

    fn bitand(self, rhs: DeviceFlags) -> DeviceFlags {
        DeviceFlags(self.0 & rhs.0)
    }
}

impl fmt::Display for DeviceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "idle");
        }
        let mut first = true;
        for (flag, label) in [
            (Self::CONNECTED, "connected"),
            (Self::FOUND, "found"),
            (Self::BATTERY_LOW, "battery-low"),
            (Self::RECHARGING, "recharging"),
            (Self::NOT_WORN, "not-worn"),
        ] {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{label}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Vital-sign parameter measured by the wearable.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new parameters
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum VitalKind {
    /// Heart rate in beats per minute.
    HeartRate,
    /// Systolic blood pressure in mmHg.
    SystolicPressure,
    /// Diastolic blood pressure in mmHg.
    DiastolicPressure,
    /// Blood oxygen saturation percentage.
    SpO2,
    /// Body temperature in degrees Celsius.
    BodyTemperature,
    /// Blood glucose in mg/dL.
    BloodGlucose,
    /// Body fat percentage.
    BodyFat,
    /// Step count since the last device reset.
    Steps,
}

impl VitalKind {
    /// All known parameters, in display order.
    pub const ALL: [VitalKind; 8] = [
        VitalKind::HeartRate,
        VitalKind::SystolicPressure,
        VitalKind::DiastolicPressure,
        VitalKind::SpO2,
        VitalKind::BodyTemperature,
        VitalKind::BloodGlucose,
        VitalKind::BodyFat,
        VitalKind::Steps,
    ];

    /// Human-readable label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            VitalKind::HeartRate => "Heart Rate",
            VitalKind::SystolicPressure => "Systolic Pressure",
            VitalKind::DiastolicPressure => "Diastolic Pressure",
            VitalKind::SpO2 => "SpO2",
            VitalKind::BodyTemperature => "Body Temperature",
            VitalKind::BloodGlucose => "Blood Glucose",
            VitalKind::BodyFat => "Body Fat",
            VitalKind::Steps => "Steps",
        }
    }

    /// Canonical measurement unit.
    #[must_use]
    pub fn unit(&self) -> &'static str {
        match self {
            VitalKind::HeartRate => "bpm",
            VitalKind::SystolicPressure | VitalKind::DiastolicPressure => "mmHg",
            VitalKind::SpO2 | VitalKind::BodyFat => "%",
            VitalKind::BodyTemperature => "\u{00b0}C",
            VitalKind::BloodGlucose => "mg/dL",
            VitalKind::Steps => "steps",
        }
    }
}

impl fmt::Display for VitalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for VitalKind {
    type Err = TypeError;

    /// Parse a snake_case parameter name as used in configuration files.
    ///
    /// ```
    /// use vitalink_types::VitalKind;
    ///
    /// assert_eq!("heart_rate".parse::<VitalKind>(), Ok(VitalKind::HeartRate));
    /// assert!("pulse".parse::<VitalKind>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "heart_rate" => Ok(VitalKind::HeartRate),
            "systolic_pressure" => Ok(VitalKind::SystolicPressure),
            "diastolic_pressure" => Ok(VitalKind::DiastolicPressure),
            "spo2" => Ok(VitalKind::SpO2),
            "body_temperature" => Ok(VitalKind::BodyTemperature),
            "blood_glucose" => Ok(VitalKind::BloodGlucose),
            "body_fat" => Ok(VitalKind::BodyFat),
            "steps" => Ok(VitalKind::Steps),
            other => Err(TypeError::UnknownParameter(other.to_string())),
        }
    }
}

/// One timestamped sample from the wearable.
///
/// Any vital field may be absent when the device did not report it for
/// this cycle. Timestamps are monotonically non-decreasing within one
/// device session; the transport is responsible for enforcing this.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reading {
    /// Heart rate in bpm.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub heart_rate: Option<f64>,
    /// Systolic blood pressure in mmHg.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub systolic: Option<f64>,
    /// Diastolic blood pressure in mmHg.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub diastolic: Option<f64>,
    /// Blood oxygen saturation percentage.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub spo2: Option<f64>,
    /// Body temperature in degrees Celsius.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub body_temperature: Option<f64>,
    /// Blood glucose in mg/dL.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub blood_glucose: Option<f64>,
    /// Body fat percentage.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub body_fat: Option<f64>,
    /// Step count since the last device reset.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub steps: Option<u32>,
    /// When the sample was captured.
    pub captured_at: OffsetDateTime,
}

impl Reading {
    /// Create an empty reading captured now.
    #[must_use]
    pub fn empty() -> Self {
        Self::at(OffsetDateTime::now_utc())
    }

    /// Create an empty reading with the given timestamp.
    #[must_use]
    pub fn at(captured_at: OffsetDateTime) -> Self {
        Self {
            heart_rate: None,
            systolic: None,
            diastolic: None,
            spo2: None,
            body_temperature: None,
            blood_glucose: None,
            body_fat: None,
            steps: None,
            captured_at,
        }
    }

    /// Get the value for a parameter, if the device reported it.
    #[must_use]
    pub fn value_of(&self, kind: VitalKind) -> Option<f64> {
        match kind {
            VitalKind::HeartRate => self.heart_rate,
            VitalKind::SystolicPressure => self.systolic,
            VitalKind::DiastolicPressure => self.diastolic,
            VitalKind::SpO2 => self.spo2,
            VitalKind::BodyTemperature => self.body_temperature,
            VitalKind::BloodGlucose => self.blood_glucose,
            VitalKind::BodyFat => self.body_fat,
            VitalKind::Steps => self.steps.map(f64::from),
        }
    }

    /// Check whether the device reported no values at all this cycle.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        VitalKind::ALL.iter().all(|k| self.value_of(*k).is_none())
    }
}

/// Configured acceptable range for one vital parameter.
///
/// Supplied externally and read-only to the monitoring core.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Threshold {
    /// The parameter the range applies to.
    pub kind: VitalKind,
    /// Lower acceptable bound (inclusive).
    pub min: f64,
    /// Upper acceptable bound (inclusive).
    pub max: f64,
}

impl Threshold {
    /// Create a threshold, validating that `min <= max`.
    ///
    /// # Errors
    ///
    /// Returns [`TypeError::InvalidThreshold`] when the bounds are inverted.
    pub fn new(kind: VitalKind, min: f64, max: f64) -> Result<Self, TypeError> {
        if min > max {
            return Err(TypeError::InvalidThreshold { kind, min, max });
        }
        Ok(Self { kind, min, max })
    }

    /// Width of the acceptable range.
    #[must_use]
    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Human-readable range description, e.g. `"60-100 bpm"`.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{}-{} {}", self.min, self.max, self.kind.unit())
    }
}

/// Result of evaluating a value against a threshold.
///
/// Ordered by severity: `Normal < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum ThresholdStatus {
    /// Value is within the configured range.
    Normal = 0,
    /// Value violates the range but stays within the tolerance band.
    Warning = 1,
    /// Value is beyond the bound by more than the tolerance band.
    Critical = 2,
}

impl ThresholdStatus {
    /// Check whether the value violated the configured range.
    #[must_use]
    pub fn is_violation(&self) -> bool {
        *self != ThresholdStatus::Normal
    }
}

impl fmt::Display for ThresholdStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdStatus::Normal => write!(f, "Normal"),
            ThresholdStatus::Warning => write!(f, "Warning"),
            ThresholdStatus::Critical => write!(f, "Critical"),
        }
    }
}

/// Qualitative rank of an alert.
///
/// Ordered so that threshold comparisons like
/// `severity >= AlertSeverity::High` work as expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum AlertSeverity {
    /// Informational, lowest urgency.
    Low = 0,
    /// Worth noticing.
    Medium = 1,
    /// Needs attention soon.
    High = 2,
    /// Needs immediate attention.
    Critical = 3,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Low => write!(f, "Low"),
            AlertSeverity::Medium => write!(f, "Medium"),
            AlertSeverity::High => write!(f, "High"),
            AlertSeverity::Critical => write!(f, "Critical"),
        }
    }
}

/// Category of a raised alert.
///
/// Each category carries a fixed minimum re-alert interval used by the
/// dispatcher's rate limiter, preventing alert storms from a device that
/// oscillates near a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum AlertCategory {
    /// A reading crossed a threshold by more than the tolerance band.
    CriticalValue,
    /// A reading violated a threshold within the tolerance band.
    WarningValue,
    /// The device connection was lost.
    DeviceDisconnected,
    /// The device battery dropped below the low-battery cutoff.
    BatteryLow,
    /// No fresh readings arrived; the device is presumed not worn.
    NotWorn,
}

impl AlertCategory {
    /// Minimum interval between two live deliveries of this category.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        match self {
            AlertCategory::CriticalValue => Duration::from_secs(2 * 60),
            AlertCategory::WarningValue => Duration::from_secs(5 * 60),
            AlertCategory::DeviceDisconnected => Duration::from_secs(10 * 60),
            AlertCategory::BatteryLow => Duration::from_secs(30 * 60),
            AlertCategory::NotWorn => Duration::from_secs(15 * 60),
        }
    }

    /// Default severity for alerts that carry no threshold context.
    #[must_use]
    pub fn default_severity(&self) -> AlertSeverity {
        match self {
            AlertCategory::CriticalValue => AlertSeverity::Critical,
            AlertCategory::WarningValue => AlertSeverity::Medium,
            AlertCategory::DeviceDisconnected => AlertSeverity::High,
            AlertCategory::BatteryLow => AlertSeverity::Medium,
            AlertCategory::NotWorn => AlertSeverity::Low,
        }
    }
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertCategory::CriticalValue => write!(f, "critical-value"),
            AlertCategory::WarningValue => write!(f, "warning-value"),
            AlertCategory::DeviceDisconnected => write!(f, "device-disconnected"),
            AlertCategory::BatteryLow => write!(f, "battery-low"),
            AlertCategory::NotWorn => write!(f, "device-not-worn"),
        }
    }
}

/// One dispatched alert, as recorded in the alert history.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AlertEvent {
    /// Unique id assigned at dispatch time.
    pub id: Uuid,
    /// Category the alert was raised under.
    pub category: AlertCategory,
    /// The violating parameter, absent for device-state alerts.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub parameter: Option<VitalKind>,
    /// The value that triggered the alert.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub value: Option<f64>,
    /// Lower threshold bound at dispatch time.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub min: Option<f64>,
    /// Upper threshold bound at dispatch time.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub max: Option<f64>,
    /// Severity at record time.
    pub severity: AlertSeverity,
    /// When the alert was raised.
    pub raised_at: OffsetDateTime,
}

impl AlertEvent {
    /// Human-readable description of the threshold that was violated,
    /// e.g. `"60-100 bpm"`. Empty for device-state alerts.
    #[must_use]
    pub fn threshold_description(&self) -> String {
        match (self.parameter, self.min, self.max) {
            (Some(kind), Some(min), Some(max)) => {
                format!("{}-{} {}", min, max, kind.unit())
            }
            _ => String::new(),
        }
    }
}

/// Qualitative battery status derived from successive battery samples.
///
/// Used for display and alerting only, never for control decisions beyond
/// feeding the state machine's battery flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BatteryStatus {
    /// No device connection; level unknown.
    Disconnected,
    /// Connected but no battery sample seen yet.
    Unknown,
    /// Level rising between samples.
    Charging,
    /// Level at or below 10%.
    Critical,
    /// Level at or below 20%.
    Low,
    /// Level at or below 50%.
    Medium,
    /// Level above 50%.
    Good,
}

impl fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatteryStatus::Disconnected => write!(f, "Disconnected"),
            BatteryStatus::Unknown => write!(f, "Unknown"),
            BatteryStatus::Charging => write!(f, "Charging"),
            BatteryStatus::Critical => write!(f, "Critical"),
            BatteryStatus::Low => write!(f, "Low"),
            BatteryStatus::Medium => write!(f, "Medium"),
            BatteryStatus::Good => write!(f, "Good"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_flags_independent() {
        let mut flags = DeviceFlags::empty();
        flags |= DeviceFlags::CONNECTED;
        flags |= DeviceFlags::BATTERY_LOW;
        assert!(flags.contains(DeviceFlags::CONNECTED));
        assert!(flags.contains(DeviceFlags::BATTERY_LOW));

        let flags = flags.without(DeviceFlags::CONNECTED);
        assert!(!flags.contains(DeviceFlags::CONNECTED));
        assert!(flags.contains(DeviceFlags::BATTERY_LOW));
    }

    #[test]
    fn test_device_flags_edges() {
        let old = DeviceFlags::CONNECTED | DeviceFlags::FOUND;
        let new = DeviceFlags::FOUND | DeviceFlags::NOT_WORN;

        assert_eq!(new.rising_from(old), DeviceFlags::NOT_WORN);
        assert_eq!(new.falling_from(old), DeviceFlags::CONNECTED);
    }

    #[test]
    fn test_device_flags_from_bits_masks_unknown() {
        let flags = DeviceFlags::from_bits(0xFF);
        assert_eq!(flags.bits(), 0b1_1111);
    }

    #[test]
    fn test_device_flags_display() {
        assert_eq!(DeviceFlags::empty().to_string(), "idle");
        let flags = DeviceFlags::CONNECTED | DeviceFlags::NOT_WORN;
        assert_eq!(flags.to_string(), "connected|not-worn");
    }

    #[test]
    fn test_vital_kind_round_trip() {
        for kind in VitalKind::ALL {
            let s = match kind {
                VitalKind::HeartRate => "heart_rate",
                VitalKind::SystolicPressure => "systolic_pressure",
                VitalKind::DiastolicPressure => "diastolic_pressure",
                VitalKind::SpO2 => "spo2",
                VitalKind::BodyTemperature => "body_temperature",
                VitalKind::BloodGlucose => "blood_glucose",
                VitalKind::BodyFat => "body_fat",
                VitalKind::Steps => "steps",
            };
            assert_eq!(s.parse::<VitalKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_reading_value_of() {
        let mut reading = Reading::empty();
        reading.heart_rate = Some(72.0);
        reading.steps = Some(4200);

        assert_eq!(reading.value_of(VitalKind::HeartRate), Some(72.0));
        assert_eq!(reading.value_of(VitalKind::Steps), Some(4200.0));
        assert_eq!(reading.value_of(VitalKind::SpO2), None);
        assert!(!reading.is_empty());
        assert!(Reading::empty().is_empty());
    }

    #[test]
    fn test_threshold_validation() {
        let t = Threshold::new(VitalKind::HeartRate, 60.0, 100.0).unwrap();
        assert_eq!(t.range(), 40.0);
        assert_eq!(t.describe(), "60-100 bpm");

        let err = Threshold::new(VitalKind::HeartRate, 100.0, 60.0).unwrap_err();
        assert!(matches!(err, TypeError::InvalidThreshold { .. }));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(AlertSeverity::Critical > AlertSeverity::High);
        assert!(AlertSeverity::High > AlertSeverity::Medium);
        assert!(AlertSeverity::Medium > AlertSeverity::Low);
        assert!(ThresholdStatus::Critical > ThresholdStatus::Warning);
        assert!(ThresholdStatus::Warning > ThresholdStatus::Normal);
    }

    #[test]
    fn test_category_intervals() {
        assert_eq!(
            AlertCategory::CriticalValue.min_interval(),
            Duration::from_secs(120)
        );
        assert_eq!(
            AlertCategory::WarningValue.min_interval(),
            Duration::from_secs(300)
        );
        assert_eq!(
            AlertCategory::DeviceDisconnected.min_interval(),
            Duration::from_secs(600)
        );
        assert_eq!(
            AlertCategory::BatteryLow.min_interval(),
            Duration::from_secs(1800)
        );
        assert_eq!(
            AlertCategory::NotWorn.min_interval(),
            Duration::from_secs(900)
        );
    }

    #[test]
    fn test_alert_event_threshold_description() {
        let event = AlertEvent {
            id: Uuid::new_v4(),
            category: AlertCategory::CriticalValue,
            parameter: Some(VitalKind::HeartRate),
            value: Some(145.0),
            min: Some(60.0),
            max: Some(100.0),
            severity: AlertSeverity::Critical,
            raised_at: OffsetDateTime::now_utc(),
        };
        assert_eq!(event.threshold_description(), "60-100 bpm");

        let device_event = AlertEvent {
            parameter: None,
            value: None,
            min: None,
            max: None,
            category: AlertCategory::DeviceDisconnected,
            severity: AlertSeverity::High,
            ..event
        };
        assert_eq!(device_event.threshold_description(), "");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_alert_event_serde_round_trip() {
        let event = AlertEvent {
            id: Uuid::new_v4(),
            category: AlertCategory::WarningValue,
            parameter: Some(VitalKind::SpO2),
            value: Some(93.0),
            min: Some(95.0),
            max: Some(100.0),
            severity: AlertSeverity::Medium,
            raised_at: OffsetDateTime::now_utc(),
        };

        let json = serde_json::to_string(&event).unwrap();
        let back: AlertEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
