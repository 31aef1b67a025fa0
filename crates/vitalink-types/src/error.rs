//! Error types for vitalink-types.

use thiserror::Error;

use crate::types::VitalKind;

/// Errors that can occur when constructing or parsing vitalink types.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum TypeError {
    /// Threshold bounds are inverted (min > max).
    #[error("invalid threshold for {kind}: min {min} is greater than max {max}")]
    InvalidThreshold {
        /// The parameter the threshold applies to.
        kind: VitalKind,
        /// The configured lower bound.
        min: f64,
        /// The configured upper bound.
        max: f64,
    },

    /// A vital parameter name could not be recognized.
    #[error("unknown vital parameter: '{0}'")]
    UnknownParameter(String),
}
