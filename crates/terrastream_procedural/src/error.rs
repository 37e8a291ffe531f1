//! # Generation Parameter Errors
//!
//! Raised once, when generation parameters are validated at startup.

use thiserror::Error;

/// Invalid generation parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    /// Chunk edge length must be at least one voxel.
    #[error("chunk size must be positive, got {0}")]
    InvalidChunkSize(i64),

    /// A real parameter is NaN or infinite.
    #[error("parameter `{name}` must be finite")]
    NonFinite {
        /// Parameter name as it appears in configuration.
        name: &'static str,
    },

    /// A real parameter is zero or negative.
    #[error("parameter `{name}` must be positive, got {value}")]
    NonPositive {
        /// Parameter name as it appears in configuration.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// `height_multiplier * hill_height` exceeds the tallest column allowed.
    #[error("terrain amplitude {value} exceeds the maximum of {max}")]
    HeightOutOfRange {
        /// Product of the two height factors.
        value: f64,
        /// Upper bound.
        max: f64,
    },
}

/// Result type for parameter validation.
pub type ParamResult<T> = Result<T, ParamError>;
