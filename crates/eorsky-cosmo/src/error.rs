//! Error types for eorsky-cosmo.

use thiserror::Error;

/// Result type for distance/redshift conversions.
pub type Result<T> = std::result::Result<T, CosmoError>;

/// Errors raised by frequency, redshift and distance conversions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CosmoError {
    /// Frequencies must be positive and finite.
    #[error("invalid frequency: {0} Hz")]
    InvalidFrequency(f64),

    /// Redshifts must be finite and greater than -1.
    #[error("invalid redshift: {0}")]
    InvalidRedshift(f64),

    /// A lookup table was queried outside its sampled range.
    #[error("redshift {z} is outside table bounds ({min}, {max})")]
    OutOfBounds { z: f64, min: f64, max: f64 },

    /// A lookup table cannot be built from the given grid.
    #[error("invalid distance table: {0}")]
    InvalidTable(String),
}
