//! Error types for eorsky-pixel.

use thiserror::Error;

/// Result type for pixelization operations.
pub type Result<T> = std::result::Result<T, PixelError>;

/// Errors raised while mapping pixel indices to directions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PixelError {
    /// The resolution parameter cannot describe a tessellation.
    #[error("invalid resolution: nside must be positive, got {0}")]
    InvalidResolution(u32),

    /// A pixel index does not exist at the requested resolution.
    #[error("pixel {pixel} out of range for a map of {npix} pixels")]
    PixelOutOfRange { pixel: u64, npix: usize },
}
