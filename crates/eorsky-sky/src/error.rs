//! Error types for eorsky-sky.

use eorsky_cosmo::CosmoError;
use eorsky_pixel::PixelError;
use thiserror::Error;

use crate::field::Field;

/// Result type for eorsky-sky operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reconciling or resampling a sky.
#[derive(Debug, Error)]
pub enum Error {
    /// Fields still unset after reconciliation.
    #[error("missing required parameters: {}", list_fields(.0))]
    MissingParameter(Vec<Field>),

    /// An array disagrees with the shape implied by other resolved fields.
    #[error("shape mismatch for {field}: expected {expected}, got {actual}")]
    ShapeMismatch {
        field: Field,
        expected: String,
        actual: String,
    },

    /// Tile ordinal outside the discovered range.
    #[error("tile {index} out of range: {available} distinct tiles")]
    InvalidTileSelection { index: usize, available: usize },

    /// Channel selection does not resolve against the frequency array.
    #[error("invalid channel selection: {0}")]
    InvalidChannelSelection(String),

    /// A scalar parameter has an unusable value.
    #[error("invalid {field}: {reason}")]
    InvalidParameter { field: Field, reason: String },

    /// Pixelization error
    #[error("pixelization error: {0}")]
    Pixel(#[from] PixelError),

    /// Distance/redshift conversion error
    #[error("cosmology error: {0}")]
    Cosmo(#[from] CosmoError),

    /// Malformed file contents
    #[error("format error: {0}")]
    Format(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Binary encoding error
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// JSON error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn missing(field: Field) -> Self {
        Error::MissingParameter(vec![field])
    }

    pub(crate) fn invalid(field: Field, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }
}

fn list_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(Field::name)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_parameter_names_every_field() {
        let err = Error::MissingParameter(vec![Field::Nside, Field::SideLength]);
        assert_eq!(
            err.to_string(),
            "missing required parameters: nside, side_length"
        );
    }

    #[test]
    fn pixel_errors_convert() {
        let err: Error = PixelError::InvalidResolution(0).into();
        assert!(matches!(err, Error::Pixel(_)));
    }
}
