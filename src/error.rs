//! Error types for badge-mesh.
//!
//! Degenerate triangles and empty optional inputs (no hole, no image, no
//! text) are not errors; they simply contribute nothing to the export.

use thiserror::Error;

/// Result type alias using [`BadgeError`].
pub type Result<T> = std::result::Result<T, BadgeError>;

/// Errors that abort an export.
#[derive(Error, Debug)]
pub enum BadgeError {
    /// The badge image could not be read or decoded.
    #[error("failed to decode image {source_name}: {message}")]
    ImageDecode {
        /// Path or short description of the image source.
        source_name: String,
        /// Decoder message.
        message: String,
    },

    /// The rasterized texture could not be encoded to PNG.
    #[error("failed to encode texture: {0}")]
    TextureEncode(String),

    /// A font file could not be parsed.
    #[error("failed to load font for family {family}: {message}")]
    FontLoad {
        /// Font family the data was registered under.
        family: String,
        /// Parser message.
        message: String,
    },

    /// Malformed OBJ input.
    #[error("OBJ parse error on line {line}: {message}")]
    ObjParse {
        /// 1-based line number.
        line: usize,
        /// Description of the problem.
        message: String,
    },

    /// File extension not recognized by the mesh loaders.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The file extension, or `(none)`.
        extension: String,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Design or configuration JSON could not be parsed.
    #[error("invalid design JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl BadgeError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        BadgeError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    pub(crate) fn image_decode<S: Into<String>, M: std::fmt::Display>(
        source_name: S,
        message: M,
    ) -> Self {
        BadgeError::ImageDecode {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }
}
