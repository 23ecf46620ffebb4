//! # Persistence Error Types
//!
//! All errors that can occur while reading or writing save data.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the persistence layer.
#[derive(Error, Debug)]
pub enum PersistError {
    /// A field needed to reconstruct an object's identity is absent or unparseable.
    #[error("missing required field `{field}` in {type_name} record")]
    MissingRequiredField {
        /// The type being reconstructed.
        type_name: &'static str,
        /// The offending key.
        field: &'static str,
    },

    /// A field parsed but holds a value its type cannot represent.
    #[error("field `{field}` of {type_name} record is out of range: {value}")]
    OutOfRange {
        /// The type being reconstructed.
        type_name: &'static str,
        /// The offending key.
        field: &'static str,
        /// The rejected value, as text.
        value: String,
    },

    /// The record handed to a parser was not a JSON object.
    #[error("{type_name} record is not a json object")]
    NotAnObject {
        /// The type being reconstructed.
        type_name: &'static str,
    },

    /// A version string could not be parsed.
    #[error("invalid save version `{0}`")]
    InvalidVersion(String),

    /// The save was written by a newer program than this one.
    #[error("save version {found} is newer than the supported version {supported}")]
    UnsupportedVersion {
        /// Version declared by the save.
        found: String,
        /// Newest version this program understands.
        supported: String,
    },

    /// A stored chunk blob could not be decoded.
    #[error("corrupt chunk data in {path:?}: {reason}")]
    CorruptChunk {
        /// Where the blob came from.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Malformed JSON text.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Underlying storage failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for persistence operations.
pub type PersistResult<T> = Result<T, PersistError>;
