//! # World Error Types
//!
//! All errors that can occur while configuring, loading or saving a world.
//!
//! Generation itself never fails: a catalog miss resolves to the layer's
//! "none" variant.

use std::path::PathBuf;

use thiserror::Error;
use wanderer_persistence::PersistError;

/// Errors raised while loading or validating a [`WorldConfig`](crate::WorldConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config {path:?}: {source}")]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The config text is not valid TOML for [`WorldConfig`](crate::WorldConfig).
    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is outside its allowed range.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending key.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Errors that can occur in the world system.
#[derive(Error, Debug)]
pub enum WorldError {
    /// Reading, parsing or writing save data failed.
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// Invalid world configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A stored chunk record claims a different position than its storage key.
    #[error("chunk stored at ({key_x}, {key_y}) records position ({found_x}, {found_y})")]
    ChunkPositionMismatch {
        /// Storage key x.
        key_x: i64,
        /// Storage key y.
        key_y: i64,
        /// Position x found in the record.
        found_x: i64,
        /// Position y found in the record.
        found_y: i64,
    },
}

/// Result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
