//! # World Configuration
//!
//! Tunables read once at startup from a TOML file. Every key is optional.
//!
//! ```toml
//! [noise]
//! resolution = 64.0
//! octaves = [
//!     { frequency = 1.0, weight = 8.0 },
//!     { frequency = 2.0, weight = 4.0 },
//! ]
//!
//! [bulk]
//! workers = 4
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One layer of a [`NoiseField`](crate::NoiseField).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Octave {
    /// Multiplier applied to the sample coordinates.
    pub frequency: f64,
    /// Contribution to the weighted mean.
    pub weight: f64,
}

impl Octave {
    /// Creates an octave.
    #[must_use]
    pub const fn new(frequency: f64, weight: f64) -> Self {
        Self { frequency, weight }
    }
}

/// Noise field settings shared by every axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    /// Tiles per unit of the lowest-frequency octave.
    pub resolution: f64,
    /// Layers summed into one sample.
    pub octaves: Vec<Octave>,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            resolution: 64.0,
            octaves: vec![
                Octave::new(1.0, 8.0),
                Octave::new(2.0, 4.0),
                Octave::new(4.0, 2.0),
                Octave::new(8.0, 1.0),
            ],
        }
    }
}

/// Bulk operation settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkSettings {
    /// Threads used by [`World::fill_all_chunks`](crate::World::fill_all_chunks).
    /// `1` fills sequentially on the calling thread.
    pub workers: usize,
}

impl Default for BulkSettings {
    fn default() -> Self {
        Self { workers: 1 }
    }
}

/// Top-level world configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Noise field settings.
    pub noise: NoiseSettings,
    /// Bulk operation settings.
    pub bulk: BulkSettings,
}

impl WorldConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is malformed or a value is out of range.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks every value is in range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.noise.resolution.is_finite() && self.noise.resolution > 0.0) {
            return Err(ConfigError::Invalid {
                field: "noise.resolution",
                reason: format!("must be positive, got {}", self.noise.resolution),
            });
        }
        if self.noise.octaves.is_empty() {
            return Err(ConfigError::Invalid {
                field: "noise.octaves",
                reason: "at least one octave is required".into(),
            });
        }
        for octave in &self.noise.octaves {
            if !(octave.frequency.is_finite() && octave.frequency > 0.0) {
                return Err(ConfigError::Invalid {
                    field: "noise.octaves.frequency",
                    reason: format!("must be positive, got {}", octave.frequency),
                });
            }
            if !(octave.weight.is_finite() && octave.weight >= 0.0) {
                return Err(ConfigError::Invalid {
                    field: "noise.octaves.weight",
                    reason: format!("must not be negative, got {}", octave.weight),
                });
            }
        }
        let weight_sum: f64 = self.noise.octaves.iter().map(|o| o.weight).sum();
        if weight_sum <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "noise.octaves.weight",
                reason: "weights must not all be zero".into(),
            });
        }
        if self.bulk.workers == 0 {
            return Err(ConfigError::Invalid {
                field: "bulk.workers",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}
