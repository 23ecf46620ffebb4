//! # Save Versions
//!
//! Dotted numeric schema versions such as `2.0.2` or `2.2`.
//!
//! Missing trailing components compare as zero, so `2.2` and `2.2.0` are the
//! same version.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{PersistError, PersistResult};

/// A parsed save schema version.
#[derive(Clone, Debug)]
pub struct SaveVersion {
    /// Numeric components, most significant first.
    parts: Vec<u32>,
    /// The text the version was parsed from.
    raw: String,
}

impl SaveVersion {
    /// Parses a dotted version string.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::InvalidVersion`] if the string is empty or any
    /// component is not a non-negative integer.
    pub fn parse(text: &str) -> PersistResult<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(PersistError::InvalidVersion(text.to_owned()));
        }

        let parts = trimmed
            .split('.')
            .map(|part| part.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| PersistError::InvalidVersion(text.to_owned()))?;

        Ok(Self {
            parts,
            raw: trimmed.to_owned(),
        })
    }

    /// Returns the version as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the numeric components.
    #[must_use]
    pub fn parts(&self) -> &[u32] {
        &self.parts
    }
}

impl Ord for SaveVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            let a = self.parts.get(i).copied().unwrap_or(0);
            let b = other.parts.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for SaveVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SaveVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SaveVersion {}

impl FromStr for SaveVersion {
    type Err = PersistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SaveVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
