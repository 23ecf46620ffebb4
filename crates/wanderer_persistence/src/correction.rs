//! # Version Correction
//!
//! Upgrades raw save records from the schema they were written with to the
//! current schema, before any structural parsing happens.
//!
//! Every persisted type owns an ordered list of [`VersionCorrector`]s. A
//! corrector targeting version `T` is run only if the file version is older
//! than `T`, and correctors always run in ascending target order. Correctors
//! must be no-ops when the keys they look for are absent, which makes the whole
//! chain safe to apply to an already current record, or twice.

use std::fmt;

use tracing::debug;

use crate::error::{PersistError, PersistResult};
use crate::fields::JsonObject;
use crate::version::SaveVersion;

/// A single upgrade step for one persisted type.
#[derive(Clone, Copy)]
pub struct VersionCorrector {
    /// The schema version this corrector upgrades records to.
    pub target_version: &'static str,
    /// In-place transform of the raw record.
    pub correct: fn(&mut JsonObject),
}

impl VersionCorrector {
    /// Creates a corrector upgrading records to `target_version`.
    #[must_use]
    pub const fn new(target_version: &'static str, correct: fn(&mut JsonObject)) -> Self {
        Self {
            target_version,
            correct,
        }
    }
}

impl fmt::Debug for VersionCorrector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionCorrector")
            .field("target_version", &self.target_version)
            .finish_non_exhaustive()
    }
}

/// Runs corrector chains against a fixed current schema version.
#[derive(Clone, Debug)]
pub struct JsonCorrecter {
    /// Newest schema this program writes.
    current: SaveVersion,
}

impl JsonCorrecter {
    /// Creates a correcter for the given current schema version.
    #[must_use]
    pub fn new(current: SaveVersion) -> Self {
        Self { current }
    }

    /// Returns the current schema version.
    #[must_use]
    pub fn current(&self) -> &SaveVersion {
        &self.current
    }

    /// Rejects save versions newer than the current one.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::UnsupportedVersion`] if `file_version` is newer
    /// than the current schema.
    pub fn check_supported(&self, file_version: &SaveVersion) -> PersistResult<()> {
        if *file_version > self.current {
            return Err(PersistError::UnsupportedVersion {
                found: file_version.to_string(),
                supported: self.current.to_string(),
            });
        }
        Ok(())
    }

    /// Applies every corrector newer than `from_version`, in ascending order.
    ///
    /// Returns the number of correctors applied.
    ///
    /// # Errors
    ///
    /// Returns an error if `from_version` is newer than the current schema or a
    /// corrector declares an unparseable target version.
    pub fn correct(
        &self,
        type_name: &str,
        record: &mut JsonObject,
        correctors: &[VersionCorrector],
        from_version: &SaveVersion,
    ) -> PersistResult<usize> {
        self.check_supported(from_version)?;

        let mut steps = correctors
            .iter()
            .map(|corrector| -> PersistResult<_> {
                Ok((SaveVersion::parse(corrector.target_version)?, corrector))
            })
            .collect::<PersistResult<Vec<_>>>()?;
        // Stable: correctors declared for the same version keep their order.
        steps.sort_by(|a, b| a.0.cmp(&b.0));

        let mut applied = 0;
        for (target, corrector) in steps {
            if *from_version >= target {
                continue;
            }
            (corrector.correct)(record);
            applied += 1;
            debug!("corrected {type_name} json data: {from_version} -> {target}");
        }
        Ok(applied)
    }
}

/// A correcter paired with the version of the file being loaded.
///
/// Handed down through nested parsers so that each persisted type can run its
/// own corrector chain against the same file version.
#[derive(Clone, Copy, Debug)]
pub struct Migration<'a> {
    correcter: &'a JsonCorrecter,
    file_version: &'a SaveVersion,
}

impl<'a> Migration<'a> {
    /// Creates a migration from `file_version` to the correcter's current version.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::UnsupportedVersion`] if the file is newer than
    /// the current schema.
    pub fn new(correcter: &'a JsonCorrecter, file_version: &'a SaveVersion) -> PersistResult<Self> {
        correcter.check_supported(file_version)?;
        Ok(Self {
            correcter,
            file_version,
        })
    }

    /// The version the file was written with.
    #[must_use]
    pub fn file_version(&self) -> &'a SaveVersion {
        self.file_version
    }

    /// Runs `correctors` against `record`.
    ///
    /// # Errors
    ///
    /// See [`JsonCorrecter::correct`].
    pub fn correct(
        &self,
        type_name: &str,
        record: &mut JsonObject,
        correctors: &[VersionCorrector],
    ) -> PersistResult<usize> {
        self.correcter
            .correct(type_name, record, correctors, self.file_version)
    }
}

/// Moves values from old keys to new keys, for every old key that is present.
///
/// An existing value under the new key is overwritten. Absent old keys are
/// ignored.
pub fn remap_keys_if_exist(record: &mut JsonObject, renames: &[(&str, &str)]) {
    for &(old_key, new_key) in renames {
        if let Some(value) = record.remove(old_key) {
            record.insert(new_key.to_owned(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: serde_json::Value) -> JsonObject {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!("test records are objects"),
        }
    }

    fn rename_a(record: &mut JsonObject) {
        remap_keys_if_exist(record, &[("a", "b")]);
    }

    fn rename_b(record: &mut JsonObject) {
        remap_keys_if_exist(record, &[("b", "c")]);
    }

    // Declared out of order on purpose.
    const CHAIN: &[VersionCorrector] = &[
        VersionCorrector::new("2.2", rename_b),
        VersionCorrector::new("2.0.2", rename_a),
    ];

    fn correcter() -> JsonCorrecter {
        JsonCorrecter::new(SaveVersion::parse("2.4").unwrap())
    }

    #[test]
    fn test_applies_in_ascending_order() {
        let mut record = object(json!({ "a": 1 }));
        let applied = correcter()
            .correct("Test", &mut record, CHAIN, &SaveVersion::parse("2.0").unwrap())
            .unwrap();

        assert_eq!(applied, 2);
        assert_eq!(record, object(json!({ "c": 1 })));
    }

    #[test]
    fn test_skips_correctors_already_passed() {
        let mut record = object(json!({ "a": 1, "b": 2 }));
        let applied = correcter()
            .correct("Test", &mut record, CHAIN, &SaveVersion::parse("2.0.2").unwrap())
            .unwrap();

        assert_eq!(applied, 1);
        assert_eq!(record, object(json!({ "a": 1, "c": 2 })));
    }

    #[test]
    fn test_current_version_is_noop() {
        let original = object(json!({ "a": 1, "b": 2 }));
        let mut record = original.clone();
        let applied = correcter()
            .correct("Test", &mut record, CHAIN, &SaveVersion::parse("2.4").unwrap())
            .unwrap();

        assert_eq!(applied, 0);
        assert_eq!(record, original);
    }

    #[test]
    fn test_chain_is_idempotent() {
        let from = SaveVersion::parse("1.0").unwrap();
        let mut once = object(json!({ "a": 1, "x": true }));
        correcter().correct("Test", &mut once, CHAIN, &from).unwrap();

        let mut twice = once.clone();
        correcter().correct("Test", &mut twice, CHAIN, &from).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_newer_file_is_unsupported() {
        let mut record = JsonObject::new();
        let result = correcter().correct("Test", &mut record, CHAIN, &SaveVersion::parse("3.0").unwrap());

        assert!(matches!(result, Err(PersistError::UnsupportedVersion { .. })));
    }

    #[test]
    fn test_remap_ignores_absent_keys() {
        let mut record = object(json!({ "keep": 1 }));
        remap_keys_if_exist(&mut record, &[("missing", "renamed")]);
        assert_eq!(record, object(json!({ "keep": 1 })));
    }
}
