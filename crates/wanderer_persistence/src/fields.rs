//! # Record Fields
//!
//! Structural parsing of corrected JSON records.
//!
//! Two failure classes exist:
//! - **required** fields (object identity, e.g. a tile's position) fail the
//!   whole object with [`PersistError::MissingRequiredField`]
//! - **optional** fields log a warning, are recorded in the [`ParseReport`] and
//!   fall back to a default chosen by the caller

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::correction::{Migration, VersionCorrector};
use crate::error::{PersistError, PersistResult};

/// A raw JSON record.
pub type JsonObject = serde_json::Map<String, Value>;

/// Fields that were defaulted while parsing an object tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// `Type.field` entries, in the order they were defaulted.
    defaulted: Vec<String>,
}

impl ParseReport {
    /// Records a defaulted field and logs a warning.
    pub fn defaulted(&mut self, type_name: &str, field: &str, reason: &str) {
        warn!("{type_name} parse error: {field} {reason}, using default");
        self.defaulted.push(format!("{type_name}.{field}"));
    }

    /// Returns true if nothing had to be defaulted.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.defaulted.is_empty()
    }

    /// The defaulted `Type.field` entries.
    #[must_use]
    pub fn defaulted_fields(&self) -> &[String] {
        &self.defaulted
    }

    /// Appends another report's entries.
    pub fn merge(&mut self, other: ParseReport) {
        self.defaulted.extend(other.defaulted);
    }
}

/// A reconstructed object plus the fields that had to be defaulted.
#[derive(Clone, Debug)]
pub struct Parsed<T> {
    /// The reconstructed object.
    pub value: T,
    /// What was defaulted on the way.
    pub report: ParseReport,
}

impl<T> Parsed<T> {
    /// Returns true if every field parsed without falling back to a default.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.report.is_clean()
    }
}

/// A type with a versioned JSON representation.
pub trait JsonConvert: Sized {
    /// Extra data needed to rebuild the object (e.g. the owning chunk).
    type Context<'a>;

    /// Name used in log messages and errors.
    const TYPE_NAME: &'static str;

    /// Corrector chain for this type's records.
    #[must_use]
    fn correctors() -> &'static [VersionCorrector] {
        &[]
    }

    /// Serializes to a record in the current schema.
    fn to_json(&self) -> JsonObject;

    /// Rebuilds the object from a record already in the current schema.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or unparseable.
    fn from_json_without_correction(
        record: &JsonObject,
        context: Self::Context<'_>,
        migration: Migration<'_>,
        report: &mut ParseReport,
    ) -> PersistResult<Self>;

    /// Corrects the record to the current schema, then rebuilds the object.
    ///
    /// # Errors
    ///
    /// Returns an error if the file version is unsupported or a required
    /// field is missing or unparseable.
    fn from_json(
        mut record: JsonObject,
        context: Self::Context<'_>,
        migration: Migration<'_>,
    ) -> PersistResult<Parsed<Self>> {
        migration.correct(Self::TYPE_NAME, &mut record, Self::correctors())?;
        let mut report = ParseReport::default();
        let value = Self::from_json_without_correction(&record, context, migration, &mut report)?;
        Ok(Parsed { value, report })
    }
}

/// Unwraps a JSON value into an object.
///
/// # Errors
///
/// Returns [`PersistError::NotAnObject`] for any other JSON value.
pub fn into_object(value: Value, type_name: &'static str) -> PersistResult<JsonObject> {
    match value {
        Value::Object(record) => Ok(record),
        _ => Err(PersistError::NotAnObject { type_name }),
    }
}

/// Parses a required field.
///
/// # Errors
///
/// Returns [`PersistError::MissingRequiredField`] if the key is absent or its
/// value does not deserialize into `T`.
pub fn required<T: DeserializeOwned>(
    record: &JsonObject,
    type_name: &'static str,
    field: &'static str,
) -> PersistResult<T> {
    let parsed = record
        .get(field)
        .and_then(|value| T::deserialize(value).ok());
    match parsed {
        Some(value) => Ok(value),
        None => {
            warn!("{type_name} parse error: required field {field} is missing or invalid");
            Err(PersistError::MissingRequiredField { type_name, field })
        }
    }
}

/// Parses an optional field, recording a default in `report` if it fails.
///
/// A JSON `null` counts as missing.
pub fn optional<T: DeserializeOwned>(
    record: &JsonObject,
    type_name: &str,
    field: &str,
    report: &mut ParseReport,
) -> Option<T> {
    match record.get(field) {
        None | Some(Value::Null) => {
            report.defaulted(type_name, field, "is missing");
            None
        }
        Some(value) => match T::deserialize(value) {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                report.defaulted(type_name, field, "is invalid");
                None
            }
        },
    }
}

/// Parses an optional field stored as text, such as a `u64` seed written as a
/// string. Bare JSON numbers are accepted too.
pub fn optional_from_str<T: FromStr>(
    record: &JsonObject,
    type_name: &str,
    field: &str,
    report: &mut ParseReport,
) -> Option<T> {
    match record.get(field) {
        None | Some(Value::Null) => {
            report.defaulted(type_name, field, "is missing");
            None
        }
        Some(value) => match parse_from_str(value) {
            Some(parsed) => Some(parsed),
            None => {
                report.defaulted(type_name, field, "is invalid");
                None
            }
        },
    }
}

/// Parses a string or bare number value through [`FromStr`].
#[must_use]
pub fn parse_from_str<T: FromStr>(value: &Value) -> Option<T> {
    match value {
        Value::String(text) => text.trim().parse().ok(),
        Value::Number(number) => number.to_string().parse().ok(),
        _ => None,
    }
}

/// Borrows an optional nested object, recording a default if it is absent.
pub fn optional_object<'r>(
    record: &'r JsonObject,
    type_name: &str,
    field: &str,
    report: &mut ParseReport,
) -> Option<&'r JsonObject> {
    match record.get(field) {
        Some(Value::Object(nested)) => Some(nested),
        None | Some(Value::Null) => {
            report.defaulted(type_name, field, "is missing");
            None
        }
        Some(_) => {
            report.defaulted(type_name, field, "is not an object");
            None
        }
    }
}
