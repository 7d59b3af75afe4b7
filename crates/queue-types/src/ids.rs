//! Identity newtypes.
//!
//! [`EntryId`] is the only key that is stable across refreshes. Display numbers are
//! positional and are never stored.

use crate::{TypesError, TypesResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of one queue enrollment, assigned by the queue store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(u64);

impl EntryId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

impl From<u64> for EntryId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// A registry patient identifier, as typed by staff or printed on a queue slip.
///
/// The input is trimmed during construction. It must be non-empty, at most
/// [`PatientIdentifier::MAX_LEN`] characters, and contain only ASCII
/// alphanumerics, `-` or `_`, since it is embedded in request paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatientIdentifier(String);

impl PatientIdentifier {
    pub const MAX_LEN: usize = 64;

    /// Creates a new `PatientIdentifier` from the given input.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::Empty`] for blank input, [`TypesError::IdentifierTooLong`]
    /// when the trimmed input exceeds the limit, and [`TypesError::InvalidIdentifier`]
    /// when it contains characters that are not safe in a URL path segment.
    pub fn new(input: impl AsRef<str>) -> TypesResult<Self> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TypesError::Empty("patient identifier"));
        }
        if trimmed.chars().count() > Self::MAX_LEN {
            return Err(TypesError::IdentifierTooLong { max: Self::MAX_LEN });
        }
        let ok = trimmed
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !ok {
            return Err(TypesError::InvalidIdentifier(trimmed.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PatientIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for PatientIdentifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PatientIdentifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PatientIdentifier::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patient_identifier_trims_input() {
        let id = PatientIdentifier::new("  P-0042 ").expect("valid identifier");
        assert_eq!(id.as_str(), "P-0042");
    }

    #[test]
    fn test_patient_identifier_rejects_blank() {
        let err = PatientIdentifier::new("   ").expect_err("should reject blank");
        assert_eq!(err, TypesError::Empty("patient identifier"));
    }

    #[test]
    fn test_patient_identifier_rejects_path_characters() {
        let err = PatientIdentifier::new("../admin").expect_err("should reject slash");
        assert!(matches!(err, TypesError::InvalidIdentifier(s) if s == "../admin"));

        let err = PatientIdentifier::new("P 42").expect_err("should reject inner space");
        assert!(matches!(err, TypesError::InvalidIdentifier(_)));
    }

    #[test]
    fn test_patient_identifier_rejects_too_long() {
        let err = PatientIdentifier::new("a".repeat(65)).expect_err("should reject long");
        assert_eq!(err, TypesError::IdentifierTooLong { max: 64 });
    }

    #[test]
    fn test_patient_identifier_deserialize_validates() {
        let ok: PatientIdentifier = serde_json::from_str("\"2024-0001\"").expect("valid");
        assert_eq!(ok.as_str(), "2024-0001");
        assert!(serde_json::from_str::<PatientIdentifier>("\"\"").is_err());
    }

    #[test]
    fn test_entry_id_parses_trimmed_integer() {
        assert_eq!("  17 ".parse::<EntryId>().expect("parse"), EntryId::new(17));
        assert!("seventeen".parse::<EntryId>().is_err());
    }
}
