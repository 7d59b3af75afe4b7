//! Priority bands assigned by the external classifier.
//!
//! The queue never computes a priority; it only orders by one.

use crate::{TypesError, TypesResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordinal priority classification.
///
/// Totally ordered `Critical > High > Medium > Normal`; the derived `Ord` follows the
/// declaration order, so variants are listed from least to most urgent.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    #[default]
    Normal,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Normal,
    ];

    /// Upper-case label used on the wire and in listings.
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "CRITICAL",
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Normal => "NORMAL",
        }
    }

    /// Whether listings should flag the entry as urgent.
    pub fn is_urgent(self) -> bool {
        matches!(self, Priority::Critical | Priority::High)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TypesError;

    /// Parses a band label case-insensitively, ignoring surrounding whitespace.
    fn from_str(s: &str) -> TypesResult<Self> {
        let label = s.trim();
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(label))
            .ok_or_else(|| TypesError::UnknownPriority(label.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_total_order() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Normal);
    }

    #[test]
    fn test_priority_parses_case_insensitively() {
        assert_eq!(" critical ".parse::<Priority>().expect("parse"), Priority::Critical);
        assert_eq!("High".parse::<Priority>().expect("parse"), Priority::High);
        let err = "URGENT".parse::<Priority>().expect_err("unknown band");
        assert_eq!(err, TypesError::UnknownPriority("URGENT".into()));
    }

    #[test]
    fn test_priority_serializes_upper_case() {
        let json = serde_json::to_string(&Priority::Medium).expect("serialize");
        assert_eq!(json, "\"MEDIUM\"");
    }

    #[test]
    fn test_only_top_bands_are_urgent() {
        assert!(Priority::Critical.is_urgent());
        assert!(Priority::High.is_urgent());
        assert!(!Priority::Medium.is_urgent());
        assert!(!Priority::Normal.is_urgent());
    }
}
