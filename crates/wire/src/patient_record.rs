//! Patient record wire model.
//!
//! The registry serializer emits more fields than the queue needs (PIN, middle name,
//! database keys, ...). Unknown keys are therefore ignored rather than rejected.

use crate::{parse_with_path, WireError, WireResult};
use chrono::NaiveDate;
use queue_types::Patient;
use serde::Deserialize;

/// Patient record operations.
///
/// Zero-sized namespace for patient record parsing.
pub struct PatientRecord;

impl PatientRecord {
    /// Parse a single patient record, as returned by `GET /patients/{identifier}/`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Translation`] if the JSON does not match the record schema or
    /// the record carries no identifier.
    pub fn parse(json_text: &str) -> WireResult<Patient> {
        let wire: PatientWire = parse_with_path(json_text, "Patient record")?;
        wire.into_domain()
    }
}

/// Wire representation of a patient, shared with the queue batch.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct PatientWire {
    #[serde(alias = "identifier")]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default, alias = "contact")]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, alias = "birthdate")]
    pub date_of_birth: Option<String>,
}

impl PatientWire {
    /// Convert to the domain reference copy.
    ///
    /// An unparseable date of birth is dropped rather than failing the record: it is
    /// display-only and must not take the queue down with it.
    pub(crate) fn into_domain(self) -> WireResult<Patient> {
        if non_blank(self.patient_id.clone()).is_none() {
            return Err(WireError::Translation(
                "patient record has no patient_id".to_string(),
            ));
        }
        Ok(self.into_reference())
    }

    /// Convert a patient embedded in a queue entry.
    ///
    /// A missing identifier is kept as an empty string so the entry still shows up.
    pub(crate) fn into_reference(self) -> Patient {
        let identifier = non_blank(self.patient_id).unwrap_or_default();

        let birthdate = non_blank(self.date_of_birth).and_then(|raw| {
            let parsed = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok();
            if parsed.is_none() {
                tracing::warn!(patient_id = %identifier, value = %raw, "ignoring unparseable date_of_birth");
            }
            parsed
        });

        Patient {
            identifier,
            first_name: self.first_name.unwrap_or_default().trim().to_string(),
            last_name: self.last_name.unwrap_or_default().trim().to_string(),
            sex: non_blank(self.sex),
            contact: non_blank(self.contact_number),
            address: non_blank(self.address),
            birthdate,
        }
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_patient_record() {
        let input = r#"{
            "id": 12,
            "patient_id": "2025-0007",
            "first_name": "Liza",
            "middle_name": "M",
            "last_name": "Soberano",
            "sex": "Female",
            "address": "Quezon City",
            "contact_number": "09171234567",
            "date_of_birth": "1998-01-04",
            "pin": "1234"
        }"#;

        let patient = PatientRecord::parse(input).expect("parse patient");
        assert_eq!(patient.identifier, "2025-0007");
        assert_eq!(patient.display_name(), "LIZA SOBERANO");
        assert_eq!(patient.contact.as_deref(), Some("09171234567"));
        assert_eq!(
            patient.birthdate,
            NaiveDate::from_ymd_opt(1998, 1, 4)
        );
    }

    #[test]
    fn accepts_spec_field_names() {
        let input = r#"{"identifier": "P-1", "first_name": "A", "last_name": "B",
            "contact": "0917", "birthdate": "2000-02-29"}"#;
        let patient = PatientRecord::parse(input).expect("parse aliases");
        assert_eq!(patient.identifier, "P-1");
        assert_eq!(patient.contact.as_deref(), Some("0917"));
        assert!(patient.birthdate.is_some());
    }

    #[test]
    fn drops_unparseable_birthdate() {
        let input = r#"{"patient_id": "P-1", "date_of_birth": "04/01/1998"}"#;
        let patient = PatientRecord::parse(input).expect("parse");
        assert_eq!(patient.birthdate, None);
    }

    #[test]
    fn rejects_record_without_identifier() {
        let err = PatientRecord::parse(r#"{"first_name": "A"}"#).expect_err("no id");
        assert!(matches!(err, WireError::Translation(msg) if msg.contains("patient_id")));
    }

    #[test]
    fn reports_path_of_wrong_type() {
        let err = PatientRecord::parse(r#"{"patient_id": "P-1", "first_name": 7}"#)
            .expect_err("wrong type");
        assert!(matches!(err, WireError::Translation(msg) if msg.contains("first_name")));
    }
}
