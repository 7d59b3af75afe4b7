//! Current-queue batch wire model and translation.
//!
//! The batch is a full replacement snapshot. Schema mismatches and unreadable
//! measurements fail the whole batch so that a partial list is never mistaken for
//! "these patients left the queue". Display-only gaps (no patient identifier, an
//! unreadable `entered_at`) keep the entry and log a warning.

use crate::measurement::Measurement;
use crate::patient_record::{non_blank, PatientWire};
use crate::{parse_with_path, WireResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use queue_types::{EntryId, Priority, QueueEntry, VitalsSnapshot};
use serde::Deserialize;

/// Current-queue operations.
///
/// Zero-sized namespace; all methods are associated functions.
pub struct CurrentQueue;

impl CurrentQueue {
    /// Parse the body of `GET /queue/current_queue/` into domain entries.
    ///
    /// Entries are returned in fetch order; no ordering is applied here.
    ///
    /// # Errors
    ///
    /// Returns [`crate::WireError::Translation`] if:
    /// - the body is not a JSON array of queue entries,
    /// - any field has an unexpected type (the message names its path),
    /// - a measurement cannot be interpreted.
    pub fn parse(json_text: &str) -> WireResult<Vec<QueueEntry>> {
        let wire: Vec<QueueEntryWire> = parse_with_path(json_text, "Queue batch")?;
        wire.into_iter().map(wire_to_domain).collect()
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize)]
struct QueueEntryWire {
    id: u64,
    #[serde(default)]
    patient: Option<PatientWire>,
    #[serde(default, alias = "vitals")]
    latest_vitals: Option<VitalsWire>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    entered_at: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct VitalsWire {
    #[serde(default)]
    height: Option<Measurement>,
    #[serde(default)]
    weight: Option<Measurement>,
    #[serde(default, alias = "pulse_rate")]
    heart_rate: Option<Measurement>,
    #[serde(default)]
    blood_pressure: Option<String>,
    #[serde(default)]
    temperature: Option<Measurement>,
    #[serde(default)]
    oxygen_saturation: Option<Measurement>,
    #[serde(default)]
    bmi: Option<Measurement>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn wire_to_domain(wire: QueueEntryWire) -> WireResult<QueueEntry> {
    let id = EntryId::new(wire.id);
    let context = |field: &str| format!("entry {id}: {field}");

    let patient = wire.patient.map(PatientWire::into_reference);

    let vitals = match wire.latest_vitals {
        Some(v) => VitalsSnapshot {
            height_cm: Measurement::decimal(v.height, &context("height"))?,
            weight_kg: Measurement::decimal(v.weight, &context("weight"))?,
            heart_rate_bpm: Measurement::count(v.heart_rate, &context("heart_rate"))?,
            blood_pressure: non_blank(v.blood_pressure),
            temperature_c: Measurement::decimal(v.temperature, &context("temperature"))?,
            oxygen_saturation_pct: Measurement::count(
                v.oxygen_saturation,
                &context("oxygen_saturation"),
            )?,
            bmi: Measurement::decimal(v.bmi, &context("bmi"))?,
        },
        None => VitalsSnapshot::default(),
    };

    let priority = non_blank(wire.priority).and_then(|label| match label.parse::<Priority>() {
        Ok(priority) => Some(priority),
        Err(e) => {
            tracing::warn!(entry_id = %id, error = %e, "treating unknown priority as unset");
            None
        }
    });

    let entered_at = non_blank(wire.entered_at).and_then(|raw| {
        let parsed = parse_timestamp(&raw);
        if parsed.is_none() {
            tracing::warn!(entry_id = %id, value = %raw, "ignoring unparseable entered_at");
        }
        parsed
    });

    Ok(QueueEntry {
        id,
        patient,
        vitals,
        priority,
        entered_at,
    })
}

/// RFC 3339, or a naive ISO-8601 timestamp taken as UTC (the backend omits the
/// offset when it runs without time zone support).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}
