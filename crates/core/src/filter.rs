//! Free-text query over the reconciled view.

use crate::view::{QueueRow, QueueView};

/// Rows whose display number, patient identifier, name or blood pressure contains
/// `query`, ignoring case and surrounding whitespace. A blank query returns every row.
///
/// Numbers are taken from the full ordering, so they match what is shown elsewhere.
pub fn filter_rows(view: &QueueView, query: &str) -> Vec<QueueRow> {
    let needle = query.trim().to_lowercase();
    view.entries
        .iter()
        .enumerate()
        .map(|(index, entry)| view.row_at(index, entry))
        .filter(|row| needle.is_empty() || row_matches(row, &needle))
        .collect()
}

fn row_matches(row: &QueueRow, needle: &str) -> bool {
    let entry = &row.entry;
    let number = row.number.to_string();
    let name = entry.display_name();
    let identifier = entry.patient.as_ref().map(|p| p.identifier.as_str());
    let blood_pressure = entry.vitals.blood_pressure.as_deref();

    let fields = [Some(number.as_str()), identifier, Some(name.as_str()), blood_pressure];
    let matched = fields
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle));
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::reconcile;
    use queue_types::{EntryId, Patient, Priority, QueueEntry, VitalsSnapshot};

    fn entry(id: u64, priority: Priority, name: (&str, &str), bp: Option<&str>) -> QueueEntry {
        QueueEntry::new(EntryId::new(id))
            .with_priority(priority)
            .with_patient(Patient::new(format!("PX-{}", id * 111), name.0, name.1))
            .with_vitals(VitalsSnapshot {
                blood_pressure: bp.map(str::to_owned),
                ..VitalsSnapshot::default()
            })
    }

    fn view() -> QueueView {
        reconcile(
            None,
            vec![
                entry(1, Priority::Normal, ("Ana", "Reyes"), Some("120/80")),
                entry(2, Priority::Critical, ("Ben", "Cruz"), Some("180/120")),
                entry(3, Priority::High, ("Carla", "Santos"), Some("120/80")),
                entry(4, Priority::Medium, ("Dan", "Reyes"), None),
            ],
        )
    }

    fn ids(rows: &[QueueRow]) -> Vec<u64> {
        rows.iter().map(|r| r.entry.id.get()).collect()
    }

    #[test]
    fn test_blood_pressure_query_keeps_display_order() {
        let rows = filter_rows(&view(), "120/80");
        assert_eq!(ids(&rows), vec![3, 1]);
        // Numbers come from the full ordering: Carla is second, Ana fourth.
        assert_eq!(rows[0].number.to_string(), "002");
        assert_eq!(rows[1].number.to_string(), "004");
    }

    #[test]
    fn test_name_query_is_case_insensitive() {
        let rows = filter_rows(&view(), "  reyes ");
        assert_eq!(ids(&rows), vec![4, 1]);
    }

    #[test]
    fn test_identifier_and_number_queries() {
        assert_eq!(ids(&filter_rows(&view(), "px-333")), vec![3]);
        assert_eq!(ids(&filter_rows(&view(), "001")), vec![2]);
    }

    #[test]
    fn test_blank_query_returns_everything() {
        assert_eq!(ids(&filter_rows(&view(), "   ")), vec![2, 3, 4, 1]);
    }

    #[test]
    fn test_missing_blood_pressure_does_not_match_placeholder() {
        assert!(filter_rows(&view(), "—").is_empty());
    }

    #[test]
    fn test_entry_without_patient_matches_by_number() {
        let view = reconcile(
            None,
            vec![
                entry(1, Priority::High, ("Ana", "Reyes"), None),
                QueueEntry::new(EntryId::new(2)),
            ],
        );
        assert_eq!(ids(&filter_rows(&view, "002")), vec![2]);
        assert_eq!(ids(&filter_rows(&view, "unknown")), vec![2]);
    }

    #[test]
    fn test_filter_marks_serving_row() {
        let rows = filter_rows(&view(), "ben");
        assert_eq!(rows.len(), 1);
        assert!(rows[0].serving);
    }
}
