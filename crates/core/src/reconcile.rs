//! Refresh merge.
//!
//! Each snapshot fully replaces the local ordering. Only the serving pointer carries over,
//! and only by identity: if the previously served id is still present it stays served
//! wherever it moved to; otherwise serving falls through to the head of the new order.

use crate::ordering::order_entries;
use crate::view::QueueView;
use queue_types::{EntryId, QueueEntry};
use std::collections::HashSet;

/// Build the view for `batch`, carrying `previous_serving` across if it survived.
///
/// Duplicate ids in the batch keep their first occurrence.
pub fn reconcile(previous_serving: Option<EntryId>, batch: Vec<QueueEntry>) -> QueueView {
    let entries = order_entries(dedupe(batch));
    let serving = previous_serving
        .filter(|id| entries.iter().any(|e| e.id == *id))
        .or_else(|| entries.first().map(|e| e.id));

    QueueView { entries, serving }
}

impl QueueView {
    /// The view with `id` removed, re-deriving the serving pointer.
    pub(crate) fn without(&self, id: EntryId) -> QueueView {
        let remaining = self
            .entries
            .iter()
            .filter(|e| e.id != id)
            .cloned()
            .collect();
        reconcile(self.serving, remaining)
    }
}

fn dedupe(batch: Vec<QueueEntry>) -> Vec<QueueEntry> {
    let mut seen = HashSet::with_capacity(batch.len());
    batch
        .into_iter()
        .filter(|entry| {
            let fresh = seen.insert(entry.id);
            if !fresh {
                tracing::warn!(entry_id = %entry.id, "dropping duplicate queue entry from snapshot");
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use queue_types::Priority;

    fn entry(id: u64, priority: Priority, minute: u32) -> QueueEntry {
        QueueEntry::new(EntryId::new(id))
            .with_priority(priority)
            .with_entered_at(Utc.with_ymd_and_hms(2025, 3, 1, 8, minute, 0).unwrap())
    }

    fn ids(view: &QueueView) -> Vec<u64> {
        view.entries().iter().map(|e| e.id.get()).collect()
    }

    const A: u64 = 1;
    const B: u64 = 2;
    const C: u64 = 3;
    const D: u64 = 4;

    #[test]
    fn test_initial_serving_is_head_of_order() {
        let view = reconcile(
            None,
            vec![
                entry(A, Priority::Normal, 1),
                entry(B, Priority::Critical, 2),
                entry(C, Priority::High, 3),
            ],
        );
        assert_eq!(ids(&view), vec![B, C, A]);
        assert_eq!(view.serving_id(), Some(EntryId::new(B)));
    }

    #[test]
    fn test_serving_falls_through_when_removed_upstream() {
        let view = reconcile(
            Some(EntryId::new(B)),
            vec![
                entry(C, Priority::High, 3),
                entry(A, Priority::Normal, 1),
                entry(D, Priority::High, 4),
            ],
        );
        assert_eq!(ids(&view), vec![C, D, A]);
        assert_eq!(view.serving_id(), Some(EntryId::new(C)));
    }

    #[test]
    fn test_serving_survives_reorder() {
        let first = reconcile(
            None,
            vec![entry(A, Priority::High, 1), entry(B, Priority::Normal, 2)],
        );
        assert_eq!(first.serving_id(), Some(EntryId::new(A)));

        // B is escalated and overtakes A; A is still being served.
        let second = reconcile(
            first.serving_id(),
            vec![entry(A, Priority::High, 1), entry(B, Priority::Critical, 2)],
        );
        assert_eq!(ids(&second), vec![B, A]);
        assert_eq!(second.serving_id(), Some(EntryId::new(A)));
        assert_eq!(second.current().map(|r| r.number.get()), Some(2));
    }

    #[test]
    fn test_empty_snapshot_clears_serving() {
        let view = reconcile(Some(EntryId::new(A)), Vec::new());
        assert!(view.is_empty());
        assert_eq!(view.serving_id(), None);
    }

    #[test]
    fn test_reconcile_is_stable() {
        let batch = vec![
            entry(A, Priority::Medium, 1),
            entry(B, Priority::Medium, 1),
            entry(C, Priority::Critical, 5),
        ];
        let first = reconcile(None, batch.clone());
        let second = reconcile(first.serving_id(), batch);
        assert_eq!(first, second);
    }

    #[test]
    fn test_duplicate_ids_keep_first_occurrence() {
        let view = reconcile(
            None,
            vec![
                entry(A, Priority::Normal, 1),
                entry(A, Priority::Critical, 2),
                entry(B, Priority::High, 3),
            ],
        );
        assert_eq!(ids(&view), vec![B, A]);
        assert_eq!(view.entries()[1].priority, Some(Priority::Normal));
    }

    #[test]
    fn test_without_rederives_serving() {
        let view = reconcile(
            None,
            vec![entry(A, Priority::High, 1), entry(B, Priority::Normal, 2)],
        );
        let after = view.without(EntryId::new(A));
        assert_eq!(ids(&after), vec![B]);
        assert_eq!(after.serving_id(), Some(EntryId::new(B)));

        // Removing a non-serving entry leaves the pointer alone.
        let after = view.without(EntryId::new(B));
        assert_eq!(after.serving_id(), Some(EntryId::new(A)));
    }
}
