//! Deterministic queue ordering.
//!
//! Priority descending, then enrollment time ascending. Entries without a timestamp sort
//! last within their band. Remaining ties keep fetch order: the sort must be stable or
//! display numbers jitter between identical refreshes.

use queue_types::QueueEntry;
use std::cmp::Ordering;

/// Sort `entries` into display order. Stable.
pub fn order_entries(mut entries: Vec<QueueEntry>) -> Vec<QueueEntry> {
    // slice::sort_by is a stable merge sort; sort_unstable_by must not be used here.
    entries.sort_by(compare_entries);
    entries
}

/// Comparator behind [`order_entries`].
pub fn compare_entries(a: &QueueEntry, b: &QueueEntry) -> Ordering {
    b.effective_priority()
        .cmp(&a.effective_priority())
        .then_with(|| match (a.entered_at, b.entered_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}
