//! The reconciled queue view and its read model.
//!
//! A [`QueueView`] can only be built by reconciliation, which guarantees that the serving
//! id, when present, names an entry in the view. Display numbers are derived from position
//! on every read and are never stored.

use crate::constants::DISPLAY_NUMBER_WIDTH;
use crate::filter::filter_rows;
use chrono::{DateTime, Utc};
use queue_types::{EntryId, QueueEntry, VitalsDisplay};
use serde::Serialize;
use std::fmt;

/// 1-based position in the current ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DisplayNumber(usize);

impl DisplayNumber {
    /// Display number of the entry at zero-based `index`.
    pub fn from_index(index: usize) -> Self {
        Self(index + 1)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for DisplayNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.0, width = DISPLAY_NUMBER_WIDTH)
    }
}

impl Serialize for DisplayNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Ordered entries plus the serving pointer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueView {
    pub(crate) entries: Vec<QueueEntry>,
    pub(crate) serving: Option<EntryId>,
}

impl QueueView {
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn serving_id(&self) -> Option<EntryId> {
        self.serving
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.position_of(id).is_some()
    }

    /// Zero-based position of `id` in the current ordering.
    pub fn position_of(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    /// Every entry with its display number, in order.
    pub fn rows(&self) -> Vec<QueueRow> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| self.row_at(index, entry))
            .collect()
    }

    /// Row for `id`, numbered by its current position.
    pub fn row_for(&self, id: EntryId) -> Option<QueueRow> {
        let index = self.position_of(id)?;
        Some(self.row_at(index, &self.entries[index]))
    }

    /// The entry currently being served.
    pub fn current(&self) -> Option<QueueRow> {
        self.row_for(self.serving?)
    }

    /// Case-insensitive substring search over number, identifier, name and blood pressure.
    pub fn filter(&self, query: &str) -> Vec<QueueRow> {
        filter_rows(self, query)
    }

    pub(crate) fn row_at(&self, index: usize, entry: &QueueEntry) -> QueueRow {
        QueueRow {
            number: DisplayNumber::from_index(index),
            serving: self.serving == Some(entry.id),
            entry: entry.clone(),
        }
    }
}

/// One entry as displayed: its number, whether it is being served, and the entry itself.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRow {
    pub number: DisplayNumber,
    pub serving: bool,
    pub entry: QueueEntry,
}

impl QueueRow {
    pub fn vitals(&self) -> VitalsDisplay {
        self.entry.vitals.display()
    }
}

/// Point-in-time copy of the controller's view with freshness information.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueSnapshot {
    pub view: QueueView,
    /// When the view was last reconciled from a successful fetch.
    pub refreshed_at: Option<DateTime<Utc>>,
    /// True after a failed refresh, until the next successful one.
    pub stale: bool,
}

impl QueueSnapshot {
    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    pub fn rows(&self) -> Vec<QueueRow> {
        self.view.rows()
    }

    pub fn current(&self) -> Option<QueueRow> {
        self.view.current()
    }

    pub fn filter(&self, query: &str) -> Vec<QueueRow> {
        self.view.filter(query)
    }
}
