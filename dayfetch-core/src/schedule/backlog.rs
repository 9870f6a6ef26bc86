//! In-memory queue of deferred download requests.

use chrono::NaiveDate;
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacklogEntry {
    Single { date: NaiveDate },
    Range { start: NaiveDate, end: NaiveDate },
}

impl fmt::Display for BacklogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BacklogEntry::Single { date } => write!(f, "{date}"),
            BacklogEntry::Range { start, end } => write!(f, "{start}..={end}"),
        }
    }
}

/// Insertion-ordered backlog. Holds each entry at most once.
///
/// Owned by whoever drives the scheduler and threaded through each trigger;
/// nothing persists it across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Backlog {
    entries: VecDeque<BacklogEntry>,
}

impl Backlog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `entry` unless an identical one is already queued.
    /// Returns whether it was added.
    pub fn push(&mut self, entry: BacklogEntry) -> bool {
        if self.entries.contains(&entry) {
            return false;
        }
        self.entries.push_back(entry);
        true
    }

    pub fn contains(&self, entry: &BacklogEntry) -> bool {
        self.entries.contains(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BacklogEntry> {
        self.entries.iter()
    }
}

impl IntoIterator for Backlog {
    type Item = BacklogEntry;
    type IntoIter = std::collections::vec_deque::IntoIter<BacklogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
