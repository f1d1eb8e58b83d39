//! Activity Log
//!
//! Append-only history of friend events: a capped ring of fixed-shape
//! entries, newest first, persisted to durable local storage on every
//! write. Filtering helpers are provided for the presentation layer;
//! rendering itself is out of scope.

use std::collections::VecDeque;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Maximum retained entries; the oldest beyond this are dropped.
pub const LOG_CAPACITY: usize = 500;

// =============================================================================
// Entry Types
// =============================================================================

/// Coarse entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogKind {
    /// Friend came online.
    Online,
    /// Friend went offline.
    Offline,
    /// Friend moved to another world/instance.
    LocationChange,
    /// Friend changed their status value.
    StatusChange,
    /// Friend changed their status message.
    StatusMessageChange,
}

/// One log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Monotonically increasing id within this log.
    pub id: u64,
    /// When the event was observed.
    pub at: DateTime<Utc>,
    /// Entry type.
    pub kind: LogKind,
    /// Subject display name.
    pub subject: String,
    /// Short human-readable detail, e.g. `The Garden → Midnight Rooftop`.
    pub detail: String,
}

impl LogEntry {
    /// Timestamp formatted in the viewer's local time.
    #[must_use]
    pub fn formatted_timestamp(&self) -> String {
        self.at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}

// =============================================================================
// Activity Log
// =============================================================================

/// Capped, newest-first event history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityLog {
    entries: VecDeque<LogEntry>,
    next_id: u64,
}

impl ActivityLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend one entry, dropping the oldest beyond [`LOG_CAPACITY`].
    pub fn push(&mut self, kind: LogKind, subject: impl Into<String>, detail: impl Into<String>) {
        self.push_at(kind, subject, detail, Utc::now());
    }

    /// Prepend one entry with an explicit timestamp.
    pub fn push_at(
        &mut self,
        kind: LogKind,
        subject: impl Into<String>,
        detail: impl Into<String>,
        at: DateTime<Utc>,
    ) {
        let entry = LogEntry {
            id: self.next_id,
            at,
            kind,
            subject: subject.into(),
            detail: detail.into(),
        };
        self.next_id += 1;
        self.entries.push_front(entry);
        self.entries.truncate(LOG_CAPACITY);
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Filter by kind and/or case-insensitive substring of subject+detail.
    pub fn filter<'a>(
        &'a self,
        kind: Option<LogKind>,
        query: &'a str,
    ) -> impl Iterator<Item = &'a LogEntry> {
        let needle = query.to_lowercase();
        self.entries.iter().filter(move |entry| {
            kind.is_none_or(|k| entry.kind == k)
                && (needle.is_empty()
                    || entry.subject.to_lowercase().contains(&needle)
                    || entry.detail.to_lowercase().contains(&needle))
        })
    }
}
