//! Bounded newest-first event log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Fixed-capacity buffer holding the most recent entries, newest first.
///
/// Every push evicts from the old end once the buffer is full; nothing is
/// ever edited in place.
#[derive(Debug, Clone)]
pub struct BoundedLog<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedLog<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert at the head and drop whatever falls past the capacity.
    pub fn push(&mut self, entry: T) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    /// Entries from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}

/// Kind of entry in the network event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEventType {
    Ping,
    StatusChange,
    Flapping,
    Alert,
    Info,
}

/// One externally visible monitor event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkLogEntry {
    pub id: String,
    pub target_id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: LogEventType,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
}
