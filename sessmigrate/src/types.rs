use std::time::Instant;

use chrono::{DateTime, Utc};

/// A single session row read from the origin store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub key: String,
    pub payload: Vec<u8>,
    pub expire_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(key: impl Into<String>, payload: impl Into<Vec<u8>>, expire_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
            expire_at,
        }
    }
}

/// Counters for one migration run. Only ever moves forward.
#[derive(Debug, Clone)]
pub struct RunState {
    pub total: u64,
    pub processed: u64,
    pub skipped: u64,
    pub started_at: Instant,
}

impl RunState {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            processed: 0,
            skipped: 0,
            started_at: Instant::now(),
        }
    }

    /// Records seen so far, written or skipped.
    pub fn seen(&self) -> u64 {
        self.processed + self.skipped
    }

    pub fn is_complete(&self) -> bool {
        self.seen() >= self.total
    }
}
