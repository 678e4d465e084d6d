#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};
use sessmigrate::{
    BatchExecutor, MemorySource, MigrateError, MigrateResult, RecordSource, SessionRecord,
    redis::{ErrorKind, RedisError},
    runtime::commands::{WriteBatch, WriteCommand},
};

pub fn fixed_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
        .expect("timestamp")
        .with_timezone(&Utc)
}

pub fn record(key: &str, expires_in_secs: i64) -> SessionRecord {
    SessionRecord::new(
        key,
        format!("payload-{key}").into_bytes(),
        fixed_now() + TimeDelta::seconds(expires_in_secs),
    )
}

/// `count` sessions named `s000000..`, all valid for an hour.
pub fn live_sessions(count: usize) -> MemorySource {
    MemorySource::from_records((0..count).map(|i| record(&format!("s{i:06}"), 3_600)))
}

/// What a destination holds for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub payload: Vec<u8>,
    pub ttl_secs: Option<u64>,
}

/// In-memory destination applying batches the way Redis would, optionally
/// failing a given 1-based flush before anything of it is applied.
#[derive(Clone, Default)]
pub struct MemoryStore {
    pub data: Arc<Mutex<HashMap<String, StoredValue>>>,
    pub batches: Vec<BatchSummary>,
    pub fail_on_flush: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub chunk: u64,
    pub anchor: Option<String>,
    pub entries: usize,
    pub operations: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(flush: usize) -> Self {
        Self {
            fail_on_flush: Some(flush),
            ..Self::default()
        }
    }

    /// Fresh executor writing into the same data.
    pub fn sharing(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> HashMap<String, StoredValue> {
        self.data.lock().expect("store lock").clone()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.snapshot().into_keys().collect();
        keys.sort();
        keys
    }
}

impl BatchExecutor for MemoryStore {
    async fn execute(&mut self, batch: &WriteBatch) -> Result<(), MigrateError> {
        self.batches.push(BatchSummary {
            chunk: batch.chunk,
            anchor: batch.anchor.clone(),
            entries: batch.entries(),
            operations: batch.operations(),
        });

        if self.fail_on_flush == Some(self.batches.len()) {
            return Err(MigrateError::WriteFlush {
                chunk: batch.chunk,
                operations: batch.operations(),
                source: RedisError::from((ErrorKind::IoError, "connection reset by peer")),
            });
        }

        let mut data = self.data.lock().expect("store lock");
        for command in &batch.commands {
            match command {
                WriteCommand::Set { key, payload } => {
                    data.insert(
                        key.clone(),
                        StoredValue {
                            payload: payload.clone(),
                            ttl_secs: None,
                        },
                    );
                }
                WriteCommand::Expire { key, ttl } => {
                    if let Some(value) = data.get_mut(key) {
                        value.ttl_secs = Some(ttl.as_secs());
                    }
                }
            }
        }
        Ok(())
    }
}

/// Deletes the given keys from the table right after the first page is served.
pub struct DeletingSource {
    pub inner: MemorySource,
    pub handle: MemorySource,
    pub delete_after_first_page: Vec<String>,
    pub pages: u64,
}

impl DeletingSource {
    pub fn new(inner: MemorySource, delete_after_first_page: Vec<String>) -> Self {
        let handle = inner.clone();
        Self {
            inner,
            handle,
            delete_after_first_page,
            pages: 0,
        }
    }
}

impl RecordSource for DeletingSource {
    async fn count(&mut self) -> MigrateResult<u64> {
        self.inner.count().await
    }

    async fn page_after(&mut self, last_key: Option<&str>, limit: usize) -> MigrateResult<Vec<SessionRecord>> {
        let page = self.inner.page_after(last_key, limit).await?;
        self.pages += 1;
        if self.pages == 1 {
            for key in &self.delete_after_first_page {
                self.handle.remove(key);
            }
        }
        Ok(page)
    }
}
