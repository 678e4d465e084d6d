use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    errors::{MigrateError, MigrateResult},
    source::RecordSource,
    types::SessionRecord,
};

/// Ordered in-memory session table.
///
/// Clones share the same table, so one handle can be streamed while another
/// mutates rows underneath it, the way a live database table behaves.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    rows: Arc<Mutex<BTreeMap<String, SessionRecord>>>,
    fail_on_page: Option<u64>,
    pages_served: u64,
    reclaims: u64,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = SessionRecord>,
    {
        let source = Self::new();
        for record in records {
            source.insert(record);
        }
        source
    }

    /// Makes the given 1-based page request fail with a read error.
    pub fn fail_on_page(mut self, page: u64) -> Self {
        self.fail_on_page = Some(page);
        self
    }

    pub fn insert(&self, record: SessionRecord) {
        self.rows().insert(record.key.clone(), record);
    }

    pub fn remove(&self, key: &str) -> Option<SessionRecord> {
        self.rows().remove(key)
    }

    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    pub fn pages_served(&self) -> u64 {
        self.pages_served
    }

    pub fn reclaims(&self) -> u64 {
        self.reclaims
    }

    fn rows(&self) -> MutexGuard<'_, BTreeMap<String, SessionRecord>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordSource for MemorySource {
    async fn count(&mut self) -> MigrateResult<u64> {
        Ok(self.len() as u64)
    }

    async fn page_after(&mut self, last_key: Option<&str>, limit: usize) -> MigrateResult<Vec<SessionRecord>> {
        let page_number = self.pages_served + 1;
        if self.fail_on_page == Some(page_number) {
            return Err(MigrateError::source_read(
                format!("page {page_number}"),
                "injected read failure",
            ));
        }
        self.pages_served = page_number;

        let lower = match last_key {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        let page = self
            .rows()
            .range::<str, _>((lower, Bound::Unbounded))
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect();
        Ok(page)
    }

    fn reclaim(&mut self) {
        self.reclaims += 1;
    }
}
