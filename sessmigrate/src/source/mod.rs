//! Paginated session sources.
//!
//! Sources hand out pages ordered by session key and resume strictly after
//! the last key seen, so rows deleted or expired on a live table while the
//! migration runs never shift the window the way offset paging would.

mod memory;
mod postgres;

pub use memory::MemorySource;
pub use postgres::{PostgresSource, TableName};

use std::collections::VecDeque;

use crate::{
    errors::{MigrateError, MigrateResult},
    types::SessionRecord,
};

/// Origin store of session records.
#[allow(async_fn_in_trait)]
pub trait RecordSource {
    /// Total number of records the migration is expected to see.
    async fn count(&mut self) -> MigrateResult<u64>;

    /// Up to `limit` records with keys strictly greater than `last_key`, in key order.
    async fn page_after(&mut self, last_key: Option<&str>, limit: usize) -> MigrateResult<Vec<SessionRecord>>;

    /// Drop anything buffered on the source side. Called once per chunk.
    fn reclaim(&mut self) {}
}

/// Single-pass, keyed walk over a [`RecordSource`].
pub struct SessionStream<'a, S>
where
    S: RecordSource,
{
    source: &'a mut S,
    page_size: usize,
    buffer: VecDeque<SessionRecord>,
    last_key: Option<String>,
    exhausted: bool,
    yielded: u64,
    pages: u64,
}

impl<'a, S> SessionStream<'a, S>
where
    S: RecordSource,
{
    pub fn new(source: &'a mut S, page_size: usize) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            buffer: VecDeque::new(),
            last_key: None,
            exhausted: false,
            yielded: 0,
            pages: 0,
        }
    }

    /// Next record in key order, or `None` once the source is exhausted.
    pub async fn next(&mut self) -> MigrateResult<Option<SessionRecord>> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fetch_page().await?;
        }

        let record = self.buffer.pop_front();
        if record.is_some() {
            self.yielded += 1;
        }
        Ok(record)
    }

    async fn fetch_page(&mut self) -> MigrateResult<()> {
        let page = self
            .source
            .page_after(self.last_key.as_deref(), self.page_size)
            .await?;
        self.pages += 1;

        if page.len() < self.page_size {
            self.exhausted = true;
        }

        let mut previous = self.last_key.as_deref();
        for record in &page {
            if previous.is_some_and(|prev| record.key.as_str() <= prev) {
                return Err(MigrateError::source_read(
                    format!("page {} is not ordered by key at {:?}", self.pages, record.key),
                    "keyed pagination requires strictly increasing keys",
                ));
            }
            previous = Some(record.key.as_str());
        }

        if let Some(last) = page.last() {
            self.last_key = Some(last.key.clone());
        }
        log::debug!("fetched page {} with {} record(s)", self.pages, page.len());
        self.buffer.extend(page);
        Ok(())
    }

    /// Release buffered capacity on both sides of the stream.
    pub fn reclaim(&mut self) {
        self.buffer.shrink_to_fit();
        self.source.reclaim();
    }

    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    pub fn pages(&self) -> u64 {
        self.pages
    }

    pub fn last_key(&self) -> Option<&str> {
        self.last_key.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, Utc};

    fn seeded(count: usize) -> MemorySource {
        let expire = Utc::now() + TimeDelta::hours(1);
        MemorySource::from_records((0..count).map(|i| SessionRecord::new(format!("key{i:03}"), b"data".to_vec(), expire)))
    }

    async fn drain<S: RecordSource>(stream: &mut SessionStream<'_, S>) -> Vec<String> {
        let mut keys = Vec::new();
        while let Some(record) = stream.next().await.expect("next") {
            keys.push(record.key);
        }
        keys
    }

    #[tokio::test]
    async fn walks_every_record_in_key_order() {
        let mut source = seeded(7);
        let mut stream = SessionStream::new(&mut source, 3);
        let keys = drain(&mut stream).await;

        assert_eq!(keys.len(), 7);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(stream.yielded(), 7);
        assert_eq!(stream.pages(), 3);
        assert_eq!(stream.last_key(), Some("key006"));
    }

    #[tokio::test]
    async fn mixed_case_and_punctuated_keys_stream_bytewise() {
        let expire = Utc::now() + TimeDelta::hours(1);
        let mut source = MemorySource::from_records(
            ["ab", "a-c", "A_b", "Zz", "a_c", "aB"]
                .into_iter()
                .map(|key| SessionRecord::new(key, Vec::new(), expire)),
        );
        let mut stream = SessionStream::new(&mut source, 2);

        let keys = drain(&mut stream).await;
        assert_eq!(keys, vec!["A_b", "Zz", "a-c", "aB", "a_c", "ab"]);
    }

    #[tokio::test]
    async fn out_of_order_page_is_rejected() {
        struct Shuffled;

        impl RecordSource for Shuffled {
            async fn count(&mut self) -> MigrateResult<u64> {
                Ok(2)
            }

            async fn page_after(&mut self, _last_key: Option<&str>, _limit: usize) -> MigrateResult<Vec<SessionRecord>> {
                let expire = Utc::now();
                Ok(vec![
                    SessionRecord::new("ab", Vec::new(), expire),
                    SessionRecord::new("a-c", Vec::new(), expire),
                ])
            }
        }

        let mut source = Shuffled;
        let mut stream = SessionStream::new(&mut source, 10);
        let err = stream.next().await.expect_err("unordered page");
        assert!(matches!(err, MigrateError::SourceRead { .. }));
    }

    #[tokio::test]
    async fn exact_page_multiple_needs_one_empty_probe() {
        let mut source = seeded(6);
        let mut stream = SessionStream::new(&mut source, 3);
        assert_eq!(drain(&mut stream).await.len(), 6);
        assert_eq!(stream.pages(), 3);
    }

    #[tokio::test]
    async fn empty_source_ends_immediately() {
        let mut source = MemorySource::new();
        let mut stream = SessionStream::new(&mut source, 10);
        assert!(stream.next().await.expect("next").is_none());
        assert!(stream.next().await.expect("next").is_none());
        assert_eq!(stream.pages(), 1);
    }

    #[tokio::test]
    async fn deletions_behind_the_cursor_do_not_skip_rows() {
        let mut source = seeded(6);
        let handle = source.clone();
        let mut stream = SessionStream::new(&mut source, 2);

        let first = stream.next().await.expect("next").expect("record");
        let second = stream.next().await.expect("next").expect("record");
        handle.remove(&first.key);
        handle.remove(&second.key);

        let rest = drain(&mut stream).await;
        assert_eq!(rest, vec!["key002", "key003", "key004", "key005"]);
    }

    #[tokio::test]
    async fn read_failure_aborts_the_stream() {
        let mut source = seeded(5).fail_on_page(2);
        let mut stream = SessionStream::new(&mut source, 2);
        stream.next().await.expect("first page");
        stream.next().await.expect("first page");

        let err = stream.next().await.expect_err("second page fails");
        assert!(matches!(err, MigrateError::SourceRead { .. }));
    }

    #[tokio::test]
    async fn reclaim_reaches_the_source() {
        let mut source = seeded(2);
        {
            let mut stream = SessionStream::new(&mut source, 2);
            stream.next().await.expect("next");
            stream.reclaim();
            stream.reclaim();
        }
        assert_eq!(source.reclaims(), 2);
    }
}
