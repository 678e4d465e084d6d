use std::mem;

use crate::{
    errors::MigrateResult,
    keys::KeyContext,
    runtime::{commands::WriteBatch, executor::BatchExecutor},
    ttl::Ttl,
};

/// Accumulates session writes and submits them one chunk at a time.
///
/// Pending entries never exceed `capacity`; reaching it forces a flush before
/// the next entry is accepted.
pub struct BatchWriter<'a, E>
where
    E: BatchExecutor,
{
    executor: &'a mut E,
    keys: KeyContext,
    capacity: usize,
    pending: WriteBatch,
    pending_entries: usize,
    flushes: u64,
    written: u64,
}

impl<'a, E> BatchWriter<'a, E>
where
    E: BatchExecutor,
{
    pub fn new(executor: &'a mut E, keys: KeyContext, capacity: usize) -> Self {
        Self {
            executor,
            keys,
            capacity: capacity.max(1),
            pending: WriteBatch::new(1),
            pending_entries: 0,
            flushes: 0,
            written: 0,
        }
    }

    /// Queues `SET key payload` followed by `EXPIRE key ttl`.
    pub async fn enqueue(&mut self, session_key: &str, payload: Vec<u8>, ttl: Ttl) -> MigrateResult<()> {
        if self.pending_entries >= self.capacity {
            self.flush().await?;
        }
        let key = self.keys.session(session_key);
        self.pending.push_entry(key, payload, ttl);
        self.pending_entries += 1;
        Ok(())
    }

    /// Submits everything pending as one round trip. Called once per chunk,
    /// including chunks whose records were all skipped.
    pub async fn flush(&mut self) -> MigrateResult<()> {
        let next = WriteBatch::new(self.flushes + 2);
        let batch = mem::replace(&mut self.pending, next);
        let entries = mem::take(&mut self.pending_entries);

        self.executor.execute(&batch).await?;
        self.flushes += 1;
        self.written += entries as u64;
        log::debug!(
            "flushed chunk {} ({} session(s), {} operation(s))",
            batch.chunk,
            entries,
            batch.operations()
        );
        Ok(())
    }

    /// Flushes any remainder and returns the number of completed flushes.
    pub async fn close(mut self) -> MigrateResult<u64> {
        if self.pending_entries > 0 {
            self.flush().await?;
        }
        Ok(self.flushes)
    }

    pub fn pending(&self) -> usize {
        self.pending_entries
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}
