use redis::aio::ConnectionLike;

use crate::{
    errors::MigrateError,
    runtime::commands::{WriteBatch, WriteCommand},
};

/// Submits one [`WriteBatch`] to the destination store as a single round trip.
#[allow(async_fn_in_trait)]
pub trait BatchExecutor {
    async fn execute(&mut self, batch: &WriteBatch) -> Result<(), MigrateError>;
}

/// Builds the non-transactional pipeline for a batch.
pub fn build_pipeline(batch: &WriteBatch) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    for command in &batch.commands {
        match command {
            WriteCommand::Set { key, payload } => {
                pipe.set(key, payload.as_slice()).ignore();
            }
            WriteCommand::Expire { key, ttl } => {
                let secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
                pipe.expire(key, secs).ignore();
            }
        }
    }
    pipe
}

pub async fn execute_batch<C>(conn: &mut C, batch: &WriteBatch) -> Result<(), MigrateError>
where
    C: ConnectionLike + Send,
{
    if batch.is_empty() {
        return Ok(());
    }

    let pipe = build_pipeline(batch);
    let _: () = pipe.query_async(conn).await.map_err(|source| MigrateError::WriteFlush {
        chunk: batch.chunk,
        operations: batch.operations(),
        source,
    })?;
    Ok(())
}

/// Executor writing to a standalone Redis (or a proxy in front of a cluster).
///
/// The whole batch goes down one connection and the anchor is not consulted,
/// so a Redis Cluster reached directly is not supported: keys of one chunk
/// hash to many slots and the node would answer `MOVED`.
pub struct RedisExecutor<'a, C>
where
    C: ConnectionLike + Send,
{
    connection: &'a mut C,
}

impl<'a, C> RedisExecutor<'a, C>
where
    C: ConnectionLike + Send,
{
    pub fn new(connection: &'a mut C) -> Self {
        Self { connection }
    }
}

impl<'a, C> BatchExecutor for RedisExecutor<'a, C>
where
    C: ConnectionLike + Send,
{
    async fn execute(&mut self, batch: &WriteBatch) -> Result<(), MigrateError> {
        execute_batch(self.connection, batch).await
    }
}

/// Counts what would have been written without touching the destination.
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    pub batches: u64,
    pub entries: u64,
    pub operations: u64,
    /// Anchor key of every non-empty batch, in flush order.
    pub anchors: Vec<String>,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BatchExecutor for DryRunExecutor {
    async fn execute(&mut self, batch: &WriteBatch) -> Result<(), MigrateError> {
        self.batches += 1;
        self.entries += batch.entries() as u64;
        self.operations += batch.operations() as u64;
        if let Some(anchor) = &batch.anchor {
            self.anchors.push(anchor.clone());
        }
        log::debug!(
            "dry run: chunk {} would write {} operation(s) anchored at {:?}",
            batch.chunk,
            batch.operations(),
            batch.anchor
        );
        Ok(())
    }
}
