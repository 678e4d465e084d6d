//! Single-pass migration of sessions from a [`RecordSource`] into a [`BatchExecutor`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    errors::{MigrateError, MigrateResult},
    keys::KeyContext,
    progress::ProgressReporter,
    runtime::{BatchExecutor, BatchWriter},
    source::{RecordSource, SessionStream},
    ttl,
};

pub const DEFAULT_CHUNK_SIZE: usize = 100_000;
pub const DEFAULT_PAGE_SIZE: usize = 2_000;

/// Tunables for one migration.
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// Records per flush and per reclamation checkpoint.
    pub chunk_size: usize,
    /// Rows fetched per source round trip.
    pub page_size: usize,
    pub keys: KeyContext,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            keys: KeyContext::default(),
        }
    }
}

impl MigrationOptions {
    pub fn validate(&self) -> MigrateResult<()> {
        if self.chunk_size == 0 {
            return Err(MigrateError::invalid_config("chunk size must be at least 1"));
        }
        if self.page_size == 0 {
            return Err(MigrateError::invalid_config("page size must be at least 1"));
        }
        Ok(())
    }
}

/// Cooperative stop signal, checked between chunks.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Records an interrupt. The first one stops the run at the next chunk
    /// boundary; any later one asks the caller to stop right away.
    pub fn request_stop(&self) -> StopRequest {
        if self.0.swap(true, Ordering::SeqCst) {
            StopRequest::Immediate
        } else {
            StopRequest::AfterChunk
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopRequest {
    AfterChunk,
    Immediate,
}

/// Where the run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationPhase {
    Init,
    Counting,
    Streaming,
    Flushing,
    Draining,
    Done,
    Failed,
}

/// Outcome of a completed (or cancelled) run.
///
/// `total` is the count taken before streaming; the summary line reports the
/// records actually seen, which differs when the table changed mid-run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationSummary {
    pub total: u64,
    pub processed: u64,
    pub skipped: u64,
    pub flushes: u64,
    pub elapsed_secs: f64,
    pub throughput_per_second: f64,
    pub nothing_to_do: bool,
    pub cancelled: bool,
}

impl MigrationSummary {
    pub fn seen(&self) -> u64 {
        self.processed + self.skipped
    }
}

impl fmt::Display for MigrationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nothing_to_do {
            return write!(f, "Nothing to do: no sessions found");
        }
        if self.cancelled {
            return write!(
                f,
                "Cancelled after {} of {} sessions in {:.3}s ({:.3}/s)",
                self.seen(),
                self.total,
                self.elapsed_secs,
                self.throughput_per_second
            );
        }
        write!(
            f,
            "Processed {} sessions in {:.3}s ({:.3}/s)",
            self.seen(),
            self.elapsed_secs,
            self.throughput_per_second
        )
    }
}

/// Counts covered by flushes that completed.
///
/// After a failed run this is what is known to be in the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommittedProgress {
    pub chunks: u64,
    pub processed: u64,
    pub skipped: u64,
}

/// Drives the source, TTL conversion, writer and reporter through one run.
///
/// Nothing is checkpointed: after a failure the next run starts over, which
/// is safe because every write overwrites by session key.
pub struct Migration<S, E>
where
    S: RecordSource,
    E: BatchExecutor,
{
    source: S,
    executor: E,
    options: MigrationOptions,
    cancellation: Cancellation,
    phase: MigrationPhase,
    committed: CommittedProgress,
}

impl<S, E> Migration<S, E>
where
    S: RecordSource,
    E: BatchExecutor,
{
    pub fn new(source: S, executor: E, options: MigrationOptions) -> Self {
        Self {
            source,
            executor,
            options,
            cancellation: Cancellation::new(),
            phase: MigrationPhase::Init,
            committed: CommittedProgress::default(),
        }
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn phase(&self) -> MigrationPhase {
        self.phase
    }

    pub fn committed(&self) -> CommittedProgress {
        self.committed
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn into_parts(self) -> (S, E) {
        (self.source, self.executor)
    }

    /// Runs against the current wall clock.
    pub async fn run(&mut self, reporter: &mut ProgressReporter) -> MigrateResult<MigrationSummary> {
        self.run_at(Utc::now(), reporter).await
    }

    /// Runs with every TTL computed against `now`.
    pub async fn run_at(
        &mut self,
        now: DateTime<Utc>,
        reporter: &mut ProgressReporter,
    ) -> MigrateResult<MigrationSummary> {
        self.phase = MigrationPhase::Init;
        self.committed = CommittedProgress::default();
        match self.execute(now, reporter).await {
            Ok(summary) => {
                self.transition(MigrationPhase::Done);
                Ok(summary)
            }
            Err(err) => {
                self.transition(MigrationPhase::Failed);
                log::error!("migration failed: {err}");
                Err(err)
            }
        }
    }

    fn transition(&mut self, next: MigrationPhase) {
        enter(&mut self.phase, next);
    }

    async fn execute(&mut self, now: DateTime<Utc>, reporter: &mut ProgressReporter) -> MigrateResult<MigrationSummary> {
        self.options.validate()?;
        let chunk_size = self.options.chunk_size;

        self.transition(MigrationPhase::Counting);
        let total = self.source.count().await?;
        log::info!("migrating {total} session(s) in chunks of {chunk_size}, now = {now}");

        if !reporter.start(total) {
            let report = reporter.finish();
            return Ok(MigrationSummary {
                total: 0,
                processed: 0,
                skipped: 0,
                flushes: 0,
                elapsed_secs: report.duration.as_secs_f64(),
                throughput_per_second: report.throughput_per_second,
                nothing_to_do: true,
                cancelled: false,
            });
        }

        enter(&mut self.phase, MigrationPhase::Streaming);
        let mut stream = SessionStream::new(&mut self.source, self.options.page_size);
        let mut writer = BatchWriter::new(&mut self.executor, self.options.keys.clone(), chunk_size);
        let mut in_chunk = 0usize;
        let mut cancelled = false;

        while let Some(record) = stream.next().await? {
            match ttl::convert(record.expire_at, now) {
                Ok(ttl) => {
                    writer.enqueue(&record.key, record.payload, ttl).await?;
                    reporter.advance(false);
                }
                Err(skip) => {
                    log::trace!("skipping expired session {:?} (ttl {}s)", record.key, skip.ttl_secs);
                    reporter.advance(true);
                }
            }

            in_chunk += 1;
            if in_chunk == chunk_size {
                enter(&mut self.phase, MigrationPhase::Flushing);
                writer.flush().await?;
                stream.reclaim();
                self.committed = commit(writer.flushes(), reporter);
                in_chunk = 0;

                if self.cancellation.is_cancelled() {
                    log::warn!("migration cancelled after {} chunk(s)", writer.flushes());
                    cancelled = true;
                    break;
                }
                enter(&mut self.phase, MigrationPhase::Streaming);
            }
        }

        if in_chunk > 0 {
            enter(&mut self.phase, MigrationPhase::Draining);
            writer.flush().await?;
            stream.reclaim();
            self.committed = commit(writer.flushes(), reporter);
        }
        let seen = stream.yielded();
        let flushes = writer.close().await?;

        if !cancelled && seen != total {
            log::warn!("source reported {total} session(s) but {seen} were streamed; the table changed during the run");
        }

        let report = reporter.finish();
        let summary = MigrationSummary {
            total: report.total,
            processed: report.processed,
            skipped: report.skipped,
            flushes,
            elapsed_secs: report.duration.as_secs_f64(),
            throughput_per_second: report.throughput_per_second,
            nothing_to_do: false,
            cancelled,
        };
        log::info!("{summary} with {} skipped", summary.skipped);
        Ok(summary)
    }
}

fn commit(chunks: u64, reporter: &ProgressReporter) -> CommittedProgress {
    let (processed, skipped) = reporter
        .state()
        .map_or((0, 0), |state| (state.processed, state.skipped));
    CommittedProgress {
        chunks,
        processed,
        skipped,
    }
}

fn enter(phase: &mut MigrationPhase, next: MigrationPhase) {
    log::debug!("migration phase {phase:?} -> {next:?}");
    *phase = next;
}
