//! sessmigrate core library.
//!
//! Moves session rows out of a relational table and into Redis, turning each
//! absolute expiry into a relative TTL. Records are read in key order, written
//! in pipelined chunks, and skipped (and counted) once they have expired.

pub mod errors;
pub mod keys;
pub mod migration;
pub mod progress;
pub mod runtime;
pub mod source;
pub mod ttl;
pub mod types;

pub use errors::*;
pub use keys::KeyContext;
pub use migration::{
    Cancellation, CommittedProgress, DEFAULT_CHUNK_SIZE, DEFAULT_PAGE_SIZE, Migration, MigrationOptions,
    MigrationPhase, MigrationSummary, StopRequest,
};
pub use progress::{ProgressReporter, ProgressRenderer, RenderMode, RunReport, select_renderer};
pub use runtime::{BatchExecutor, BatchWriter, DryRunExecutor, RedisExecutor};
pub use source::{MemorySource, PostgresSource, RecordSource, SessionStream, TableName};
pub use ttl::{Skip, Ttl};
pub use types::{RunState, SessionRecord};

// Re-export redis types so callers don't need to depend on a specific redis version
pub use redis;
pub use redis::aio::ConnectionManager;
