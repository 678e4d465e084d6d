use std::borrow::Cow;

use thiserror::Error;

/// Boxed cause attached to source read failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type returned by the migration pipeline.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Paging or row decoding failed on the origin store.
    #[error("failed to read sessions from source: {context}")]
    SourceRead {
        context: Cow<'static, str>,
        #[source]
        source: BoxError,
    },

    /// A pipeline round trip to the destination failed. Operations of earlier
    /// chunks, and possibly part of this one, have already been applied.
    #[error("failed to flush chunk {chunk} ({operations} operations)")]
    WriteFlush {
        chunk: u64,
        operations: usize,
        #[source]
        source: redis::RedisError,
    },

    /// Underlying Redis command failed outside of a flush.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Options handed to the pipeline are unusable.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: Cow<'static, str> },
}

impl MigrateError {
    pub fn source_read(context: impl Into<Cow<'static, str>>, source: impl Into<BoxError>) -> Self {
        Self::SourceRead {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn invalid_config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidConfig { message: message.into() }
    }

    /// Whether the error happened while talking to the destination store.
    pub fn is_write_failure(&self) -> bool {
        matches!(self, Self::WriteFlush { .. } | Self::Redis(_))
    }
}

impl From<tokio_postgres::Error> for MigrateError {
    fn from(err: tokio_postgres::Error) -> Self {
        Self::source_read("postgres query failed", err)
    }
}

pub type MigrateResult<T> = Result<T, MigrateError>;
