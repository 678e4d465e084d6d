pub mod commands;
pub mod executor;
pub mod writer;

pub use executor::{BatchExecutor, DryRunExecutor, RedisExecutor};
pub use writer::BatchWriter;
