//! The chunked export pipeline.
//!
//! A full export window is partitioned into bounded time chunks; each chunk
//! is materialized into one query, executed through the [`QueryExecutor`]
//! seam, and its rows appended to the job's CSV file under a single stable
//! header. The runner drives one job at a time, fail-fast within a job and
//! isolated across jobs.

pub mod executor;
pub mod partition;
pub mod runner;
pub mod sink;
pub mod template;

pub use executor::{QueryExecutor, RowSet};
pub use partition::{TimeChunks, TimeRange};
pub use runner::{ExportRunner, JobOutcome, JobReport};
pub use sink::CsvSink;
pub use template::materialize_query;
