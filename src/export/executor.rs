//! The query-executor seam between the export loop and the backing store.
//!
//! The export runner only needs one capability: hand over a finished query
//! string, get back tabular rows or an error. This trait decouples the loop
//! from the actual client. The production implementation lives in
//! [`crate::influx::InfluxClient`]; tests script fake executors.

use std::future::Future;
use std::pin::Pin;

use crate::error::AppError;

/// A tabular query result: one shared column order plus one value row per
/// record.
///
/// `columns` fixes the field names and their order for every row in the set;
/// each row holds exactly `columns.len()` scalar values. Values are plain
/// JSON scalars as returned by the store, with `null` marking a missing
/// field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    /// Field names, in output order.
    pub columns: Vec<String>,
    /// One value row per record, parallel to `columns`.
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl RowSet {
    /// True if the set contains no rows. A row-less set may still carry
    /// column names.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows in the set.
    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Capability for executing a complete query string against the store.
///
/// Implementations own transport, authentication and response decoding; the
/// runner only sees rows or an `AppError::Execution`.
pub trait QueryExecutor: Send + Sync {
    /// Executes `query` and returns the resulting rows.
    fn execute<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<RowSet, AppError>> + Send + 'a>>;
}
