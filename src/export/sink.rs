//! Incremental CSV sink with first-chunk header semantics.
//!
//! A [`CsvSink`] owns one job's output file for the duration of one run. The
//! first chunk that yields rows creates (or truncates) the file, writes the
//! header derived from that chunk's columns and fixes the schema for the
//! rest of the run; every later chunk appends data rows only. Each call is a
//! complete, flushed append, so a crash after N chunks leaves exactly the
//! first N chunks on disk under one valid header.
//!
//! Precondition: the output file is exclusively owned by this sink while the
//! run lasts. Two concurrent runs targeting the same file are unsupported and
//! will corrupt the header/append invariant.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::AppError;
use crate::export::executor::RowSet;

/// Stateful CSV writer for one job run.
#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
    /// Column order fixed by the first non-empty chunk; `None` until then.
    schema: Option<Vec<String>>,
}

impl CsvSink {
    /// Creates a sink targeting `path`. No file is touched until the first
    /// non-empty chunk arrives.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            schema: None,
        }
    }

    /// The output path this sink writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once the header has been written and the schema is fixed.
    pub fn header_written(&self) -> bool {
        self.schema.is_some()
    }

    /// Writes one chunk's rows, returning the number of rows written.
    ///
    /// An empty `RowSet` performs no I/O and leaves the sink unchanged. The
    /// first non-empty chunk truncates the target and writes the header; later
    /// chunks append under the schema fixed by that first chunk.
    ///
    /// # Errors
    ///
    /// - `AppError::SchemaViolation` if a later chunk's columns differ from
    ///   the fixed schema, or a row's arity does not match its columns.
    /// - `AppError::Io` for filesystem failures; the path is included in the
    ///   message.
    pub fn write_chunk(&mut self, rows: &RowSet) -> Result<u64, AppError> {
        if rows.is_empty() {
            return Ok(0);
        }
        if rows.columns.is_empty() {
            return Err(AppError::SchemaViolation(
                "result rows carry no column names".into(),
            ));
        }

        match &self.schema {
            None => {
                let file = File::create(&self.path).map_err(|e| {
                    AppError::Io(format!("failed to create {}: {}", self.path.display(), e))
                })?;
                let mut writer = csv::Writer::from_writer(file);
                writer.write_record(&rows.columns).map_err(|e| {
                    AppError::Io(format!("failed to write to {}: {}", self.path.display(), e))
                })?;
                write_rows(&mut writer, &rows.columns, &rows.rows, &self.path)?;
                writer.flush().map_err(|e| {
                    AppError::Io(format!("failed to flush {}: {}", self.path.display(), e))
                })?;
                self.schema = Some(rows.columns.clone());
            }
            Some(schema) => {
                if rows.columns != *schema {
                    return Err(AppError::SchemaViolation(format!(
                        "columns changed from [{}] to [{}]",
                        schema.join(", "),
                        rows.columns.join(", ")
                    )));
                }
                let file = OpenOptions::new().append(true).open(&self.path).map_err(|e| {
                    AppError::Io(format!("failed to open {}: {}", self.path.display(), e))
                })?;
                let mut writer = csv::Writer::from_writer(file);
                write_rows(&mut writer, schema, &rows.rows, &self.path)?;
                writer.flush().map_err(|e| {
                    AppError::Io(format!("failed to flush {}: {}", self.path.display(), e))
                })?;
            }
        }

        Ok(rows.rows.len() as u64)
    }
}

/// Writes data records under a fixed column order.
fn write_rows<W: Write>(
    writer: &mut csv::Writer<W>,
    columns: &[String],
    rows: &[Vec<Value>],
    path: &Path,
) -> Result<(), AppError> {
    for row in rows {
        if row.len() != columns.len() {
            return Err(AppError::SchemaViolation(format!(
                "row has {} fields but the schema has {}",
                row.len(),
                columns.len()
            )));
        }
        let record: Vec<String> = row.iter().map(render_field).collect();
        writer.write_record(&record).map_err(|e| {
            AppError::Io(format!("failed to write to {}: {}", path.display(), e))
        })?;
    }
    Ok(())
}

/// Renders one scalar as a CSV field. Nulls become the empty field; strings
/// are written verbatim; numbers and booleans use their JSON text form.
fn render_field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
