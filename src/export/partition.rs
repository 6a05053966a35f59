//! Time-range partitioning for chunked exports.
//!
//! A full export window is split into contiguous, half-open sub-ranges so
//! that no single query spans more than the configured chunk width. Ranges
//! share their boundaries exactly: one chunk's exclusive end is the next
//! chunk's inclusive start, so boundary instants are neither duplicated nor
//! dropped.

use crate::error::AppError;

/// A half-open time interval `[start_ms, end_ms)` in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Inclusive lower bound.
    pub start_ms: i64,
    /// Exclusive upper bound.
    pub end_ms: i64,
}

impl TimeRange {
    /// Width of the interval in milliseconds.
    pub fn width_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

/// Lazy iterator over the sub-ranges covering `[start_ms, end_ms)`.
///
/// Every yielded range is at most `chunk_ms` wide; the final range is clipped
/// to the window end and never overshoots. Cloning restarts iteration from
/// the beginning of the window.
#[derive(Debug, Clone)]
pub struct TimeChunks {
    cursor_ms: i64,
    end_ms: i64,
    chunk_ms: i64,
}

impl TimeChunks {
    /// Creates a partition of `[start_ms, end_ms)` into chunks of at most
    /// `chunk_ms` milliseconds.
    ///
    /// `start_ms == end_ms` yields an empty sequence.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `chunk_ms` is not positive or the window
    /// is inverted.
    pub fn new(start_ms: i64, end_ms: i64, chunk_ms: i64) -> Result<Self, AppError> {
        if chunk_ms <= 0 {
            return Err(AppError::Config(format!(
                "chunk width must be positive, got {} ms",
                chunk_ms
            )));
        }
        if start_ms > end_ms {
            return Err(AppError::Config(format!(
                "window start {} is after window end {}",
                start_ms, end_ms
            )));
        }
        Ok(Self {
            cursor_ms: start_ms,
            end_ms,
            chunk_ms,
        })
    }
}

impl Iterator for TimeChunks {
    type Item = TimeRange;

    fn next(&mut self) -> Option<TimeRange> {
        if self.cursor_ms >= self.end_ms {
            return None;
        }
        let start_ms = self.cursor_ms;
        let end_ms = self.end_ms.min(start_ms.saturating_add(self.chunk_ms));
        self.cursor_ms = end_ms;
        Some(TimeRange { start_ms, end_ms })
    }
}
