use thiserror::Error;

/// Application-wide error type.
///
/// Variants map one-to-one onto the failure classes of the export pipeline,
/// so callers can tell configuration mistakes, backend failures, schema drift
/// and local I/O problems apart. Every job-level failure is folded into the
/// job's terminal state by the runner; none of these abort the process while
/// other jobs remain queued.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Configuration ─────────────────────────────────────────────────────────
    /// Unusable configuration: unreadable file, bad URL, invalid export window.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A query template missing a required time-bound placeholder.
    #[error("Invalid query template: {0}")]
    Template(String),

    // ── Query execution ───────────────────────────────────────────────────────
    /// The backing store failed to execute a query: network error, server
    /// error, or a malformed response body.
    #[error("Query execution failed: {0}")]
    Execution(String),

    // ── Output ────────────────────────────────────────────────────────────────
    /// A chunk's result columns no longer match the schema fixed by the first
    /// non-empty chunk of the run.
    #[error("Result schema changed: {0}")]
    SchemaViolation(String),

    /// Failed writing to the local filesystem.
    #[error("I/O error: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns all AppError variants for exhaustive testing.
    fn all_variants() -> Vec<AppError> {
        vec![
            AppError::Config("bad window".into()),
            AppError::Template("missing {start}".into()),
            AppError::Execution("connection refused".into()),
            AppError::SchemaViolation("columns changed".into()),
            AppError::Io("disk full".into()),
        ]
    }

    #[test]
    fn all_variants_display_their_context() {
        for variant in all_variants() {
            let rendered = variant.to_string();
            assert!(
                !rendered.trim().is_empty(),
                "Empty display for {:?}",
                variant
            );
        }
    }

    #[test]
    fn variant_messages_carry_payload() {
        assert!(AppError::Execution("timed out".into())
            .to_string()
            .contains("timed out"));
        assert!(AppError::SchemaViolation("t,v vs t,w".into())
            .to_string()
            .contains("t,v vs t,w"));
    }
}
