//! Job orchestration: drives each configured export across its time chunks.
//!
//! One job runs as a small state machine: sink setup, then the chunk loop,
//! then a terminal [`JobOutcome`]. Chunks are processed strictly in ascending
//! time order and the first failure aborts the job; chunks after the failing
//! one are never attempted, so everything already on disk stays valid. A set
//! of jobs runs strictly sequentially with job-level isolation: one aborted
//! job never prevents the next from starting.

use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::{ExportWindow, JobSpec};
use crate::error::AppError;
use crate::export::executor::QueryExecutor;
use crate::export::partition::{TimeChunks, TimeRange};
use crate::export::sink::CsvSink;
use crate::export::template::materialize_query;

/// Pause between chunk queries, to bound the request rate against the store.
const CHUNK_PACING: Duration = Duration::from_millis(100);

// ─────────────────────────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────────────────────────

/// Terminal state of one export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every chunk of the window was queried and written.
    Completed,
    /// The job stopped at the first failing chunk; earlier chunks remain on
    /// disk.
    Aborted,
}

/// Per-job summary returned by the runner.
#[derive(Debug)]
pub struct JobReport {
    /// Job name from the configuration.
    pub name: String,
    /// Terminal state the job reached.
    pub outcome: JobOutcome,
    /// Chunks queried and written successfully (empty chunks included).
    pub chunks_completed: u64,
    /// Data rows written to the output file.
    pub rows_written: u64,
    /// The error that aborted the job, if any.
    pub failure: Option<AppError>,
}

#[derive(Debug, Default)]
struct Progress {
    chunks: u64,
    rows: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// ExportRunner
// ─────────────────────────────────────────────────────────────────────────────

/// Runs export jobs against a query executor, one chunk at a time.
pub struct ExportRunner<'a> {
    executor: &'a dyn QueryExecutor,
    window: ExportWindow,
}

impl<'a> ExportRunner<'a> {
    /// Creates a runner exporting the given window through `executor`.
    pub fn new(executor: &'a dyn QueryExecutor, window: ExportWindow) -> Self {
        Self { executor, window }
    }

    /// Runs every job in list order, each to a terminal state.
    ///
    /// Jobs are isolated: an aborted job is reported and the next job still
    /// runs. Returns one report per job, in input order.
    pub async fn run_all(&self, jobs: &[JobSpec]) -> Vec<JobReport> {
        let mut reports = Vec::with_capacity(jobs.len());
        for job in jobs {
            reports.push(self.run_job(job).await);
        }
        reports
    }

    /// Runs a single job to a terminal state.
    ///
    /// The job's output file is exclusively owned by this run; see the sink
    /// docs for the concurrent-run precondition.
    pub async fn run_job(&self, job: &JobSpec) -> JobReport {
        info!(
            job = %job.name,
            output = %job.output_path.display(),
            "Starting export"
        );

        let mut sink = CsvSink::new(&job.output_path);
        let mut progress = Progress::default();

        match self.drive(job, &mut sink, &mut progress).await {
            Ok(()) => {
                info!(
                    job = %job.name,
                    chunks = progress.chunks,
                    rows = progress.rows,
                    "Export complete"
                );
                JobReport {
                    name: job.name.clone(),
                    outcome: JobOutcome::Completed,
                    chunks_completed: progress.chunks,
                    rows_written: progress.rows,
                    failure: None,
                }
            }
            Err(e) => {
                error!(job = %job.name, error = %e, "Export aborted");
                JobReport {
                    name: job.name.clone(),
                    outcome: JobOutcome::Aborted,
                    chunks_completed: progress.chunks,
                    rows_written: progress.rows,
                    failure: Some(e),
                }
            }
        }
    }

    /// The chunk loop. Any error returned here aborts the job; `progress`
    /// keeps whatever was completed before the failure.
    async fn drive(
        &self,
        job: &JobSpec,
        sink: &mut CsvSink,
        progress: &mut Progress,
    ) -> Result<(), AppError> {
        let ranges = TimeChunks::new(self.window.start_ms, self.window.end_ms, self.window.chunk_ms)?;

        for range in ranges {
            debug!(
                job = %job.name,
                start_ms = range.start_ms,
                end_ms = range.end_ms,
                "Querying chunk"
            );

            let query = materialize_query(&job.query_template, range)
                .map_err(|e| fail_chunk(job, range, e))?;

            let rows = self
                .executor
                .execute(&query)
                .await
                .map_err(|e| fail_chunk(job, range, e))?;

            let written = sink
                .write_chunk(&rows)
                .map_err(|e| fail_chunk(job, range, e))?;

            progress.chunks += 1;
            progress.rows += written;

            tokio::time::sleep(CHUNK_PACING).await;
        }

        Ok(())
    }
}

/// Logs a chunk failure with its range and passes the error through.
fn fail_chunk(job: &JobSpec, range: TimeRange, error: AppError) -> AppError {
    error!(
        job = %job.name,
        start_ms = range.start_ms,
        end_ms = range.end_ms,
        error = %error,
        "Chunk failed"
    );
    error
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::executor::RowSet;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::fs;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Fake executor that replays a scripted list of responses and records
    /// every query it receives.
    #[derive(Default)]
    struct ScriptedExecutor {
        responses: Mutex<VecDeque<Result<RowSet, AppError>>>,
        queries: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        fn new(responses: Vec<Result<RowSet, AppError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    impl QueryExecutor for ScriptedExecutor {
        fn execute<'a>(
            &'a self,
            query: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<RowSet, AppError>> + Send + 'a>> {
            Box::pin(async move {
                self.queries.lock().unwrap().push(query.to_string());
                self.responses
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| Ok(RowSet::default()))
            })
        }
    }

    fn rowset(columns: &[&str], rows: Vec<Vec<serde_json::Value>>) -> RowSet {
        RowSet {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    fn window(start_ms: i64, end_ms: i64, chunk_ms: i64) -> ExportWindow {
        ExportWindow { start_ms, end_ms, chunk_ms }
    }

    fn job(name: &str, dir: &TempDir) -> JobSpec {
        JobSpec {
            name: name.to_string(),
            query_template: format!(
                "SELECT * FROM {} WHERE time >= {{start}}ms AND time < {{end}}ms",
                name
            ),
            output_path: dir.path().join(format!("{}.csv", name)),
        }
    }

    #[tokio::test]
    async fn completed_job_writes_header_once_and_skips_empty_chunks() {
        let dir = TempDir::new().unwrap();
        let executor = ScriptedExecutor::new(vec![
            Ok(rowset(&["t", "v"], vec![vec![json!(0), json!(1.0)]])),
            Ok(RowSet::default()),
            Ok(rowset(&["t", "v"], vec![vec![json!(28), json!(2.0)]])),
        ]);
        let runner = ExportRunner::new(&executor, window(0, 30, 14));
        let spec = job("weather", &dir);

        let report = runner.run_job(&spec).await;

        assert_eq!(report.outcome, JobOutcome::Completed);
        assert_eq!(report.chunks_completed, 3);
        assert_eq!(report.rows_written, 2);
        assert!(report.failure.is_none());

        let content = fs::read_to_string(&spec.output_path).unwrap();
        assert_eq!(content, "t,v\n0,1.0\n28,2.0\n");
    }

    #[tokio::test]
    async fn chunk_queries_carry_ascending_bounds() {
        let dir = TempDir::new().unwrap();
        let executor = ScriptedExecutor::default();
        let runner = ExportRunner::new(&executor, window(0, 30, 14));

        let report = runner.run_job(&job("weather", &dir)).await;
        assert_eq!(report.outcome, JobOutcome::Completed);

        let queries = executor.queries();
        assert_eq!(queries.len(), 3);
        assert!(queries[0].contains("time >= 0ms AND time < 14ms"));
        assert!(queries[1].contains("time >= 14ms AND time < 28ms"));
        assert!(queries[2].contains("time >= 28ms AND time < 30ms"));
    }

    #[tokio::test]
    async fn execution_failure_aborts_without_touching_later_chunks() {
        let dir = TempDir::new().unwrap();
        let executor = ScriptedExecutor::new(vec![
            Ok(rowset(&["t", "v"], vec![vec![json!(0), json!(1.0)]])),
            Err(AppError::Execution("connection reset".into())),
            Ok(rowset(&["t", "v"], vec![vec![json!(28), json!(2.0)]])),
        ]);
        let runner = ExportRunner::new(&executor, window(0, 30, 14));
        let spec = job("weather", &dir);

        let report = runner.run_job(&spec).await;

        assert_eq!(report.outcome, JobOutcome::Aborted);
        assert_eq!(report.chunks_completed, 1);
        assert_eq!(report.rows_written, 1);
        assert!(matches!(report.failure, Some(AppError::Execution(_))));

        // Only the first two chunks were ever queried.
        assert_eq!(executor.queries().len(), 2);

        // The file holds exactly the pre-failure chunks under one header.
        let content = fs::read_to_string(&spec.output_path).unwrap();
        assert_eq!(content, "t,v\n0,1.0\n");
    }

    #[tokio::test]
    async fn template_error_aborts_before_any_query_runs() {
        let dir = TempDir::new().unwrap();
        let executor = ScriptedExecutor::default();
        let runner = ExportRunner::new(&executor, window(0, 30, 14));
        let spec = JobSpec {
            name: "broken".to_string(),
            query_template: "SELECT * FROM weather WHERE time >= {start}ms".to_string(),
            output_path: dir.path().join("broken.csv"),
        };

        let report = runner.run_job(&spec).await;

        assert_eq!(report.outcome, JobOutcome::Aborted);
        assert_eq!(report.chunks_completed, 0);
        assert!(matches!(report.failure, Some(AppError::Template(_))));
        assert!(executor.queries().is_empty());
        assert!(!spec.output_path.exists());
    }

    #[tokio::test]
    async fn schema_drift_mid_job_aborts() {
        let dir = TempDir::new().unwrap();
        let executor = ScriptedExecutor::new(vec![
            Ok(rowset(&["t", "v"], vec![vec![json!(0), json!(1.0)]])),
            Ok(rowset(&["t", "w"], vec![vec![json!(14), json!(9.0)]])),
        ]);
        let runner = ExportRunner::new(&executor, window(0, 30, 14));
        let spec = job("weather", &dir);

        let report = runner.run_job(&spec).await;

        assert_eq!(report.outcome, JobOutcome::Aborted);
        assert_eq!(report.chunks_completed, 1);
        assert!(matches!(report.failure, Some(AppError::SchemaViolation(_))));

        let content = fs::read_to_string(&spec.output_path).unwrap();
        assert_eq!(content, "t,v\n0,1.0\n");
    }

    #[tokio::test]
    async fn aborted_job_does_not_stop_the_next_one() {
        let dir = TempDir::new().unwrap();
        // Job 1, chunk 1 fails immediately; job 2 then gets its three chunks.
        let executor = ScriptedExecutor::new(vec![
            Err(AppError::Execution("server unavailable".into())),
            Ok(rowset(&["t", "p"], vec![vec![json!(0), json!(10)]])),
            Ok(RowSet::default()),
            Ok(rowset(&["t", "p"], vec![vec![json!(28), json!(30)]])),
        ]);
        let runner = ExportRunner::new(&executor, window(0, 30, 14));
        let jobs = vec![job("weather", &dir), job("power", &dir)];

        let reports = runner.run_all(&jobs).await;

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].name, "weather");
        assert_eq!(reports[0].outcome, JobOutcome::Aborted);
        assert_eq!(reports[1].name, "power");
        assert_eq!(reports[1].outcome, JobOutcome::Completed);
        assert_eq!(reports[1].rows_written, 2);

        assert!(!jobs[0].output_path.exists());
        let content = fs::read_to_string(&jobs[1].output_path).unwrap();
        assert_eq!(content, "t,p\n0,10\n28,30\n");
    }

    #[tokio::test]
    async fn invalid_window_aborts_every_job_without_queries() {
        let dir = TempDir::new().unwrap();
        let executor = ScriptedExecutor::default();
        let runner = ExportRunner::new(&executor, window(0, 30, 0));
        let jobs = vec![job("weather", &dir), job("power", &dir)];

        let reports = runner.run_all(&jobs).await;

        assert!(reports
            .iter()
            .all(|r| r.outcome == JobOutcome::Aborted && r.chunks_completed == 0));
        assert!(reports
            .iter()
            .all(|r| matches!(r.failure, Some(AppError::Config(_)))));
        assert!(executor.queries().is_empty());
    }

    #[tokio::test]
    async fn empty_window_completes_without_io() {
        let dir = TempDir::new().unwrap();
        let executor = ScriptedExecutor::default();
        let runner = ExportRunner::new(&executor, window(42, 42, 14));
        let spec = job("weather", &dir);

        let report = runner.run_job(&spec).await;

        assert_eq!(report.outcome, JobOutcome::Completed);
        assert_eq!(report.chunks_completed, 0);
        assert!(executor.queries().is_empty());
        assert!(!spec.output_path.exists());
    }
}
