//! Export configuration: connection parameters, the export window, and the
//! ordered job list.
//!
//! Configuration is loaded once at startup from a TOML file, then overridden
//! by `INFLUX2CSV_*` environment variables (highest priority) so credentials
//! never have to live in the file. The resulting [`ExportConfig`] is immutable
//! and passed down explicitly; nothing in the crate reads ambient global state
//! after startup.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use crate::error::AppError;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "INFLUX2CSV_";

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level configuration for one export run.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// InfluxDB connection parameters.
    pub influx: InfluxConfig,
    /// The absolute time window every job is exported over.
    pub window: ExportWindow,
    /// Ordered list of export jobs, run strictly sequentially.
    #[serde(default)]
    pub jobs: Vec<JobSpec>,
}

/// InfluxDB 1.x connection parameters.
///
/// The password is wrapped in `SecretString` so it never leaks through
/// `Debug` output or logging.
#[derive(Debug, Clone, Deserialize)]
pub struct InfluxConfig {
    /// Base URL of the InfluxDB instance, e.g. `https://influx.example.com:8086`.
    pub url: String,
    /// Database to query.
    pub database: String,
    /// Optional basic-auth username.
    #[serde(default)]
    pub username: Option<String>,
    /// Optional basic-auth password. Usually supplied via `INFLUX2CSV_PASSWORD`.
    #[serde(default)]
    pub password: Option<SecretString>,
}

/// The time window shared by all jobs, in epoch milliseconds.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ExportWindow {
    /// Inclusive lower bound of the full export range.
    pub start_ms: i64,
    /// Exclusive upper bound of the full export range.
    pub end_ms: i64,
    /// Maximum width of one chunk query.
    pub chunk_ms: i64,
}

/// One named export job: a query template and its output file.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSpec {
    /// Job name, used for logging and the end-of-run summary.
    pub name: String,
    /// Query template with `{start}` and `{end}` placeholders for the chunk
    /// bounds in epoch milliseconds.
    pub query_template: String,
    /// CSV file the job's results are written to.
    pub output_path: PathBuf,
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading
// ─────────────────────────────────────────────────────────────────────────────

impl ExportConfig {
    /// Loads configuration from a TOML file, applies environment overrides
    /// and validates the result.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or parsed, or if
    /// validation fails.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("failed to read config file {}: {}", path.display(), e))
        })?;

        let mut config: ExportConfig = toml::from_str(&content).map_err(|e| {
            AppError::Config(format!("failed to parse config file {}: {}", path.display(), e))
        })?;

        config.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from an environment-like lookup.
    ///
    /// Keys are passed without the `INFLUX2CSV_` prefix; the lookup decides
    /// where values come from, which keeps this testable without touching the
    /// process environment.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("URL") {
            self.influx.url = url;
        }
        if let Some(database) = lookup("DATABASE") {
            self.influx.database = database;
        }
        if let Some(username) = lookup("USERNAME") {
            self.influx.username = Some(username);
        }
        if let Some(password) = lookup("PASSWORD") {
            self.influx.password = Some(SecretString::from(password));
        }
    }

    /// Validates connection parameters, the export window and the job list.
    ///
    /// Query templates are deliberately not checked here; a missing
    /// placeholder is detected when the first chunk is materialized and is
    /// fatal to that job only.
    pub fn validate(&self) -> Result<(), AppError> {
        Url::parse(&self.influx.url).map_err(|e| {
            AppError::Config(format!("invalid InfluxDB URL '{}': {}", self.influx.url, e))
        })?;

        if self.influx.database.is_empty() {
            return Err(AppError::Config("influx.database must not be empty".into()));
        }

        if self.window.chunk_ms <= 0 {
            return Err(AppError::Config(format!(
                "window.chunk_ms must be positive, got {}",
                self.window.chunk_ms
            )));
        }
        if self.window.start_ms > self.window.end_ms {
            return Err(AppError::Config(format!(
                "window.start_ms {} is after window.end_ms {}",
                self.window.start_ms, self.window.end_ms
            )));
        }

        let mut names = HashSet::new();
        let mut outputs = HashSet::new();
        for job in &self.jobs {
            if job.name.is_empty() {
                return Err(AppError::Config("job name must not be empty".into()));
            }
            if !names.insert(job.name.as_str()) {
                return Err(AppError::Config(format!("duplicate job name '{}'", job.name)));
            }
            if job.output_path.as_os_str().is_empty() {
                return Err(AppError::Config(format!(
                    "job '{}' has an empty output_path",
                    job.name
                )));
            }
            if !outputs.insert(job.output_path.as_path()) {
                return Err(AppError::Config(format!(
                    "output path {} is used by more than one job",
                    job.output_path.display()
                )));
            }
        }

        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
