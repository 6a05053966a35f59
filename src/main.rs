use std::path::Path;
use std::process::ExitCode;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use influx2csv::config::ExportConfig;
use influx2csv::export::{ExportRunner, JobOutcome};
use influx2csv::influx::InfluxClient;

/// Config file used when no path is given on the command line.
const DEFAULT_CONFIG_PATH: &str = "influx2csv.toml";

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("influx2csv=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = ExportConfig::load(Path::new(&config_path))?;
    info!(
        config = %config_path,
        jobs = config.jobs.len(),
        database = %config.influx.database,
        "Loaded configuration"
    );

    let client = InfluxClient::new(&config.influx)?;
    let runner = ExportRunner::new(&client, config.window);
    let reports = runner.run_all(&config.jobs).await;

    let mut aborted = 0usize;
    for report in &reports {
        match report.outcome {
            JobOutcome::Completed => info!(
                job = %report.name,
                chunks = report.chunks_completed,
                rows = report.rows_written,
                "Job COMPLETED"
            ),
            JobOutcome::Aborted => {
                aborted += 1;
                let reason = report
                    .failure
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                warn!(
                    job = %report.name,
                    chunks = report.chunks_completed,
                    rows = report.rows_written,
                    reason = %reason,
                    "Job ABORTED"
                );
            }
        }
    }

    if aborted > 0 {
        warn!(aborted, total = reports.len(), "Run finished with aborted jobs");
        return Ok(ExitCode::FAILURE);
    }

    info!(jobs = reports.len(), "All jobs completed");
    Ok(ExitCode::SUCCESS)
}
