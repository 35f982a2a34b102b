//! Command-line entry point
//!
//! Loads configuration from the environment (and an optional `.env` file),
//! runs the download pipeline, and prints a summary. Partial download
//! failures are reported via the failure log and the summary; only startup
//! errors produce a non-zero exit.

use canvas_submission_dl::{Config, SubmissionDownloader};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let downloader = match SubmissionDownloader::new(config) {
        Ok(downloader) => downloader,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize downloader");
            return ExitCode::FAILURE;
        }
    };

    match downloader.run().await {
        Ok(report) => {
            println!(
                "Downloaded {} files ({} already present, {} excluded by policy, {} failed).",
                report.downloaded,
                report.skipped_existing,
                report.skipped_excluded,
                report.failed
            );
            println!(
                "Download complete. Check '{}' for any failed downloads.",
                report.failure_log().display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "download run aborted");
            ExitCode::FAILURE
        }
    }
}
