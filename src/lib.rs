//! # canvas-submission-dl
//!
//! Bulk downloader for student file submissions from a Canvas LMS course.
//!
//! The pipeline enumerates published, non-quiz assignments in one course,
//! resolves each student's submission (latest only, or every version in the
//! resubmission history), and downloads eligible attachments concurrently
//! with a bounded worker pool. Rate-limited requests (HTTP 429) back off and
//! retry; other failures are appended to a per-run failure log and never
//! abort the rest of the run.
//!
//! ## Quick Start
//!
//! ```no_run
//! use canvas_submission_dl::{ApiConfig, Config, SubmissionDownloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new(ApiConfig {
//!         base_url: "https://school.instructure.com".to_string(),
//!         token: "canvas-api-token".to_string(),
//!         course_id: 4242,
//!     });
//!
//!     let downloader = SubmissionDownloader::new(config)?;
//!     let report = downloader.run().await?;
//!
//!     println!("downloaded {} files", report.downloaded);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Canvas REST client and file download engine
pub mod client;
/// Configuration types
pub mod config;
/// Run orchestration
pub mod downloader;
/// Error types
pub mod error;
/// Append-only failure log
pub mod failure_log;
/// Attachment filtering and output naming
pub mod naming;
/// Submission version resolution
pub mod resolver;
/// Bounded retry with backoff
pub mod retry;
/// API-shaped records and run outcome types
pub mod types;

// Re-export commonly used types
pub use client::{CanvasClient, SubmissionInclude};
pub use config::{ApiConfig, Config, FilterConfig, OutputConfig, RetryConfig, VersioningMode};
pub use downloader::SubmissionDownloader;
pub use error::{Error, Result};
pub use failure_log::FailureLog;
pub use types::{
    Assignment, Attachment, Course, FileOutcome, RunReport, Submission, SubmissionReport, User,
};
