//! API-shaped records and run outcome types
//!
//! The Canvas records here are transient: they live for the duration of one
//! run and are never persisted. Deserialization is tolerant of absent fields
//! because the API omits them freely (a submission without attachments, a
//! history entry without a timestamp).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A Canvas course, the root scope for all queries
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Course {
    /// Course ID
    pub id: u64,
    /// Course display name (used for the output directory)
    #[serde(default)]
    pub name: String,
}

/// A gradable unit within a course
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Assignment {
    /// Assignment ID
    pub id: u64,
    /// Assignment display name
    #[serde(default)]
    pub name: String,
    /// Whether the assignment is published (drafts are skipped)
    #[serde(default)]
    pub published: bool,
    /// Submission type tags (e.g. "online_upload", "online_quiz")
    #[serde(default)]
    pub submission_types: Vec<String>,
}

impl Assignment {
    /// Whether this assignment is an online quiz (quizzes carry no file uploads)
    pub fn is_online_quiz(&self) -> bool {
        self.submission_types.iter().any(|t| t == "online_quiz")
    }
}

/// A file attached to one submission version
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Attachment {
    /// Original filename as uploaded by the student
    #[serde(default)]
    pub filename: Option<String>,
    /// Download URL (pre-signed by Canvas)
    #[serde(default)]
    pub url: Option<String>,
}

impl Attachment {
    /// The filename, falling back to "unnamed" when the API omits it
    pub fn filename_or_default(&self) -> &str {
        self.filename.as_deref().unwrap_or("unnamed")
    }
}

/// A student's response to an assignment
///
/// History entries are shaped like submissions, so the type is reused for
/// the `submission_history` list.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Submission {
    /// ID of the submitting student
    #[serde(default)]
    pub user_id: u64,
    /// Submission timestamp in API format (`YYYY-MM-DDTHH:MM:SSZ`), if any
    #[serde(default)]
    pub submitted_at: Option<String>,
    /// Attachments on this submission version
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Prior versions in chronological order, when requested via include
    #[serde(default)]
    pub submission_history: Option<Vec<Submission>>,
}

/// A Canvas user, looked up to name output files
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct User {
    /// User ID
    pub id: u64,
    /// Display name
    #[serde(default)]
    pub name: String,
}

/// Outcome of handling one attachment
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileOutcome {
    /// File was fetched and written to disk
    Downloaded {
        /// Derived output filename
        filename: String,
    },
    /// Target path already existed; no request was made
    SkippedExisting {
        /// Derived output filename
        filename: String,
    },
    /// Extension is in the exclusion set; no request was made
    SkippedExcluded {
        /// Original attachment filename
        filename: String,
    },
    /// Download failed (after retries, where applicable)
    Failed {
        /// Derived output filename
        filename: String,
        /// The file URL that failed
        url: String,
        /// Last HTTP status observed, if the failure was HTTP-level
        status: Option<u16>,
    },
}

/// Per-submission results returned by one unit of work
#[derive(Clone, Debug, Default)]
pub struct SubmissionReport {
    /// ID of the submitting student
    pub user_id: u64,
    /// One outcome per attachment considered
    pub outcomes: Vec<FileOutcome>,
}

impl SubmissionReport {
    /// Create an empty report for a student
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id,
            outcomes: Vec::new(),
        }
    }
}

/// Aggregated results of a whole run
///
/// Returned to the caller so "what happened" is decoupled from "what was
/// printed"; the binary renders it, tests assert on it.
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Files fetched and written
    pub downloaded: usize,
    /// Files skipped because the target path already existed
    pub skipped_existing: usize,
    /// Files skipped by the extension exclusion policy
    pub skipped_excluded: usize,
    /// Files that failed to download
    pub failed: usize,
    /// Path of the append-only failure log for this run
    pub failure_log: PathBuf,
}

impl RunReport {
    /// Create an empty report pointing at the run's failure log
    pub fn new(failure_log: PathBuf) -> Self {
        Self {
            downloaded: 0,
            skipped_existing: 0,
            skipped_excluded: 0,
            failed: 0,
            failure_log,
        }
    }

    /// Count one file outcome
    pub fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Downloaded { .. } => self.downloaded += 1,
            FileOutcome::SkippedExisting { .. } => self.skipped_existing += 1,
            FileOutcome::SkippedExcluded { .. } => self.skipped_excluded += 1,
            FileOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Fold a submission's outcomes into the run totals
    pub fn absorb(&mut self, report: &SubmissionReport) {
        for outcome in &report.outcomes {
            self.record(outcome);
        }
    }

    /// Path of the failure log, for the completion notice
    pub fn failure_log(&self) -> &Path {
        &self.failure_log
    }
}
