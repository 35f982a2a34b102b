//! Orchestrator for a whole-course download run
//!
//! Enumerates published, non-quiz assignments, lists their submissions, and
//! dispatches one unit of work per submission onto a semaphore-bounded worker
//! pool. Unit failures are contained: they are logged, counted, and never
//! abort sibling units or the run.

use crate::client::CanvasClient;
use crate::config::Config;
use crate::error::Result;
use crate::failure_log::FailureLog;
use crate::naming::{self, TargetDecision};
use crate::resolver;
use crate::types::{Assignment, FileOutcome, RunReport, Submission, SubmissionReport};
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Name of the append-only failure log inside the course directory
const FAILURE_LOG_NAME: &str = "failed_downloads.txt";

/// Bulk downloader for one course's submissions
#[derive(Clone, Debug)]
pub struct SubmissionDownloader {
    config: Arc<Config>,
    client: Arc<CanvasClient>,
}

impl SubmissionDownloader {
    /// Build a downloader from an explicit configuration
    pub fn new(config: Config) -> Result<Self> {
        let client = CanvasClient::new(&config.api, config.retry.clone())?;
        Ok(Self {
            config: Arc::new(config),
            client: Arc::new(client),
        })
    }

    /// Run the whole pipeline and return the aggregated results
    ///
    /// Only startup failures (unreachable API, invalid course, unwritable
    /// output directory) are fatal; everything after the first assignment
    /// listing is contained per assignment or per submission.
    pub async fn run(&self) -> Result<RunReport> {
        let course = self.client.get_course().await?;
        let course_dir = self
            .config
            .output
            .base_dir
            .join(naming::sanitize_component(&course.name));
        tokio::fs::create_dir_all(&course_dir).await?;

        let failure_log = FailureLog::create(course_dir.join(FAILURE_LOG_NAME)).await?;
        let mut report = RunReport::new(failure_log.path().to_path_buf());

        let assignments = self.client.list_assignments().await?;
        // Quizzes carry no file uploads; they never get a directory
        let valid: Vec<Assignment> = assignments
            .into_iter()
            .filter(|a| !a.is_online_quiz())
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let mut handles = Vec::new();

        for assignment in valid {
            if !assignment.published {
                tracing::info!(
                    assignment = %assignment.name,
                    "skipping unpublished assignment"
                );
                continue;
            }

            tracing::info!(
                assignment = %assignment.name,
                id = assignment.id,
                mode = ?self.config.versioning,
                "processing published assignment"
            );

            let assignment_dir = course_dir.join(format!(
                "{}_{}",
                naming::sanitize_component(&assignment.name),
                assignment.id
            ));
            tokio::fs::create_dir_all(&assignment_dir).await?;

            let submissions = match self.client.list_submissions(assignment.id).await {
                Ok(submissions) => submissions,
                Err(e) => {
                    tracing::error!(
                        assignment = %assignment.name,
                        error = %e,
                        "failed to list submissions"
                    );
                    continue;
                }
            };

            tracing::info!(
                assignment = %assignment.name,
                count = submissions.len(),
                "found student submissions"
            );

            for submission in submissions {
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };

                let client = Arc::clone(&self.client);
                let config = Arc::clone(&self.config);
                let failure_log = failure_log.clone();
                let dir = assignment_dir.clone();
                let assignment_id = assignment.id;

                handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    process_submission(client, config, failure_log, dir, assignment_id, submission)
                        .await
                }));
            }
        }

        for joined in join_all(handles).await {
            match joined {
                Ok(submission_report) => report.absorb(&submission_report),
                Err(e) => tracing::error!(error = %e, "submission task failed"),
            }
        }

        tracing::info!(
            downloaded = report.downloaded,
            skipped_existing = report.skipped_existing,
            skipped_excluded = report.skipped_excluded,
            failed = report.failed,
            "run complete"
        );
        Ok(report)
    }
}

/// One unit of work: everything for a single student's submission
async fn process_submission(
    client: Arc<CanvasClient>,
    config: Arc<Config>,
    failure_log: FailureLog,
    assignment_dir: PathBuf,
    assignment_id: u64,
    submission: Submission,
) -> SubmissionReport {
    // Fixed delay to reduce load on the remote API
    tokio::time::sleep(config.submission_delay).await;

    let user_id = submission.user_id;
    let user_name = match client.get_user(user_id).await {
        Ok(user) if !user.name.trim().is_empty() => naming::sanitize_user_name(&user.name),
        Ok(_) => format!("user_{user_id}"),
        Err(e) => {
            tracing::warn!(
                user_id,
                error = %e,
                "failed to fetch user info, using fallback name"
            );
            format!("user_{user_id}")
        }
    };

    let versions = resolver::resolve_versions(
        &client,
        config.versioning,
        assignment_id,
        user_id,
        &submission,
    )
    .await;

    let mut report = SubmissionReport::new(user_id);

    for version in versions {
        let submitted_at = naming::format_timestamp(version.submitted_at.as_deref());
        let decisions = naming::plan_attachments(
            &version.attachments,
            &user_name,
            user_id,
            version.number,
            &submitted_at,
            &assignment_dir,
            &config.filter,
        );

        let mut downloaded = 0usize;
        for decision in decisions {
            let outcome = match decision {
                TargetDecision::SkipExcluded { filename } => {
                    FileOutcome::SkippedExcluded { filename }
                }
                TargetDecision::SkipExisting { filename } => {
                    FileOutcome::SkippedExisting { filename }
                }
                TargetDecision::Download(target) => {
                    match client.download_file(&target.url, &target.path).await {
                        Ok(()) => {
                            downloaded += 1;
                            FileOutcome::Downloaded {
                                filename: target.filename,
                            }
                        }
                        Err(e) => {
                            let status = e.http_status();
                            if let Some(code) = status {
                                tracing::warn!(
                                    filename = %target.filename,
                                    status = code,
                                    "failed to download"
                                );
                                if let Err(log_err) = failure_log
                                    .append(&target.filename, &target.url, Some(code))
                                    .await
                                {
                                    tracing::error!(error = %log_err, "failed to record failure");
                                }
                            } else {
                                // Non-HTTP failures (connection loss, disk)
                                // reach the console but not the failure log
                                tracing::error!(
                                    filename = %target.filename,
                                    error = %e,
                                    "download error"
                                );
                            }
                            FileOutcome::Failed {
                                filename: target.filename,
                                url: target.url,
                                status,
                            }
                        }
                    }
                }
            };
            report.outcomes.push(outcome);
        }

        if downloaded > 0 {
            tracing::info!(
                user = %user_name,
                version = version.number,
                files = downloaded,
                "downloaded files for version"
            );
        }
    }

    report
}
