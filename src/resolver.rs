//! Submission version resolution
//!
//! Turns one student's submission into the list of versions to download,
//! according to the configured [`VersioningMode`]. Fetch failures here are
//! never fatal: the student is skipped with a notice and siblings continue.

use crate::client::{CanvasClient, SubmissionInclude};
use crate::config::VersioningMode;
use crate::types::{Attachment, Submission};

/// One point-in-time submission to download, 1-indexed chronologically
#[derive(Clone, Debug)]
pub struct SubmissionVersion {
    /// Version number (1 = oldest in history, or the single latest version)
    pub number: u32,
    /// Submission timestamp in API format, if any
    pub submitted_at: Option<String>,
    /// Attachments on this version (never empty)
    pub attachments: Vec<Attachment>,
}

/// Resolve the versions to download for one student's submission
///
/// In `Latest` mode the per-user detail endpoint is fetched with attachments
/// included and, if attachments are present, treated as version 1. In
/// `AllVersions` mode the full history is fetched and each entry with
/// attachments becomes one version, numbered by its chronological position;
/// if the history is unavailable, the attachments already on the in-hand
/// submission are used as version 1.
pub async fn resolve_versions(
    client: &CanvasClient,
    mode: VersioningMode,
    assignment_id: u64,
    user_id: u64,
    submission: &Submission,
) -> Vec<SubmissionVersion> {
    match mode {
        VersioningMode::Latest => resolve_latest(client, assignment_id, user_id, submission).await,
        VersioningMode::AllVersions => {
            resolve_all_versions(client, assignment_id, user_id, submission).await
        }
    }
}

async fn resolve_latest(
    client: &CanvasClient,
    assignment_id: u64,
    user_id: u64,
    submission: &Submission,
) -> Vec<SubmissionVersion> {
    let detail = match client
        .get_submission(assignment_id, user_id, SubmissionInclude::Attachments)
        .await
    {
        Ok(detail) => detail,
        Err(e) => {
            tracing::warn!(
                user_id,
                assignment_id,
                error = %e,
                "failed to fetch submission details, skipping student"
            );
            return Vec::new();
        }
    };

    if detail.attachments.is_empty() {
        tracing::info!(user_id, "no attachments in latest submission");
        return Vec::new();
    }

    vec![SubmissionVersion {
        number: 1,
        submitted_at: submission.submitted_at.clone(),
        attachments: detail.attachments,
    }]
}

async fn resolve_all_versions(
    client: &CanvasClient,
    assignment_id: u64,
    user_id: u64,
    submission: &Submission,
) -> Vec<SubmissionVersion> {
    let history = match client
        .get_submission(assignment_id, user_id, SubmissionInclude::SubmissionHistory)
        .await
    {
        Ok(detail) => detail.submission_history,
        Err(e) => {
            tracing::warn!(
                user_id,
                assignment_id,
                error = %e,
                "failed to fetch submission history"
            );
            None
        }
    };

    let Some(history) = history.filter(|h| !h.is_empty()) else {
        // No history available; fall back to whatever the submission list
        // already gave us, treated as version 1.
        tracing::info!(user_id, "no submission history available");
        if submission.attachments.is_empty() {
            return Vec::new();
        }
        return vec![SubmissionVersion {
            number: 1,
            submitted_at: submission.submitted_at.clone(),
            attachments: submission.attachments.clone(),
        }];
    };

    tracing::info!(
        user_id,
        versions = history.len(),
        "found submission versions"
    );

    let mut versions = Vec::new();
    for (index, entry) in history.into_iter().enumerate() {
        let number = index as u32 + 1;
        if entry.attachments.is_empty() {
            tracing::info!(user_id, version = number, "no attachments in version");
            continue;
        }
        versions.push(SubmissionVersion {
            number,
            submitted_at: entry.submitted_at,
            attachments: entry.attachments,
        });
    }
    versions
}
