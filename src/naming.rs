//! Attachment filtering and deterministic output naming
//!
//! Output filenames encode the student, version, and submission timestamp:
//! `{user_name}_{user_id}_v{version}_{timestamp}_{original_filename}`.
//! Idempotence is path-based: a target whose path already exists is skipped
//! without re-verifying content.

use crate::config::FilterConfig;
use crate::types::Attachment;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// Format the API expects for submission timestamps
const API_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Format used inside output filenames
const FILENAME_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// One file to fetch, with its resolved output path
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadTarget {
    /// Derived output filename
    pub filename: String,
    /// Source URL
    pub url: String,
    /// Full output path under the assignment directory
    pub path: PathBuf,
}

/// Decision made for one attachment
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetDecision {
    /// Fetch this file
    Download(DownloadTarget),
    /// Extension is excluded by policy; make no request, log nothing
    SkipExcluded {
        /// Original attachment filename
        filename: String,
    },
    /// Target path already exists on disk; make no request
    SkipExisting {
        /// Derived output filename
        filename: String,
    },
}

/// Render an API timestamp for use in a filename
///
/// Absent timestamps become `no_date`, unparseable ones `invalid_date`.
/// Never fails: a bad timestamp must not cost a student their download.
pub fn format_timestamp(submitted_at: Option<&str>) -> String {
    match submitted_at {
        None => "no_date".to_string(),
        Some(raw) => match NaiveDateTime::parse_from_str(raw, API_TIMESTAMP_FORMAT) {
            Ok(parsed) => parsed.format(FILENAME_TIMESTAMP_FORMAT).to_string(),
            Err(_) => "invalid_date".to_string(),
        },
    }
}

/// Make a course/assignment/file name safe to use as a path component
pub fn sanitize_component(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

/// Make a user display name safe and space-free for filenames
pub fn sanitize_user_name(name: &str) -> String {
    sanitize_component(&name.replace(' ', "_"))
}

/// Decide what to do with each attachment of one submission version
pub fn plan_attachments(
    attachments: &[Attachment],
    user_name: &str,
    user_id: u64,
    version: u32,
    submitted_at: &str,
    dir: &Path,
    filter: &FilterConfig,
) -> Vec<TargetDecision> {
    let mut decisions = Vec::with_capacity(attachments.len());

    for attachment in attachments {
        let original = attachment.filename_or_default();

        let Some(url) = attachment.url.as_deref() else {
            tracing::warn!(filename = original, "attachment has no download URL, skipping");
            continue;
        };

        if filter.is_excluded(original) {
            tracing::info!(filename = original, "skipping file (excluded type)");
            decisions.push(TargetDecision::SkipExcluded {
                filename: original.to_string(),
            });
            continue;
        }

        let filename = sanitize_component(&format!(
            "{user_name}_{user_id}_v{version}_{submitted_at}_{original}"
        ));
        let path = dir.join(&filename);

        if path.exists() {
            tracing::info!(filename = %filename, "file already exists, skipping");
            decisions.push(TargetDecision::SkipExisting { filename });
            continue;
        }

        decisions.push(TargetDecision::Download(DownloadTarget {
            filename,
            url: url.to_string(),
            path,
        }));
    }

    decisions
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;

    fn attachment(filename: &str, url: &str) -> Attachment {
        Attachment {
            filename: Some(filename.to_string()),
            url: Some(url.to_string()),
        }
    }

    #[test]
    fn timestamp_formats_api_value() {
        assert_eq!(
            format_timestamp(Some("2024-03-01T10:00:00Z")),
            "20240301_100000"
        );
    }

    #[test]
    fn timestamp_absent_becomes_no_date() {
        assert_eq!(format_timestamp(None), "no_date");
    }

    #[test]
    fn timestamp_garbage_becomes_invalid_date() {
        assert_eq!(format_timestamp(Some("garbage")), "invalid_date");
        assert_eq!(format_timestamp(Some("2024-03-01")), "invalid_date");
    }

    #[test]
    fn sanitize_replaces_path_separators() {
        assert_eq!(sanitize_component("CS 101/Section A"), "CS 101_Section A");
        assert_eq!(sanitize_user_name("Ada Lovelace"), "Ada_Lovelace");
    }

    #[test]
    fn excluded_extension_is_skipped_without_target() {
        let dir = tempfile::tempdir().unwrap();
        let attachments = vec![
            attachment("lecture.MP4", "https://f/1"),
            attachment("report.pdf", "https://f/2"),
        ];

        let decisions = plan_attachments(
            &attachments,
            "Ada_Lovelace",
            9,
            1,
            "20240301_100000",
            dir.path(),
            &FilterConfig::default(),
        );

        assert_eq!(decisions.len(), 2);
        assert_eq!(
            decisions[0],
            TargetDecision::SkipExcluded {
                filename: "lecture.MP4".into()
            }
        );
        match &decisions[1] {
            TargetDecision::Download(target) => {
                assert_eq!(target.filename, "Ada_Lovelace_9_v1_20240301_100000_report.pdf");
                assert_eq!(target.url, "https://f/2");
                assert_eq!(target.path, dir.path().join(&target.filename));
            }
            other => panic!("expected Download decision, got {other:?}"),
        }
    }

    #[test]
    fn existing_path_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let filename = "Ada_Lovelace_9_v2_20240301_100000_report.pdf";
        std::fs::write(dir.path().join(filename), b"already here").unwrap();

        let decisions = plan_attachments(
            &[attachment("report.pdf", "https://f/2")],
            "Ada_Lovelace",
            9,
            2,
            "20240301_100000",
            dir.path(),
            &FilterConfig::default(),
        );

        assert_eq!(
            decisions,
            vec![TargetDecision::SkipExisting {
                filename: filename.into()
            }]
        );
    }

    #[test]
    fn attachment_without_url_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let no_url = Attachment {
            filename: Some("orphan.pdf".into()),
            url: None,
        };

        let decisions = plan_attachments(
            &[no_url],
            "Ada_Lovelace",
            9,
            1,
            "no_date",
            dir.path(),
            &FilterConfig::default(),
        );

        assert!(decisions.is_empty());
    }

    #[test]
    fn filename_with_separator_is_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let decisions = plan_attachments(
            &[attachment("notes/week1.pdf", "https://f/5")],
            "Ada_Lovelace",
            9,
            1,
            "no_date",
            dir.path(),
            &FilterConfig::default(),
        );

        match &decisions[0] {
            TargetDecision::Download(target) => {
                assert!(!target.filename.contains('/'));
                assert_eq!(target.filename, "Ada_Lovelace_9_v1_no_date_notes_week1.pdf");
            }
            other => panic!("expected Download decision, got {other:?}"),
        }
    }
}
