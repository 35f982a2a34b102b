//! Append-only failure log
//!
//! One line per failed download, written from concurrent workers. The file
//! handle lives behind an async mutex so appends from different submissions
//! never interleave within a line.

use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Shared, concurrency-safe failure log
#[derive(Clone, Debug)]
pub struct FailureLog {
    path: PathBuf,
    file: Arc<Mutex<tokio::fs::File>>,
}

impl FailureLog {
    /// Open (or create) the log at `path` in append mode
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    /// Record one failed download
    ///
    /// Line format: `[{timestamp}] Failed: {filename}, URL: {url}, Status Code: {code}`
    pub async fn append(&self, filename: &str, url: &str, status: Option<u16>) -> Result<()> {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let status = status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let line = format!("[{timestamp}] Failed: {filename}, URL: {url}, Status Code: {status}\n");

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Path of the log file, for the completion notice
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_writes_expected_line_format() {
        let dir = tempfile::tempdir().unwrap();
        let log = FailureLog::create(dir.path().join("failed_downloads.txt"))
            .await
            .unwrap();

        log.append("essay.pdf", "https://f/1", Some(503))
            .await
            .unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert!(
            contents.contains("Failed: essay.pdf, URL: https://f/1, Status Code: 503"),
            "unexpected log line: {contents}"
        );
        assert!(contents.starts_with('['), "line should start with timestamp");
    }

    #[tokio::test]
    async fn missing_status_is_recorded_as_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let log = FailureLog::create(dir.path().join("failed_downloads.txt"))
            .await
            .unwrap();

        log.append("essay.pdf", "https://f/1", None).await.unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert!(contents.contains("Status Code: unknown"));
    }

    #[tokio::test]
    async fn concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let log = FailureLog::create(dir.path().join("failed_downloads.txt"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..50 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                log.append(&format!("file_{i}.pdf"), "https://f/x", Some(429))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 50);
        for line in lines {
            assert!(line.starts_with('['), "corrupted line: {line}");
            assert!(line.ends_with("Status Code: 429"), "corrupted line: {line}");
        }
    }

    #[tokio::test]
    async fn create_appends_to_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failed_downloads.txt");
        std::fs::write(&path, "[old] Failed: a, URL: b, Status Code: 1\n").unwrap();

        let log = FailureLog::create(&path).await.unwrap();
        log.append("c.pdf", "https://f/2", Some(500)).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.starts_with("[old]"));
    }
}
