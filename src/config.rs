//! Configuration types for canvas-submission-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::PathBuf, time::Duration};

/// Canvas API connection settings
///
/// The three values every run needs: where the Canvas instance lives, the
/// bearer token to authenticate with, and which course to pull from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the Canvas instance (e.g. "https://school.instructure.com")
    pub base_url: String,

    /// Static bearer token for the Authorization header
    pub token: String,

    /// Numeric ID of the course to download submissions from
    pub course_id: u64,
}

/// Output directory settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for downloaded submissions (default: "submissions")
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
        }
    }
}

/// Attachment filtering policy
///
/// Attachments whose extension is in the exclusion set are skipped silently.
/// A skipped attachment is a deliberate policy choice, not a failure, so it
/// never produces a failure-log entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilterConfig {
    /// File extensions to skip, stored lowercase without the leading dot
    /// (default: {"mp4"})
    #[serde(default = "default_excluded_extensions")]
    pub excluded_extensions: HashSet<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            excluded_extensions: default_excluded_extensions(),
        }
    }
}

impl FilterConfig {
    /// Whether a filename's extension is in the exclusion set (case-insensitive)
    pub fn is_excluded(&self, filename: &str) -> bool {
        std::path::Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.excluded_extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }
}

/// Which submission versions to download for each student
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersioningMode {
    /// Only the latest submission, always treated as version 1
    Latest,
    /// Every version in the student's resubmission history (default)
    #[default]
    AllVersions,
}

/// Retry configuration for rate-limited requests
///
/// A 429 response carries the server's `Retry-After` hint, which takes
/// precedence over the exponential backoff computed from these settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the initial request (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff used when the server sends no Retry-After header (default: 5 seconds)
    #[serde(default = "default_retry_after", with = "duration_serde")]
    pub default_retry_after: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to computed delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            default_retry_after: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Main configuration for [`SubmissionDownloader`](crate::SubmissionDownloader)
///
/// Constructed explicitly and passed to each component, so there is no
/// process-global state and components can be tested in isolation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Canvas API connection settings
    pub api: ApiConfig,

    /// Output directory settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Attachment filtering policy
    #[serde(default)]
    pub filter: FilterConfig,

    /// Retry/backoff policy for rate-limited requests
    #[serde(default)]
    pub retry: RetryConfig,

    /// Which submission versions to download
    #[serde(default)]
    pub versioning: VersioningMode,

    /// Size of the worker pool processing submissions (default: 10)
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Fixed delay before each submission is resolved, to reduce load on
    /// the remote API (default: 500 ms)
    #[serde(default = "default_submission_delay", with = "duration_serde")]
    pub submission_delay: Duration,
}

impl Config {
    /// Create a configuration with defaults for everything but the API settings
    pub fn new(api: ApiConfig) -> Self {
        Self {
            api,
            output: OutputConfig::default(),
            filter: FilterConfig::default(),
            retry: RetryConfig::default(),
            versioning: VersioningMode::default(),
            max_workers: default_max_workers(),
            submission_delay: default_submission_delay(),
        }
    }

    /// Load configuration from the process environment
    ///
    /// Required: `CANVAS_API_URL`, `CANVAS_API_KEY`, `CANVAS_COURSE_ID`.
    /// Optional overrides: `CANVAS_ALL_VERSIONS` (bool),
    /// `CANVAS_EXCLUDED_EXTENSIONS` (comma-separated), `CANVAS_MAX_WORKERS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// `from_env` delegates here; tests supply a map instead of mutating
    /// the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = require(&lookup, "CANVAS_API_URL")?;
        let token = require(&lookup, "CANVAS_API_KEY")?;
        let course_id = require(&lookup, "CANVAS_COURSE_ID")?
            .parse::<u64>()
            .map_err(|_| Error::Config {
                message: "CANVAS_COURSE_ID must be a numeric course ID".into(),
                key: Some("CANVAS_COURSE_ID".into()),
            })?;

        let mut config = Self::new(ApiConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            course_id,
        });

        if let Some(raw) = lookup("CANVAS_ALL_VERSIONS") {
            config.versioning = match raw.to_lowercase().as_str() {
                "true" | "1" | "yes" => VersioningMode::AllVersions,
                "false" | "0" | "no" => VersioningMode::Latest,
                _ => {
                    return Err(Error::Config {
                        message: format!("CANVAS_ALL_VERSIONS must be a boolean, got {raw:?}"),
                        key: Some("CANVAS_ALL_VERSIONS".into()),
                    });
                }
            };
        }

        if let Some(raw) = lookup("CANVAS_EXCLUDED_EXTENSIONS") {
            config.filter.excluded_extensions = raw
                .split(',')
                .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect();
        }

        if let Some(raw) = lookup("CANVAS_MAX_WORKERS") {
            config.max_workers = raw.parse::<usize>().ok().filter(|n| *n > 0).ok_or_else(|| {
                Error::Config {
                    message: format!("CANVAS_MAX_WORKERS must be a positive integer, got {raw:?}"),
                    key: Some("CANVAS_MAX_WORKERS".into()),
                }
            })?;
        }

        Ok(config)
    }
}

fn require(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| Error::Config {
            message: format!("{key} is not set"),
            key: Some(key.to_string()),
        })
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("submissions")
}

fn default_excluded_extensions() -> HashSet<String> {
    ["mp4".to_string()].into_iter().collect()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_after() -> Duration {
    Duration::from_secs(5)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_max_workers() -> usize {
    10
}

fn default_submission_delay() -> Duration {
    Duration::from_millis(500)
}

// Duration serialization helper (stored as whole milliseconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
