//! Authenticated Canvas REST client and file download engine
//!
//! One reqwest client carries the bearer token for both API calls and file
//! downloads. List endpoints follow Canvas `Link: rel="next"` pagination, and
//! every request routes through the retry policy so 429s back off uniformly.

use crate::config::{ApiConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::retry_with_backoff;
use crate::types::{Assignment, Course, Submission, User};
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Page size requested from list endpoints
const PER_PAGE: &str = "100";

/// Which extra data to request on the per-user submission endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionInclude {
    /// Attachments on the latest submission
    Attachments,
    /// The full resubmission history
    SubmissionHistory,
}

impl SubmissionInclude {
    /// Value for the `include[]` query parameter
    pub fn as_param(self) -> &'static str {
        match self {
            SubmissionInclude::Attachments => "attachments",
            SubmissionInclude::SubmissionHistory => "submission_history",
        }
    }
}

/// HTTP client for one Canvas course
#[derive(Clone, Debug)]
pub struct CanvasClient {
    http: reqwest::Client,
    base_url: String,
    course_id: u64,
    retry: RetryConfig,
}

impl CanvasClient {
    /// Build a client holding the bearer token as a default header
    pub fn new(api: &ApiConfig, retry: RetryConfig) -> Result<Self> {
        let mut auth =
            HeaderValue::from_str(&format!("Bearer {}", api.token)).map_err(|_| Error::Config {
                message: "API token contains characters not valid in an HTTP header".into(),
                key: Some("CANVAS_API_KEY".into()),
            })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);

        let http = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            course_id: api.course_id,
            retry,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!(
            "{}/api/v1/courses/{}{}",
            self.base_url, self.course_id, path
        ))?)
    }

    /// Fetch the course record (run-fatal if this fails)
    pub async fn get_course(&self) -> Result<Course> {
        let url = self.endpoint("")?;
        self.get_json(&url, &[]).await
    }

    /// List all assignments in the course, following pagination
    pub async fn list_assignments(&self) -> Result<Vec<Assignment>> {
        let url = self.endpoint("/assignments")?;
        self.get_paginated(url, &[("per_page", PER_PAGE)]).await
    }

    /// List all student submissions for one assignment, following pagination
    pub async fn list_submissions(&self, assignment_id: u64) -> Result<Vec<Submission>> {
        let url = self.endpoint(&format!("/assignments/{assignment_id}/submissions"))?;
        self.get_paginated(url, &[("per_page", PER_PAGE)]).await
    }

    /// Look up a user within the course, for output file naming
    pub async fn get_user(&self, user_id: u64) -> Result<User> {
        let url = self.endpoint(&format!("/users/{user_id}"))?;
        self.get_json(&url, &[]).await
    }

    /// Fetch one student's submission with the requested include
    pub async fn get_submission(
        &self,
        assignment_id: u64,
        user_id: u64,
        include: SubmissionInclude,
    ) -> Result<Submission> {
        let url = self.endpoint(&format!("/assignments/{assignment_id}/submissions/{user_id}"))?;
        self.get_json(&url, &[("include[]", include.as_param())])
            .await
    }

    /// Download a file to `dest`, streaming the body in chunks
    ///
    /// 429 responses are retried up to the configured budget, honoring the
    /// `Retry-After` header. Any other non-success status fails immediately.
    /// A partially written file is left in place if the stream is interrupted.
    pub async fn download_file(&self, url: &str, dest: &Path) -> Result<()> {
        let target = Url::parse(url)?;
        retry_with_backoff(&self.retry, || self.download_once(&target, dest)).await
    }

    async fn download_once(&self, url: &Url, dest: &Path) -> Result<()> {
        let mut response = self.http.get(url.clone()).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited {
                retry_after: self.retry_after_from(response.headers()),
            });
        }
        if !status.is_success() {
            return Err(Error::Download {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        tracing::info!(path = %dest.display(), "downloaded");
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url, query: &[(&str, &str)]) -> Result<T> {
        retry_with_backoff(&self.retry, || self.get_json_once(url, query)).await
    }

    async fn get_json_once<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let response = self.http.get(url.clone()).query(query).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited {
                retry_after: self.retry_after_from(response.headers()),
            });
        }
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.json::<T>().await?)
    }

    async fn get_paginated<T: DeserializeOwned>(
        &self,
        first: Url,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page_url = Some(first);
        // Next-page links already carry their query string
        let mut query = Some(query);

        while let Some(url) = page_url {
            let page_query = query.take().unwrap_or(&[]);
            let (page, next) =
                retry_with_backoff(&self.retry, || self.get_page_once::<T>(&url, page_query))
                    .await?;
            items.extend(page);
            page_url = next;
        }

        Ok(items)
    }

    async fn get_page_once<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, &str)],
    ) -> Result<(Vec<T>, Option<Url>)> {
        let response = self.http.get(url.clone()).query(query).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited {
                retry_after: self.retry_after_from(response.headers()),
            });
        }
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let next = next_page_link(response.headers());
        Ok((response.json::<Vec<T>>().await?, next))
    }

    fn retry_after_from(&self, headers: &HeaderMap) -> Duration {
        headers
            .get(header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.retry.default_retry_after)
    }
}

/// Extract the `rel="next"` target from a Canvas `Link` header
fn next_page_link(headers: &HeaderMap) -> Option<Url> {
    let raw = headers.get(header::LINK)?.to_str().ok()?;

    for entry in raw.split(',') {
        let mut sections = entry.trim().splitn(2, ';');
        let target = sections.next().unwrap_or("").trim();
        let params = sections.next().unwrap_or("");

        if !params.split(';').any(|p| p.trim() == "rel=\"next\"") {
            continue;
        }
        if let Some(inner) = target.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
            return Url::parse(inner).ok();
        }
    }
    None
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base: &str) -> CanvasClient {
        let api = ApiConfig {
            base_url: base.trim_end_matches('/').to_string(),
            token: "test-token".into(),
            course_id: 77,
        };
        let retry = RetryConfig {
            max_attempts: 2,
            default_retry_after: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            jitter: false,
        };
        CanvasClient::new(&api, retry).unwrap()
    }

    #[tokio::test]
    async fn get_course_sends_bearer_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/courses/77"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": 77, "name": "Intro to Rust"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let course = client.get_course().await.unwrap();

        assert_eq!(course.id, 77);
        assert_eq!(course.name, "Intro to Rust");
    }

    #[tokio::test]
    async fn list_assignments_follows_pagination() {
        let mock_server = MockServer::start().await;

        let next = format!("{}/api/v1/courses/77/assignments?page=2", mock_server.uri());
        let link = format!("<{next}>; rel=\"next\"");

        Mock::given(method("GET"))
            .and(path("/api/v1/courses/77/assignments"))
            .and(query_param("per_page", "100"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Link", link.as_str())
                    .set_body_json(serde_json::json!([
                        {"id": 1, "name": "Essay", "published": true,
                         "submission_types": ["online_upload"]}
                    ])),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v1/courses/77/assignments"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 2, "name": "Project", "published": false,
                 "submission_types": ["online_upload"]}
            ])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let assignments = client.list_assignments().await.unwrap();

        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments[0].id, 1);
        assert_eq!(assignments[1].id, 2);
    }

    #[tokio::test]
    async fn get_submission_requests_the_include() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/courses/77/assignments/5/submissions/9"))
            .and(query_param("include[]", "submission_history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "user_id": 9,
                "submission_history": [
                    {"user_id": 9, "submitted_at": "2024-03-01T10:00:00Z",
                     "attachments": [{"filename": "final.pdf", "url": "https://f/2"}]}
                ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let submission = client
            .get_submission(5, 9, SubmissionInclude::SubmissionHistory)
            .await
            .unwrap();

        assert_eq!(submission.submission_history.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn api_fetch_recovers_from_one_429() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/courses/77"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v1/courses/77"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": 77, "name": "Intro"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let course = client.get_course().await.unwrap();
        assert_eq!(course.name, "Intro");
    }

    #[tokio::test]
    async fn download_recovers_from_one_429() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/files/1"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/files/1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"file contents".to_vec()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("essay.pdf");

        let client = test_client(&mock_server.uri());
        client
            .download_file(&format!("{}/files/1", mock_server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"file contents");
    }

    #[tokio::test]
    async fn download_gives_up_after_retry_budget() {
        let mock_server = MockServer::start().await;

        // Initial attempt + 2 retries with max_attempts = 2
        Mock::given(method("GET"))
            .and(path("/files/2"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .expect(3)
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("essay.pdf");

        let client = test_client(&mock_server.uri());
        let err = client
            .download_file(&format!("{}/files/2", mock_server.uri()), &dest)
            .await
            .unwrap_err();

        assert_eq!(err.http_status(), Some(429));
    }

    #[tokio::test]
    async fn download_fails_immediately_on_other_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/files/3"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("essay.pdf");

        let client = test_client(&mock_server.uri());
        let err = client
            .download_file(&format!("{}/files/3", mock_server.uri()), &dest)
            .await
            .unwrap_err();

        match err {
            Error::Download { status, .. } => assert_eq!(status, 403),
            other => panic!("expected Download error, got {other}"),
        }
    }

    #[test]
    fn next_page_link_parses_canvas_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::LINK,
            HeaderValue::from_static(
                "<https://c.example.com/api/v1/courses/1/assignments?page=1>; rel=\"current\", \
                 <https://c.example.com/api/v1/courses/1/assignments?page=2>; rel=\"next\", \
                 <https://c.example.com/api/v1/courses/1/assignments?page=4>; rel=\"last\"",
            ),
        );

        let next = next_page_link(&headers).unwrap();
        assert_eq!(
            next.as_str(),
            "https://c.example.com/api/v1/courses/1/assignments?page=2"
        );
    }

    #[test]
    fn next_page_link_absent_on_last_page() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::LINK,
            HeaderValue::from_static(
                "<https://c.example.com/api/v1/courses/1/assignments?page=4>; rel=\"last\"",
            ),
        );
        assert!(next_page_link(&headers).is_none());
        assert!(next_page_link(&HeaderMap::new()).is_none());
    }
}
