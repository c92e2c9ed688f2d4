use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use survey_core::model::{AnswerValue, Submission, SubmissionId};

use crate::error::SubmissionCacheError;

/// Credentials for the remote submissions API.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub token: String,
}

impl Credentials {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub page_size: usize,
    /// Courtesy delay between page requests.
    pub page_delay: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            page_size: 100,
            page_delay: Duration::from_millis(500),
        }
    }
}

impl ApiConfig {
    /// Reads `SURVEY_API_BASE_URL`, `SURVEY_API_PAGE_SIZE` and
    /// `SURVEY_API_PAGE_DELAY_MS`, falling back to defaults for
    /// anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let base_url = env::var("SURVEY_API_BASE_URL").unwrap_or(defaults.base_url);
        let page_size = env::var("SURVEY_API_PAGE_SIZE")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(defaults.page_size);
        let page_delay = env::var("SURVEY_API_PAGE_DELAY_MS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .map_or(defaults.page_delay, Duration::from_millis);
        Self {
            base_url,
            page_size,
            page_delay,
        }
    }
}

/// One page of the remote dataset. The seam is a trait so tests can
/// substitute a scripted source for the HTTP client.
#[async_trait]
pub trait SubmissionSource: Send + Sync {
    /// Fetch one page, zero-indexed.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionCacheError::Auth` for rejected credentials,
    /// `RateLimited` for upstream throttling, and transport/decoding
    /// errors otherwise.
    async fn fetch_page(
        &self,
        credentials: &Credentials,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<Submission>, SubmissionCacheError>;
}

/// HTTP client for the paginated submissions endpoint.
#[derive(Clone)]
pub struct HttpSubmissionApi {
    client: Client,
    config: ApiConfig,
}

impl HttpSubmissionApi {
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }
}

#[async_trait]
impl SubmissionSource for HttpSubmissionApi {
    async fn fetch_page(
        &self,
        credentials: &Credentials,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<Submission>, SubmissionCacheError> {
        let url = format!(
            "{}/submissions",
            self.config.base_url.trim_end_matches('/')
        );
        debug!(page, page_size, "requesting submission page");

        let response = self
            .client
            .get(url)
            .query(&[("page", page), ("size", page_size)])
            .bearer_auth(&credentials.token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SubmissionCacheError::Auth);
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse().ok());
                return Err(SubmissionCacheError::RateLimited { retry_after });
            }
            status if !status.is_success() => {
                return Err(SubmissionCacheError::Status(status));
            }
            _ => {}
        }

        let body: PageBody = response.json().await?;
        body.content
            .into_iter()
            .map(SubmissionDto::into_submission)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct PageBody {
    content: Vec<SubmissionDto>,
}

#[derive(Debug, Deserialize)]
struct SubmissionDto {
    id: String,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
    answers: BTreeMap<String, AnswerDto>,
}

#[derive(Debug, Deserialize)]
struct AnswerDto {
    name: String,
    #[serde(rename = "rawValue")]
    raw_value: String,
}

impl SubmissionDto {
    fn into_submission(self) -> Result<Submission, SubmissionCacheError> {
        if self.id.trim().is_empty() {
            return Err(SubmissionCacheError::Decode(
                "submission without an id".into(),
            ));
        }
        let answers = self
            .answers
            .into_iter()
            .map(|(field_id, answer)| {
                (field_id, AnswerValue::new(answer.name, answer.raw_value))
            })
            .collect();
        Ok(Submission {
            id: SubmissionId::new(self.id),
            created_at: self.created_at,
            answers,
        })
    }
}
