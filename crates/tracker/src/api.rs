//! Client for the job-launching service.
//!
//! [`JobService`] is the seam the tracker talks through: one call to
//! launch a command, one call to query its status. [`HttpJobService`]
//! implements it over plain request/response HTTP using [`reqwest`].

use async_trait::async_trait;
use cmdwatch_core::{CommandResponse, CorrelationId};

use crate::config::TrackerConfig;

/// Errors from the job-service transport layer.
#[derive(Debug, thiserror::Error)]
pub enum JobServiceError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, body).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The configured base URL cannot carry path segments.
    #[error("Invalid job service URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The service returned a non-2xx status code.
    #[error("Job service error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// Launch and status endpoints of the backend.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Submit a launch request. `path` selects the operation, `body` is
    /// its JSON payload.
    async fn launch(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<CommandResponse, JobServiceError>;

    /// Query the current status of one command.
    async fn poll(&self, id: &CorrelationId) -> Result<CommandResponse, JobServiceError>;
}

/// HTTP implementation of [`JobService`].
pub struct HttpJobService {
    client: reqwest::Client,
    api_url: reqwest::Url,
    poll_path: Vec<String>,
}

impl HttpJobService {
    /// Build a client from the tracker configuration, applying the
    /// configured per-request timeout.
    pub fn new(config: &TrackerConfig) -> Result<Self, JobServiceError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Self::with_client(client, config)
    }

    /// Create a service reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        config: &TrackerConfig,
    ) -> Result<Self, JobServiceError> {
        let invalid = |reason: String| JobServiceError::InvalidUrl {
            url: config.api_url.clone(),
            reason,
        };

        let api_url =
            reqwest::Url::parse(&config.api_url).map_err(|e| invalid(e.to_string()))?;
        if api_url.cannot_be_a_base() {
            return Err(invalid("not a base URL".into()));
        }

        let poll_path = config
            .poll_path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            client,
            api_url,
            poll_path,
        })
    }

    /// Launch paths are caller-supplied and may carry a query string, so
    /// they are appended as-is.
    fn launch_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// `{api_url}/{poll_path}/{id}` with the id percent-encoded as a single
    /// path segment.
    fn poll_url(&self, id: &CorrelationId) -> Result<reqwest::Url, JobServiceError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| JobServiceError::InvalidUrl {
                url: self.api_url.to_string(),
                reason: "not a base URL".into(),
            })?
            .pop_if_empty()
            .extend(&self.poll_path)
            .push(id.as_str());
        Ok(url)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, or turn it into
    /// [`JobServiceError::ApiError`] carrying the status and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, JobServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(JobServiceError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, JobServiceError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl JobService for HttpJobService {
    async fn launch(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<CommandResponse, JobServiceError> {
        let response = self
            .client
            .post(self.launch_url(path))
            .json(body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn poll(&self, id: &CorrelationId) -> Result<CommandResponse, JobServiceError> {
        let url = self.poll_url(id)?;
        let response = self.client.get(url).send().await?;

        Self::parse_response(response).await
    }
}
