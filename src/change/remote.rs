//! HTTP client for an external change-management service.
//!
//! Issues `GET {base}/api/changes/{id}` with a bounded timeout. Status mapping:
//! - 404: [`ChangeError::NotFound`]
//! - any other non-2xx: [`ChangeError::Transport`] carrying the status
//! - 2xx: body decoded as a [`ChangeRecord`]; decode failures are transport errors

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use tracing::{debug, instrument};

use super::{ChangeError, ChangeRecord, ChangeValidator};

/// Upper bound on a single change lookup, connect time included
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Change validator backed by a remote HTTP service.
#[derive(Clone, Debug)]
pub struct RemoteValidator {
    base_url: Url,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl RemoteValidator {
    /// Create a client for the service at `base_url` with the default timeout.
    pub fn new(base_url: Url, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        Self::with_timeout(base_url, api_key, LOOKUP_TIMEOUT)
    }

    /// Create a client with a custom lookup timeout.
    pub fn with_timeout(
        base_url: Url,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            api_key,
            timeout,
            client,
        })
    }

    /// URL of the change record for `change_id`.
    ///
    /// The identifier is appended as a single, percent-encoded path segment.
    pub fn change_url(&self, change_id: &str) -> Result<Url, ChangeError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ChangeError::Transport(format!(
                    "change service URL {} cannot be used as a base",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["api", "changes", change_id]);
        Ok(url)
    }

    fn request_error(&self, err: reqwest::Error) -> ChangeError {
        if err.is_timeout() {
            ChangeError::Transport(format!(
                "external service did not respond within {:?}",
                self.timeout
            ))
        } else {
            ChangeError::Transport(format!("failed to call external service: {}", err))
        }
    }
}

#[async_trait]
impl ChangeValidator for RemoteValidator {
    fn backend(&self) -> &'static str {
        "remote"
    }

    #[instrument(skip(self), fields(backend = "remote"))]
    async fn lookup(&self, change_id: &str) -> Result<ChangeRecord, ChangeError> {
        let url = self.change_url(change_id)?;
        debug!(url = %url, "Fetching change record");

        let mut request = self
            .client
            .get(url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| self.request_error(e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ChangeError::NotFound);
        }
        if !status.is_success() {
            return Err(ChangeError::Transport(format!(
                "external service returned status {}",
                status.as_u16()
            )));
        }

        let body = response.bytes().await.map_err(|e| self.request_error(e))?;
        serde_json::from_slice::<ChangeRecord>(&body)
            .map_err(|e| ChangeError::Transport(format!("failed to parse response: {}", e)))
    }
}
