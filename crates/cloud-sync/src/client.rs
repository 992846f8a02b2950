//! Document API client for the Bloomtrack cloud.
//!
//! Documents are addressed by slash-separated paths (`users/{uid}/...`) under
//! `/v1/documents/`. Each path segment is percent-encoded.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tokio::time::sleep;

use bloomtrack_core::sync::{DocumentStore, ListQuery, RemoteDocument};

use crate::error::{CloudSyncError, Result};
use crate::types::*;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;
const REQUEST_MAX_ATTEMPTS: usize = 3;
const REQUEST_BASE_BACKOFF_MS: u64 = 200;
const REQUEST_MAX_BACKOFF_MS: u64 = 4_000;

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

fn is_retryable_transport_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}

fn backoff_with_jitter(attempt: usize) -> Duration {
    let exp = (attempt.saturating_sub(1) as u32).min(8);
    let backoff =
        (REQUEST_BASE_BACKOFF_MS.saturating_mul(1_u64 << exp)).min(REQUEST_MAX_BACKOFF_MS);
    let jitter = rand::thread_rng().gen_range(0..=(backoff / 5).max(1));
    Duration::from_millis(backoff.saturating_add(jitter))
}

/// Source of the bearer token sent with every request.
pub trait AccessTokenProvider: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

/// Fixed token read from configuration. `None` sends no `Authorization`.
#[derive(Debug, Clone, Default)]
pub struct StaticAccessToken(pub Option<String>);

impl AccessTokenProvider for StaticAccessToken {
    fn access_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Client for the document API.
#[derive(Clone)]
pub struct DocumentApiClient {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl DocumentApiClient {
    fn log_response(status: StatusCode, body: &str) {
        if status.is_success() {
            debug!("[CloudSync] response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("[CloudSync] response error ({}): {}", status, preview);
    }

    /// Create a client for `base_url` (e.g. "https://api.bloomtrack.app").
    pub fn new(base_url: &str, tokens: Arc<dyn AccessTokenProvider>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = self.tokens.access_token() {
            let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| CloudSyncError::auth("Invalid access token format"))?;
            headers.insert(AUTHORIZATION, auth_value);
        }

        Ok(headers)
    }

    fn document_url(&self, path: &str) -> Result<String> {
        let segments = path
            .split('/')
            .map(|segment| {
                if segment.is_empty() {
                    Err(CloudSyncError::invalid_request(format!(
                        "Empty segment in document path '{}'",
                        path
                    )))
                } else {
                    Ok(urlencoding::encode(segment).into_owned())
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("{}/v1/documents/{}", self.base_url, segments.join("/")))
    }

    fn error_from_body(status: StatusCode, body: &str) -> CloudSyncError {
        if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(body) {
            return CloudSyncError::api(
                status.as_u16(),
                format!("{}: {}", error.code, error.message),
            );
        }
        CloudSyncError::api(status.as_u16(), format!("Request failed: {}", body))
    }

    /// Parse a JSON response body.
    async fn parse_response<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(Self::error_from_body(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!(
                "[CloudSync] failed to deserialize response. Body: {}, Error: {}",
                body,
                e
            );
            CloudSyncError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    /// Check status only, discarding the body.
    async fn expect_success(response: Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            Self::log_response(status, "");
            return Ok(());
        }
        let body = response.text().await?;
        Self::log_response(status, &body);
        Err(Self::error_from_body(status, &body))
    }

    /// Send the request built by `build`, retrying transport failures and
    /// retryable statuses with jittered backoff. Non-retryable responses are
    /// returned to the caller untouched.
    async fn send_with_retry<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> Result<RequestBuilder>,
    {
        let mut attempt = 0usize;

        loop {
            attempt = attempt.saturating_add(1);

            match build()?.send().await {
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable_status(status.as_u16()) || attempt >= REQUEST_MAX_ATTEMPTS {
                        return Ok(response);
                    }
                    let body = response.text().await.unwrap_or_default();
                    Self::log_response(status, &body);
                    debug!(
                        "[CloudSync] retry attempt {}/{} after HTTP {}",
                        attempt + 1,
                        REQUEST_MAX_ATTEMPTS,
                        status.as_u16()
                    );
                    sleep(backoff_with_jitter(attempt)).await;
                }
                Err(err) => {
                    if is_retryable_transport_error(&err) && attempt < REQUEST_MAX_ATTEMPTS {
                        debug!(
                            "[CloudSync] retry attempt {}/{} after transport error: {}",
                            attempt + 1,
                            REQUEST_MAX_ATTEMPTS,
                            err
                        );
                        sleep(backoff_with_jitter(attempt)).await;
                        continue;
                    }
                    return Err(CloudSyncError::Http(err));
                }
            }
        }
    }

    /// Deep-merge `fields` into a document, creating it when missing.
    ///
    /// PATCH /v1/documents/{path}?merge=true
    pub async fn merge(&self, path: &str, fields: &Value) -> Result<DocumentResponse> {
        let url = format!("{}?merge=true", self.document_url(path)?);
        let body = MergeDocumentRequest { fields };

        let response = self
            .send_with_retry(|| Ok(self.client.patch(&url).headers(self.headers()?).json(&body)))
            .await?;

        Self::parse_response(response).await
    }

    /// Delete a document. A missing document is not an error.
    ///
    /// DELETE /v1/documents/{path}
    pub async fn delete(&self, path: &str) -> Result<()> {
        let url = self.document_url(path)?;

        let response = self
            .send_with_retry(|| Ok(self.client.delete(&url).headers(self.headers()?)))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("[CloudSync] delete of missing document {}", path);
            return Ok(());
        }
        Self::expect_success(response).await
    }

    /// Fetch a document, `None` when it does not exist.
    ///
    /// GET /v1/documents/{path}
    pub async fn get(&self, path: &str) -> Result<Option<DocumentResponse>> {
        let url = self.document_url(path)?;

        let response = self
            .send_with_retry(|| Ok(self.client.get(&url).headers(self.headers()?)))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::parse_response(response).await.map(Some)
    }

    /// List the documents directly inside a collection, ordered by creation
    /// time.
    ///
    /// GET /v1/documents/{collection}?orderBy=createTime&direction=desc&pageSize=N
    pub async fn list(
        &self,
        collection_path: &str,
        page_size: usize,
        direction: SortDirection,
    ) -> Result<Vec<DocumentResponse>> {
        let url = format!(
            "{}?orderBy=createTime&direction={}&pageSize={}",
            self.document_url(collection_path)?,
            direction.as_str(),
            page_size
        );

        debug!("[CloudSync] list URL: {}", url);

        let response = self
            .send_with_retry(|| Ok(self.client.get(&url).headers(self.headers()?)))
            .await?;

        let listed: ListDocumentsResponse = Self::parse_response(response).await?;
        Ok(listed.documents)
    }
}

#[async_trait]
impl DocumentStore for DocumentApiClient {
    async fn merge_document(&self, path: &str, fields: Value) -> bloomtrack_core::Result<()> {
        self.merge(path, &fields).await?;
        Ok(())
    }

    async fn delete_document(&self, path: &str) -> bloomtrack_core::Result<()> {
        Ok(self.delete(path).await?)
    }

    async fn get_document(&self, path: &str) -> bloomtrack_core::Result<Option<RemoteDocument>> {
        Ok(self.get(path).await?.map(RemoteDocument::from))
    }

    async fn list_documents(
        &self,
        collection_path: &str,
        query: ListQuery,
    ) -> bloomtrack_core::Result<Vec<RemoteDocument>> {
        let direction = if query.newest_first {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        let documents = self.list(collection_path, query.limit, direction).await?;
        Ok(documents
            .into_iter()
            .take(query.limit)
            .map(RemoteDocument::from)
            .collect())
    }
}
