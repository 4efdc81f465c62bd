//! HTTP page fetching, centralized retry policy and the remote store client.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bookaward_core::RawPage;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{info_span, warn, Instrument};

pub mod store;

pub use store::{AirtableConfig, AirtableStore, ListFilter, RemoteRow, RemoteStore, WriteError};

pub const CRATE_NAME: &str = "bookaward-storage";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; bookaward-sync/0.1)";

/// Errors worth another attempt are transient; everything else is permanent.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retryable,
    NonRetryable,
}

pub fn classify_status(status: StatusCode) -> RetryDisposition {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl BackoffPolicy {
    pub fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt_index as u32).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        delay.min(self.max_delay)
    }
}

/// Single place that decides how often fetch, list and write calls are repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub backoff: BackoffPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0usize;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt + 1 < attempts => {
                    let delay = self.backoff.delay_for_attempt(attempt);
                    warn!(
                        label,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out for {url}")]
    Timeout { url: String },
    #[error("http status {status} for {url}")]
    Http4xx { status: u16, url: String },
    #[error("http status {status} for {url}")]
    Http5xx { status: u16, url: String },
    #[error("connection error for {url}: {message}")]
    Connection { url: String, message: String },
}

impl FetchError {
    /// Short reason recorded against the URL in the manifest.
    pub fn reason(&self) -> String {
        match self {
            FetchError::Timeout { .. } => "timeout".to_string(),
            FetchError::Http4xx { status: 403, .. } => "403 Forbidden".to_string(),
            FetchError::Http4xx { status, .. } | FetchError::Http5xx { status, .. } => {
                format!("HTTP {status}")
            }
            FetchError::Connection { .. } => "connection error".to_string(),
        }
    }

    fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Connection {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    fn from_status(url: &str, status: StatusCode) -> Self {
        if status.is_server_error() {
            FetchError::Http5xx {
                status: status.as_u16(),
                url: url.to_string(),
            }
        } else {
            FetchError::Http4xx {
                status: status.as_u16(),
                url: url.to_string(),
            }
        }
    }
}

impl Retryable for FetchError {
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Connection { .. } => true,
            FetchError::Http5xx { .. } => true,
            FetchError::Http4xx { status, .. } => *status == 429,
        }
    }
}

/// Prefix `https://` when the manifest entry has no scheme.
pub fn ensure_scheme(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RawPage, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
        }
    }
}

/// One attempt per call; callers wrap it in a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout)
            .default_headers(headers)
            .user_agent(
                config
                    .user_agent
                    .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            )
            .build()
            .context("building reqwest client")?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<RawPage, FetchError> {
        let url = ensure_scheme(url);
        let span = info_span!("http_fetch", url = %url);
        async {
            let resp = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|err| FetchError::from_reqwest(&url, err))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::from_status(&url, status));
            }
            let final_url = resp.url().to_string();
            let html = resp
                .text()
                .await
                .map_err(|err| FetchError::from_reqwest(&url, err))?;
            Ok(RawPage {
                url: final_url,
                html,
                fetched_at: Utc::now(),
            })
        }
        .instrument(span)
        .await
    }
}
