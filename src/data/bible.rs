//! bible-api.com verse lookup client
//!
//! Fetches passage text for a canonical reference. Connection failures,
//! timeouts and 5xx responses are retried with a linear backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{info, warn};

use super::Verse;
use crate::config::BibleConfig;
use crate::reference::CanonicalReference;

/// User agent sent with every lookup
const USER_AGENT: &str = concat!("versebot/", env!("CARGO_PKG_VERSION"));

/// Delay before the first retry; later retries wait proportionally longer
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Errors that can occur when fetching verse data
#[derive(Debug, Error)]
pub enum BibleError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The API does not know the reference
    #[error("Verse not found: {0}")]
    NotFound(String),

    /// The API answered with an unexpected status
    #[error("Bible API returned status {status}")]
    Status { status: u16, body: String },

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),
}

impl BibleError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            BibleError::RequestFailed(e) => e.is_timeout() || e.is_connect(),
            BibleError::Status { status, .. } => *status >= 500,
            BibleError::NotFound(_) | BibleError::ParseError(_) => false,
        }
    }
}

/// Anything that can supply verse text for a reference
#[async_trait]
pub trait VerseSource: Send + Sync {
    async fn lookup(&self, reference: &CanonicalReference) -> Result<Verse, BibleError>;
}

/// Client for fetching verses from bible-api.com
#[derive(Debug, Clone)]
pub struct BibleClient {
    http_client: Client,
    /// Base URL for the API (allows override for testing)
    base_url: String,
    translation: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl BibleClient {
    /// Creates a client from configuration
    pub fn new(config: &BibleConfig) -> Result<Self, BibleError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            translation: config.translation.clone(),
            max_retries: config.max_retries,
            retry_backoff: RETRY_BACKOFF,
        })
    }

    /// Overrides the delay between retries
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// URL for a reference, without the translation query
    pub fn verse_url(&self, reference: &CanonicalReference) -> String {
        format!(
            "{}/{}",
            self.base_url,
            reference.to_string().replace(' ', "+")
        )
    }

    /// Fetches a passage, retrying transient failures
    pub async fn fetch_verse(&self, reference: &CanonicalReference) -> Result<Verse, BibleError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(reference).await {
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(%reference, attempt, %error, "verse lookup failed, retrying");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                result => return result,
            }
        }
    }

    async fn fetch_once(&self, reference: &CanonicalReference) -> Result<Verse, BibleError> {
        let response = self
            .http_client
            .get(self.verse_url(reference))
            .query(&[("translation", self.translation.as_str())])
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            warn!(%reference, "verse not found");
            return Err(BibleError::NotFound(reference.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BibleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let verse: Verse = serde_json::from_str(&text)?;
        info!(reference = %verse.reference, "fetched verse");
        Ok(verse)
    }
}

#[async_trait]
impl VerseSource for BibleClient {
    async fn lookup(&self, reference: &CanonicalReference) -> Result<Verse, BibleError> {
        self.fetch_verse(reference).await
    }
}
