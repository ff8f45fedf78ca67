//! Origin API client.
//!
//! Issues the single outbound request for the listing and classifies the
//! outcome. The client has no knowledge of the cache tiers.
//!
//! # Outcome classes
//!
//! | Outcome                            | Result                          | Class        |
//! |------------------------------------|---------------------------------|--------------|
//! | 2xx with a decodable body          | `Ok(MovieCollection)`           | success      |
//! | 2xx with an undecodable body       | `Err(OriginError::Malformed)`   | application  |
//! | body over `max_body_bytes`         | `Err(OriginError::BodyTooLarge)`| application  |
//! | non-2xx status                     | `Err(OriginError::Status)`      | application  |
//! | connect/IO failure                 | `Err(OriginError::Transport)`   | transport    |
//! | request deadline expired           | `Err(OriginError::Timeout)`     | transport    |
//!
//! Only transport failures are meant to reach callers of the retriever;
//! application failures are recovered there.

use std::time::Duration;

use async_trait::async_trait;
use marquee_core::{MovieCollection, serializer};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};

use crate::config::OriginConfig;

/// Errors that can occur while fetching the listing.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OriginError {
    /// The origin could not be reached or the connection broke.
    #[error("origin request failed: {0}")]
    Transport(String),

    /// The request did not complete within the configured deadline.
    #[error("origin request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The origin answered with a non-success status code.
    #[error("origin returned status {0}")]
    Status(u16),

    /// The origin answered 2xx but the body is not a listing.
    #[error("origin body is malformed: {0}")]
    Malformed(String),

    /// The body exceeded the configured limit.
    #[error("origin body exceeds maximum size of {max_size} bytes")]
    BodyTooLarge { max_size: usize },

    /// The client could not be built from the configuration.
    #[error("invalid origin configuration: {0}")]
    Config(String),
}

impl OriginError {
    /// True for failures that suggest the origin itself is unreachable.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }

    /// Short label used in logs, metrics and error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Timeout(_) => "timeout",
            Self::Status(_) => "status",
            Self::Malformed(_) => "malformed",
            Self::BodyTooLarge { .. } => "body_too_large",
            Self::Config(_) => "config",
        }
    }
}

/// Source of the listing on a full cache miss.
#[async_trait]
pub trait OriginClient: Send + Sync {
    async fn fetch(&self) -> Result<MovieCollection, OriginError>;
}

/// `OriginClient` over HTTP.
pub struct HttpOriginClient {
    http_client: reqwest::Client,
    url: String,
    timeout: Duration,
    max_body_bytes: usize,
}

impl HttpOriginClient {
    /// Build the client once; headers and deadlines are fixed for its lifetime.
    pub fn new(config: &OriginConfig) -> Result<Self, OriginError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = config.bearer_token.as_deref().filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| OriginError::Config(format!("invalid bearer token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| OriginError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            url: config.url.clone(),
            timeout: config.timeout(),
            max_body_bytes: config.max_body_bytes,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn classify(&self, error: reqwest::Error) -> OriginError {
        if error.is_timeout() {
            OriginError::Timeout(self.timeout)
        } else {
            OriginError::Transport(error.to_string())
        }
    }

    async fn read_body(&self, mut response: reqwest::Response) -> Result<Vec<u8>, OriginError> {
        if let Some(len) = response.content_length() {
            if len > self.max_body_bytes as u64 {
                return Err(OriginError::BodyTooLarge {
                    max_size: self.max_body_bytes,
                });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(e))? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(OriginError::BodyTooLarge {
                    max_size: self.max_body_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait]
impl OriginClient for HttpOriginClient {
    async fn fetch(&self) -> Result<MovieCollection, OriginError> {
        tracing::debug!(url = %self.url, "Fetching listing from origin");

        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| {
                let err = self.classify(e);
                tracing::debug!(url = %self.url, error = %err, "Origin request failed");
                err
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(OriginError::Status(status.as_u16()));
        }

        let body = self.read_body(response).await?;
        serializer::deserialize(&body).map_err(|e| OriginError::Malformed(e.to_string()))
    }
}
