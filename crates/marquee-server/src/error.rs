//! Errors that escape the cache-aside path.

use thiserror::Error;

use crate::origin::OriginError;

/// Failure of a retrieval.
///
/// Cache tier failures, corrupt entries and application-level origin
/// failures are all recovered inside the retriever; only an unreachable
/// origin on a full miss is reported.
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("origin unavailable: {0}")]
    OriginUnavailable(#[source] OriginError),
}

impl RetrievalError {
    /// Stable label for the transport layer's error body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OriginUnavailable(OriginError::Timeout(_)) => "origin_timeout",
            Self::OriginUnavailable(_) => "origin_transport",
        }
    }
}
