use thiserror::Error;

/// Errors raised while compressing or decompressing a cache payload
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("compressed payload is empty")]
    Empty,

    #[error("compressed payload is corrupt: {0}")]
    Corrupt(String),

    #[error("compression failed: {0}")]
    Compress(String),
}

/// Errors raised while encoding or decoding a movie collection
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("JSON encode error: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("JSON decode error: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("expected a JSON object, found {0}")]
    UnexpectedShape(&'static str),
}

/// Errors raised while turning a collection into a cache entry or back
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

impl PayloadError {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Codec(_) => "codec",
            Self::Serialization(_) => "serialization",
        }
    }
}
