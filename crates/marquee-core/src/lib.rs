//! Core types and pure transforms for Marquee
//!
//! This crate holds everything the cache-aside path needs that does not
//! touch the network:
//! - The movie collection model served to callers
//! - gzip stream compression for cache payloads
//! - JSON serialization with case-insensitive decoding of origin payloads
//! - The cache entry format (`compress(serialize(collection))`)

pub mod codec;
pub mod error;
pub mod model;
pub mod payload;
pub mod serializer;

pub use codec::{Codec, CompressionLevel, DEFAULT_MAX_DECOMPRESSED};
pub use error::{CodecError, PayloadError, SerializationError};
pub use model::{DateRange, Movie, MovieCollection};
pub use payload::PayloadCodec;
