//! Cache entry format.
//!
//! A cache entry is `compress(serialize(collection))`. The same bytes are
//! stored in every tier.

use crate::codec::Codec;
use crate::error::PayloadError;
use crate::model::MovieCollection;
use crate::serializer;

/// Encodes collections into cache entries and decodes them back.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadCodec {
    codec: Codec,
}

impl PayloadCodec {
    pub fn new(codec: Codec) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn encode(&self, collection: &MovieCollection) -> Result<Vec<u8>, PayloadError> {
        let json = serializer::serialize(collection)?;
        Ok(self.codec.compress(&json)?)
    }

    pub fn decode(&self, entry: &[u8]) -> Result<MovieCollection, PayloadError> {
        let json = self.codec.decompress(entry)?;
        Ok(serializer::deserialize(&json)?)
    }
}
