//! JSON serialization of [`MovieCollection`].
//!
//! Encoding always produces the canonical snake_case field names. Decoding
//! accepts field names in any ASCII casing because the origin does not
//! guarantee the casing of its payloads; keys are mapped onto the model's
//! names before the typed decode. Keys the model does not know are left
//! untouched and end up in [`Movie::extra`](crate::model::Movie::extra).

use serde_json::{Map, Value};

use crate::error::SerializationError;
use crate::model::{DateRange, Movie, MovieCollection};

/// Encode a collection as canonical JSON bytes.
pub fn serialize(collection: &MovieCollection) -> Result<Vec<u8>, SerializationError> {
    serde_json::to_vec(collection).map_err(SerializationError::Encode)
}

/// Decode a collection from JSON bytes, matching field names case-insensitively.
pub fn deserialize(bytes: &[u8]) -> Result<MovieCollection, SerializationError> {
    let value: Value = serde_json::from_slice(bytes).map_err(SerializationError::Decode)?;
    from_value(value)
}

/// Decode a collection from an already parsed JSON value.
pub fn from_value(value: Value) -> Result<MovieCollection, SerializationError> {
    let mut root = match value {
        Value::Object(map) => canonicalize(map, MovieCollection::FIELDS),
        other => return Err(SerializationError::UnexpectedShape(type_name(&other))),
    };

    if let Some(Value::Array(items)) = root.get_mut("results") {
        for item in items.iter_mut() {
            if let Value::Object(map) = item {
                *map = canonicalize(std::mem::take(map), Movie::FIELDS);
            }
        }
    }

    if let Some(Value::Object(dates)) = root.get_mut("dates") {
        *dates = canonicalize(std::mem::take(dates), DateRange::FIELDS);
    }

    serde_json::from_value(Value::Object(root)).map_err(SerializationError::Decode)
}

/// Rename keys that match one of `fields` (ignoring ASCII case) to the
/// field's canonical spelling.
fn canonicalize(map: Map<String, Value>, fields: &[&str]) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| {
            let key = fields
                .iter()
                .find(|field| field.eq_ignore_ascii_case(&key))
                .map(|field| (*field).to_string())
                .unwrap_or(key);
            (key, value)
        })
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
