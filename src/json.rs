//! JSON codec
//!
//! `RequestClient` encodes payloads and decodes replies through a
//! `JsonCodec` passed in at construction. `SerdeJson` is the default.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Codec errors
#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    /// The input text is not valid JSON for the requested shape
    #[error("malformed JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The value could not be represented as JSON
    #[error("unable to serialize value: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Serialize values to JSON text and back
pub trait JsonCodec {
    /// Encode a value as JSON text
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, JsonError>;

    /// Decode JSON text into the requested shape
    fn deserialize<T: DeserializeOwned>(&self, text: &str) -> Result<T, JsonError>;
}

/// `serde_json` backed codec
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeJson {
    pretty: bool,
}

impl SerdeJson {
    /// Compact output
    pub fn new() -> Self {
        SerdeJson { pretty: false }
    }

    /// Indented output
    pub fn pretty() -> Self {
        SerdeJson { pretty: true }
    }
}

impl JsonCodec for SerdeJson {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, JsonError> {
        let text = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        text.map_err(JsonError::Serialize)
    }

    fn deserialize<T: DeserializeOwned>(&self, text: &str) -> Result<T, JsonError> {
        serde_json::from_str(text).map_err(JsonError::Malformed)
    }
}
