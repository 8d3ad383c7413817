//! JSON serializer backed by `serde_json`.

use crate::http::{Request, Response};
use crate::serialization::{SerializationError, Serializer, JSON};

const MEDIA_TYPES: &[&str] = &[
    "application/json; charset=UTF-8",
    "application/javascript; charset=UTF-8",
    "text/javascript; charset=UTF-8",
];

#[derive(Debug, Clone, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indented output, for humans reading responses directly.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Serializer for JsonSerializer {
    fn formats(&self) -> &[&'static str] {
        &[JSON]
    }

    fn media_types(&self) -> &[&'static str] {
        MEDIA_TYPES
    }

    fn serialize(&self, response: &Response) -> Result<Option<String>, SerializationError> {
        let Some(value) = response.body().as_value() else {
            return Ok(None);
        };
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.map(Some).map_err(|e| SerializationError::Encode {
            format: JSON,
            message: e.to_string(),
        })
    }

    fn deserialize(&self, request: &Request) -> Result<serde_json::Value, SerializationError> {
        if !request.has_body() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_slice(request.body()).map_err(|e| SerializationError::Decode {
            format: JSON,
            message: e.to_string(),
        })
    }
}
