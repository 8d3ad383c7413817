//! A negotiated (media type, serializer) pair.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::error::ServiceError;
use crate::http::{Request, Response};
use crate::serialization::{SerializationError, Serializer};

/// Media type plus the serializer that produces it.
///
/// Cloning shares the serializer.
#[derive(Clone)]
pub struct SerializationSettings {
    media_type: String,
    serializer: Arc<dyn Serializer>,
}

impl SerializationSettings {
    pub fn new(media_type: impl Into<String>, serializer: Arc<dyn Serializer>) -> Self {
        Self {
            media_type: media_type.into(),
            serializer,
        }
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn serializer(&self) -> &Arc<dyn Serializer> {
        &self.serializer
    }

    /// Primary format token of the serializer.
    pub fn format(&self) -> Option<&'static str> {
        self.serializer.formats().first().copied()
    }

    /// Render the body, setting Content-Type unless a stage already did.
    pub fn serialize(&self, response: &mut Response) -> Result<Option<String>, SerializationError> {
        if response.content_type().is_none() {
            response.set_content_type(&self.media_type);
        }
        self.serializer.serialize(response)
    }

    /// Parse the request body as an untyped value.
    pub fn deserialize_value(&self, request: &Request) -> Result<serde_json::Value, ServiceError> {
        self.serializer.deserialize(request).map_err(ServiceError::from)
    }

    /// Parse the request body into `T`. Shape mismatches are 400s.
    pub fn deserialize<T: DeserializeOwned>(&self, request: &Request) -> Result<T, ServiceError> {
        let value = self.deserialize_value(request)?;
        serde_json::from_value(value).map_err(|e| {
            ServiceError::bad_request(format!("Invalid request body: {}", e)).with_source(e)
        })
    }
}

impl PartialEq for SerializationSettings {
    fn eq(&self, other: &Self) -> bool {
        self.media_type == other.media_type
            && std::ptr::eq(
                Arc::as_ptr(&self.serializer) as *const (),
                Arc::as_ptr(&other.serializer) as *const (),
            )
    }
}

impl fmt::Debug for SerializationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializationSettings")
            .field("media_type", &self.media_type)
            .field("format", &self.format())
            .finish()
    }
}
