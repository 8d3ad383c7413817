//! Response serialization and content negotiation.
//!
//! # Data Flow
//! ```text
//! Request (.format suffix, ?format=, Accept) + Route formats
//!     → negotiation.rs (pick a format, honor route restrictions)
//!     → provider.rs (serializer registered for that format or media type)
//!     → settings.rs (media type + serializer, pinned per request)
//!     → json.rs / xml.rs (render the response body)
//! ```
//!
//! # Design Decisions
//! - The provider is an explicit dependency of the pipeline, never global
//! - Serializers render structured bodies only; text and bytes pass through

pub mod json;
pub mod negotiation;
pub mod provider;
pub mod settings;
pub mod xml;

use thiserror::Error;

use crate::error::ServiceError;
use crate::exception::GENERIC_MESSAGE;
use crate::http::{Request, Response};

pub use json::JsonSerializer;
pub use negotiation::ContentNegotiator;
pub use provider::SerializationProvider;
pub use settings::SerializationSettings;
pub use xml::XmlSerializer;

/// Format token for JSON.
pub const JSON: &str = "json";

/// Format token for XML.
pub const XML: &str = "xml";

/// Errors raised by serializers.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("failed to render response as {format}: {message}")]
    Encode { format: &'static str, message: String },

    #[error("failed to read request body as {format}: {message}")]
    Decode { format: &'static str, message: String },

    #[error("{format} request bodies are not supported")]
    Unsupported { format: &'static str },
}

impl From<SerializationError> for ServiceError {
    fn from(error: SerializationError) -> Self {
        let message = error.to_string();
        match error {
            SerializationError::Decode { .. } => ServiceError::bad_request(message).with_source(error),
            SerializationError::Unsupported { .. } => {
                ServiceError::unsupported_media_type(message).with_source(error)
            }
            // Renderer details stay in the source chain, out of the body.
            SerializationError::Encode { .. } => ServiceError::internal(GENERIC_MESSAGE).with_source(error),
        }
    }
}

/// Renders response bodies to, and reads request bodies from, one wire format.
pub trait Serializer: Send + Sync + 'static {
    /// Format tokens this serializer answers to, e.g. `json`.
    fn formats(&self) -> &[&'static str];

    /// Media types this serializer claims. The first is used as Content-Type.
    fn media_types(&self) -> &[&'static str];

    /// Render the response body. `None` when there is nothing to render.
    fn serialize(&self, response: &Response) -> Result<Option<String>, SerializationError>;

    /// Parse the request body into a structured value.
    fn deserialize(&self, request: &Request) -> Result<serde_json::Value, SerializationError>;
}

/// `type/subtype` of a media type, lowercased, parameters dropped.
pub(crate) fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
