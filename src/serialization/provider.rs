//! Registry of serializers.
//!
//! # Responsibilities
//! - Keep serializers in registration order
//! - Look serializers up by format token or media type
//! - Know which format is the process-wide default
//!
//! # Design Decisions
//! - Built once at startup, then shared read-only
//! - Registration order breaks ties during Accept matching

use std::fmt;
use std::sync::Arc;

use crate::serialization::{essence, JsonSerializer, SerializationSettings, Serializer, XmlSerializer, JSON};

/// Ordered serializers plus the default format.
#[derive(Clone)]
pub struct SerializationProvider {
    serializers: Vec<Arc<dyn Serializer>>,
    default_format: Option<String>,
}

impl SerializationProvider {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            serializers: Vec::new(),
            default_format: None,
        }
    }

    /// JSON (default) and XML.
    pub fn with_defaults() -> Self {
        Self::new()
            .register(JsonSerializer::new())
            .register(XmlSerializer::new())
            .default_format(JSON)
    }

    pub fn register(mut self, serializer: impl Serializer) -> Self {
        self.serializers.push(Arc::new(serializer));
        self
    }

    /// Set the default format. It must be claimed by a registered serializer
    /// by the time the provider is used, or the first serializer is used.
    pub fn default_format(mut self, format: impl Into<String>) -> Self {
        self.default_format = Some(format.into());
        self
    }

    pub fn serializers(&self) -> &[Arc<dyn Serializer>] {
        &self.serializers
    }

    pub fn is_empty(&self) -> bool {
        self.serializers.is_empty()
    }

    /// Whether a serializer claims `format`.
    pub fn supports_format(&self, format: &str) -> bool {
        self.for_format(format).is_some()
    }

    /// Settings for a format token, using the serializer's primary media type.
    pub fn for_format(&self, format: &str) -> Option<SerializationSettings> {
        let format = format.to_ascii_lowercase();
        self.serializers
            .iter()
            .find(|s| s.formats().iter().any(|f| *f == format))
            .and_then(primary_settings)
    }

    /// Settings for a media type, ignoring parameters.
    pub fn for_media_type(&self, media_type: &str) -> Option<SerializationSettings> {
        let wanted = essence(media_type);
        self.serializers.iter().find_map(|s| {
            s.media_types()
                .iter()
                .find(|m| essence(m) == wanted)
                .map(|m| SerializationSettings::new(*m, Arc::clone(s)))
        })
    }

    /// Every claimed media type with its serializer, in registration order.
    pub fn media_types(&self) -> impl Iterator<Item = (&'static str, &Arc<dyn Serializer>)> + '_ {
        self.serializers
            .iter()
            .flat_map(|s| s.media_types().iter().map(move |m| (*m, s)))
    }

    /// Settings for the default format.
    pub fn default_settings(&self) -> Option<SerializationSettings> {
        self.default_format
            .as_deref()
            .and_then(|f| self.for_format(f))
            .or_else(|| self.serializers.first().and_then(primary_settings))
    }

    pub fn default_format_name(&self) -> Option<&str> {
        self.default_format.as_deref()
    }
}

impl Default for SerializationProvider {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for SerializationProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formats: Vec<&str> = self
            .serializers
            .iter()
            .flat_map(|s| s.formats().iter().copied())
            .collect();
        f.debug_struct("SerializationProvider")
            .field("formats", &formats)
            .field("default_format", &self.default_format)
            .finish()
    }
}

fn primary_settings(serializer: &Arc<dyn Serializer>) -> Option<SerializationSettings> {
    serializer
        .media_types()
        .first()
        .map(|m| SerializationSettings::new(*m, Arc::clone(serializer)))
}
