//! XML rendering of structured response bodies.
//!
//! Objects become child elements named after their keys, arrays become
//! repeated `<item>` elements, and the document root is `<response>`.
//! Request bodies in XML are not accepted.

use std::fmt::Write as _;

use serde_json::Value;

use crate::http::{Request, Response};
use crate::serialization::{SerializationError, Serializer, XML};

const MEDIA_TYPES: &[&str] = &["application/xml; charset=UTF-8", "text/xml; charset=UTF-8"];

const ROOT: &str = "response";
const ITEM: &str = "item";

#[derive(Debug, Clone, Default)]
pub struct XmlSerializer;

impl XmlSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl Serializer for XmlSerializer {
    fn formats(&self) -> &[&'static str] {
        &[XML]
    }

    fn media_types(&self) -> &[&'static str] {
        MEDIA_TYPES
    }

    fn serialize(&self, response: &Response) -> Result<Option<String>, SerializationError> {
        let Some(value) = response.body().as_value() else {
            return Ok(None);
        };
        let mut out = String::new();
        write_element(&mut out, ROOT, value).map_err(|e| SerializationError::Encode {
            format: XML,
            message: e.to_string(),
        })?;
        Ok(Some(out))
    }

    fn deserialize(&self, _request: &Request) -> Result<Value, SerializationError> {
        Err(SerializationError::Unsupported { format: XML })
    }
}

fn write_element(out: &mut String, name: &str, value: &Value) -> std::fmt::Result {
    match value {
        Value::Null => write!(out, "<{}/>", name),
        Value::Object(map) => {
            write!(out, "<{}>", name)?;
            for (key, child) in map {
                write_element(out, &element_name(key), child)?;
            }
            write!(out, "</{}>", name)
        }
        Value::Array(items) => {
            write!(out, "<{}>", name)?;
            for item in items {
                write_element(out, ITEM, item)?;
            }
            write!(out, "</{}>", name)
        }
        Value::String(text) => write!(out, "<{}>{}</{}>", name, escape(text), name),
        Value::Bool(b) => write!(out, "<{}>{}</{}>", name, b, name),
        Value::Number(n) => write!(out, "<{}>{}</{}>", name, n, name),
    }
}

/// Turn an arbitrary key into a legal element name.
fn element_name(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let starts_ok = name
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !starts_ok {
        name.insert(0, '_');
    }
    name
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
