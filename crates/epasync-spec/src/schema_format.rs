//! Schema format classification.
//!
//! Decides, once per message at build time, which schema dialect a payload is
//! written in. Declared `schemaFormat` metadata wins when it names a known
//! dialect, then a dialect-specific `contentType`; otherwise the payload's
//! structure decides. Anything ambiguous is
//! [`SchemaFormatType::Unsupported`], which is a valid answer, not an error.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schema dialect of a message payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaFormatType {
    /// JSON Schema (including the AsyncAPI schema object).
    ApplicationJson,
    /// Apache Avro schema.
    ApplicationAvro,
    /// Any other or malformed declaration.
    Unsupported,
}

impl SchemaFormatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaFormatType::ApplicationJson => "APPLICATION_JSON",
            SchemaFormatType::ApplicationAvro => "APPLICATION_AVRO",
            SchemaFormatType::Unsupported => "UNSUPPORTED",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, SchemaFormatType::Unsupported)
    }
}

impl fmt::Display for SchemaFormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media types declaring an Avro schema.
const AVRO_MEDIA_TYPES: &[&str] = &[
    "application/vnd.apache.avro",
    "application/vnd.apache.avro+json",
    "application/vnd.apache.avro+yaml",
];

/// Media types declaring a JSON Schema or AsyncAPI schema object.
const JSON_MEDIA_TYPES: &[&str] = &[
    "application/vnd.aai.asyncapi",
    "application/vnd.aai.asyncapi+json",
    "application/vnd.aai.asyncapi+yaml",
    "application/schema+json",
    "application/schema+yaml",
];

/// Content types that only ever carry Avro-encoded payloads.
const AVRO_CONTENT_TYPES: &[&str] = &["avro/binary", "avro/json", "application/avro"];

/// JSON Schema `type` keywords.
const JSON_SCHEMA_TYPES: &[&str] = &[
    "object", "array", "string", "number", "integer", "boolean", "null",
];

/// Avro primitive type names, accepted inside unions and field types.
const AVRO_PRIMITIVES: &[&str] = &[
    "null", "boolean", "int", "long", "float", "double", "bytes", "string",
];

/// Everything the classifier looks at for one message.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierInput<'a> {
    /// The message payload, with references already resolved.
    pub payload: Option<&'a Value>,
    /// `schemaFormat` declared on the message or on a multi-format payload.
    pub schema_format: Option<&'a str>,
    /// Effective `contentType` of the message.
    pub content_type: Option<&'a str>,
}

/// Classify a payload. Pure; never fails.
pub fn classify(input: ClassifierInput<'_>) -> SchemaFormatType {
    if let Some(declared) = input.schema_format.and_then(classify_media_type) {
        return declared;
    }
    if let Some(declared) = input.content_type.and_then(classify_content_type) {
        return declared;
    }
    match input.payload {
        Some(payload) if looks_like_avro(payload) => SchemaFormatType::ApplicationAvro,
        Some(payload) if looks_like_json_schema(payload) => SchemaFormatType::ApplicationJson,
        _ => SchemaFormatType::Unsupported,
    }
}

/// Map a declared schema format media type to a dialect, ignoring parameters.
///
/// Returns `None` for media types that name neither dialect.
pub fn classify_media_type(media_type: &str) -> Option<SchemaFormatType> {
    let essence = essence(media_type);
    if AVRO_MEDIA_TYPES.contains(&essence.as_str()) {
        Some(SchemaFormatType::ApplicationAvro)
    } else if JSON_MEDIA_TYPES.contains(&essence.as_str()) {
        Some(SchemaFormatType::ApplicationJson)
    } else {
        None
    }
}

/// Map a message content type to a dialect.
///
/// Generic types such as `application/json` say nothing about the schema
/// dialect and yield `None`.
pub fn classify_content_type(content_type: &str) -> Option<SchemaFormatType> {
    if AVRO_CONTENT_TYPES.contains(&essence(content_type).as_str()) {
        return Some(SchemaFormatType::ApplicationAvro);
    }
    classify_media_type(content_type)
}

fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn looks_like_avro(node: &Value) -> bool {
    match node {
        Value::Array(branches) => !branches.is_empty() && branches.iter().all(is_avro_type),
        Value::Object(obj) => {
            let kind = obj.get("type").and_then(Value::as_str);
            match kind {
                Some("record") | Some("error") | Some("fixed") => obj.contains_key("name"),
                Some("enum") => obj.get("symbols").is_some_and(Value::is_array),
                Some("map") => obj.contains_key("values"),
                Some("array") => obj.get("items").is_some_and(is_avro_type_name_or_schema),
                _ => has_avro_fields(obj),
            }
        }
        _ => false,
    }
}

fn has_avro_fields(obj: &serde_json::Map<String, Value>) -> bool {
    obj.get("fields")
        .and_then(Value::as_array)
        .is_some_and(|fields| {
            !fields.is_empty()
                && fields.iter().all(|f| {
                    f.get("name").is_some_and(Value::is_string) && f.get("type").is_some()
                })
        })
}

/// A union branch or field type: a named type, a primitive, or a nested Avro schema.
fn is_avro_type(node: &Value) -> bool {
    match node {
        Value::String(name) => !name.is_empty(),
        Value::Object(_) => looks_like_avro(node),
        _ => false,
    }
}

/// Avro `items` are a type name (`"string"`) or a nested Avro schema; JSON
/// Schema `items` are always a schema object with JSON-style keywords.
fn is_avro_type_name_or_schema(node: &Value) -> bool {
    match node {
        Value::String(name) => AVRO_PRIMITIVES.contains(&name.as_str()) || name.contains('.'),
        Value::Object(_) => looks_like_avro(node),
        _ => false,
    }
}

fn looks_like_json_schema(node: &Value) -> bool {
    let Some(obj) = node.as_object() else {
        return false;
    };
    if obj
        .get("$schema")
        .and_then(Value::as_str)
        .is_some_and(|s| s.contains("json-schema.org"))
    {
        return true;
    }
    if obj.get("properties").is_some_and(Value::is_object)
        || obj.get("items").is_some_and(Value::is_object)
        || obj.contains_key("$ref")
    {
        return true;
    }
    if ["allOf", "anyOf", "oneOf"]
        .iter()
        .any(|k| obj.get(*k).is_some_and(Value::is_array))
    {
        return true;
    }
    match obj.get("type") {
        Some(Value::String(t)) => JSON_SCHEMA_TYPES.contains(&t.as_str()),
        Some(Value::Array(types)) => {
            !types.is_empty()
                && types
                    .iter()
                    .all(|t| t.as_str().is_some_and(|t| JSON_SCHEMA_TYPES.contains(&t)))
        }
        _ => false,
    }
}
