//! Message documents.
//!
//! A [`MessageDocument`] wraps one message node together with its resolved
//! payload and the schema format decided for it at build time.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::AsyncApiError;
use crate::model::Direction;
use crate::refs::resolve_schema_refs;
use crate::schema_format::{classify, ClassifierInput, SchemaFormatType};

/// Pointer prefix of reusable message definitions.
pub(crate) const COMPONENT_MESSAGES: &str = "#/components/messages/";

/// A message, keyed canonically, with its schema format resolved once.
#[derive(Debug, Clone, Serialize)]
pub struct MessageDocument {
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    effective_content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema_format: Option<String>,
    schema_format_type: SchemaFormatType,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
    ep: EpMessageInfo,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    extensions: BTreeMap<String, Value>,
    carriers: Vec<Carrier>,
    #[serde(skip)]
    origin: String,
    #[serde(skip)]
    node: Value,
}

/// Event portal extensions declared on a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EpMessageInfo {
    /// `x-ep-event-name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    /// `x-ep-application-domain-name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_domain_name: Option<String>,
    /// `x-ep-event-version-displayname`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_version_display_name: Option<String>,
    /// `x-ep-schema-name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
}

/// A channel (and, when declared by an operation, the direction) carrying a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Carrier {
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

/// Where a message node was reached from during the document walk.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MessageSite<'a> {
    pub channel: &'a str,
    pub direction: Option<Direction>,
    /// JSON pointer of the node at the site (before following `$ref`s).
    pub pointer: &'a str,
    /// The 3.x channel `messages` map key, when the site is such an entry.
    pub declared_id: Option<&'a str>,
    /// Position within the operation, used for anonymous messages.
    pub index: usize,
}

impl MessageDocument {
    /// Build a message document from a dereferenced message node.
    ///
    /// `origin` is the JSON pointer identifying the concrete node.
    pub(crate) fn build(
        root: &Value,
        key: String,
        origin: String,
        node: &Value,
        carrier: Carrier,
        default_content_type: Option<&str>,
    ) -> Result<Self, AsyncApiError> {
        let obj = node.as_object().ok_or_else(|| {
            AsyncApiError::malformed(format!("message '{}' must be an object", key))
        })?;
        let entity = format!("message:{}", key);

        let resolved = obj
            .get("payload")
            .map(|p| resolve_schema_refs(p, root, &entity))
            .transpose()?;
        let (payload, payload_format) = match resolved {
            Some(p) => split_multi_format(p),
            None => (None, None),
        };

        let content_type = str_field(obj, "contentType");
        let effective_content_type = content_type
            .clone()
            .or_else(|| default_content_type.map(str::to_string));

        let schema_format = payload_format.or_else(|| str_field(obj, "schemaFormat"));
        let schema_format_type = classify(ClassifierInput {
            payload: payload.as_ref(),
            schema_format: schema_format.as_deref(),
            content_type: effective_content_type.as_deref(),
        });
        if schema_format_type.is_supported() {
            debug!(message = %key, format = %schema_format_type, "classified message payload");
        } else {
            warn!(
                message = %key,
                schema_format = schema_format.as_deref().unwrap_or("<none>"),
                "message payload schema format not recognized"
            );
        }

        let ep = EpMessageInfo {
            event_name: str_field(obj, "x-ep-event-name"),
            application_domain_name: str_field(obj, "x-ep-application-domain-name"),
            event_version_display_name: str_field(obj, "x-ep-event-version-displayname"),
            schema_name: str_field(obj, "x-ep-schema-name"),
        };

        Ok(Self {
            key,
            name: str_field(obj, "name"),
            title: str_field(obj, "title"),
            summary: str_field(obj, "summary"),
            description: str_field(obj, "description"),
            content_type,
            effective_content_type,
            schema_format,
            schema_format_type,
            payload,
            ep,
            extensions: extract_extensions(obj),
            carriers: vec![carrier],
            origin,
            node: node.clone(),
        })
    }

    /// Whether `node` reached at `origin` is this same message.
    pub(crate) fn is_same_node(&self, origin: &str, node: &Value) -> bool {
        self.origin == origin || self.node == *node
    }

    pub(crate) fn origin(&self) -> &str {
        &self.origin
    }

    pub(crate) fn add_carrier(&mut self, carrier: Carrier) {
        if !self.carriers.contains(&carrier) {
            self.carriers.push(carrier);
        }
    }

    /// Canonical key, unique within the document.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The machine-friendly `name` field.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// `contentType` declared on the message itself.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Declared content type, else the document's `defaultContentType`.
    pub fn effective_content_type(&self) -> Option<&str> {
        self.effective_content_type.as_deref()
    }

    /// Declared `schemaFormat`, if any.
    pub fn schema_format(&self) -> Option<&str> {
        self.schema_format.as_deref()
    }

    pub fn schema_format_type(&self) -> SchemaFormatType {
        self.schema_format_type
    }

    /// Payload schema. The root reference is resolved; nested `$ref`s are
    /// kept and point into the source document.
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn ep_info(&self) -> &EpMessageInfo {
        &self.ep
    }

    /// Event name from `x-ep-event-name`, else the canonical key.
    pub fn event_name(&self) -> &str {
        self.ep.event_name.as_deref().unwrap_or(&self.key)
    }

    /// Message-level `x-*` extensions, verbatim.
    pub fn extensions(&self) -> &BTreeMap<String, Value> {
        &self.extensions
    }

    pub fn carriers(&self) -> &[Carrier] {
        &self.carriers
    }

    /// Names of the channels carrying this message, first-seen order, deduplicated.
    pub fn channel_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for carrier in &self.carriers {
            if !names.contains(&carrier.channel.as_str()) {
                names.push(&carrier.channel);
            }
        }
        names
    }
}

/// Derive the canonical key of a message node.
///
/// Component name, then `messageId`, then the 3.x channel map key, then
/// `name`; anonymous inline messages are keyed by their position.
pub(crate) fn canonical_key(node: &Value, last_ref: Option<&str>, site: &MessageSite<'_>) -> String {
    if let Some(component) = last_ref.and_then(|r| r.strip_prefix(COMPONENT_MESSAGES)) {
        if !component.contains('/') {
            return unescape(component);
        }
    }
    if let Some(id) = node.get("messageId").and_then(Value::as_str) {
        return id.to_string();
    }
    if let Some(id) = site.declared_id {
        return id.to_string();
    }
    if let Some(name) = node.get("name").and_then(Value::as_str) {
        return name.to_string();
    }
    let direction = site.direction.map(|d| d.as_str()).unwrap_or("message");
    format!("{}/{}/{}", site.channel, direction, site.index)
}

/// Escape a key for use as a JSON pointer segment.
pub(crate) fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

pub(crate) fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Unwrap a 3.x multi-format schema object (`{schemaFormat, schema}`).
fn split_multi_format(payload: Value) -> (Option<Value>, Option<String>) {
    let is_multi_format = payload
        .as_object()
        .is_some_and(|o| o.get("schemaFormat").is_some_and(Value::is_string) && o.contains_key("schema"));
    if !is_multi_format {
        return (Some(payload), None);
    }
    match payload {
        Value::Object(mut obj) => {
            let format = obj
                .remove("schemaFormat")
                .and_then(|v| v.as_str().map(str::to_string));
            (obj.remove("schema"), format)
        }
        other => (Some(other), None),
    }
}

fn str_field(obj: &serde_json::Map<String, Value>, field: &str) -> Option<String> {
    obj.get(field).and_then(Value::as_str).map(str::to_string)
}

/// Extract all `x-*` keys from an object.
pub(crate) fn extract_extensions(obj: &serde_json::Map<String, Value>) -> BTreeMap<String, Value> {
    obj.iter()
        .filter(|(k, _)| k.starts_with("x-"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn site<'a>(declared_id: Option<&'a str>, direction: Option<Direction>) -> MessageSite<'a> {
        MessageSite {
            channel: "orders/created",
            direction,
            pointer: "#/channels/orders~1created/subscribe/message",
            declared_id,
            index: 0,
        }
    }

    fn carrier() -> Carrier {
        Carrier {
            channel: "orders/created".into(),
            direction: Some(Direction::Subscribe),
        }
    }

    #[test]
    fn key_precedence() {
        let node = json!({ "messageId": "mid", "name": "n" });
        assert_eq!(
            canonical_key(&node, Some("#/components/messages/Comp"), &site(Some("id"), None)),
            "Comp"
        );
        assert_eq!(canonical_key(&node, None, &site(Some("id"), None)), "mid");
        assert_eq!(
            canonical_key(&json!({ "name": "n" }), None, &site(Some("id"), None)),
            "id"
        );
        assert_eq!(canonical_key(&json!({ "name": "n" }), None, &site(None, None)), "n");
        assert_eq!(
            canonical_key(&json!({}), None, &site(None, Some(Direction::Subscribe))),
            "orders/created/subscribe/0"
        );
    }

    #[test]
    fn component_key_is_unescaped() {
        assert_eq!(
            canonical_key(&json!({}), Some("#/components/messages/a~1b"), &site(None, None)),
            "a/b"
        );
    }

    #[test]
    fn builds_with_resolved_payload_and_default_content_type() {
        let root = json!({
            "components": { "schemas": { "Order": { "type": "object", "properties": { "id": { "type": "string" } } } } }
        });
        let node = json!({
            "name": "OrderCreated",
            "summary": "An order was created",
            "x-ep-event-name": "Order Created",
            "x-custom": 1,
            "payload": { "$ref": "#/components/schemas/Order" }
        });
        let msg = MessageDocument::build(
            &root,
            "order-created".into(),
            "#/components/messages/order-created".into(),
            &node,
            carrier(),
            Some("application/json"),
        )
        .unwrap();

        assert_eq!(msg.schema_format_type(), SchemaFormatType::ApplicationJson);
        assert_eq!(msg.content_type(), None);
        assert_eq!(msg.effective_content_type(), Some("application/json"));
        assert_eq!(msg.event_name(), "Order Created");
        assert!(msg.extensions().contains_key("x-custom"));
        assert!(msg.payload().unwrap().get("$ref").is_none());
    }

    #[test]
    fn multi_format_payload_is_unwrapped() {
        let node = json!({
            "payload": {
                "schemaFormat": "application/vnd.apache.avro;version=1.9.0",
                "schema": { "type": "record", "name": "User", "fields": [ { "name": "id", "type": "string" } ] }
            }
        });
        let msg = MessageDocument::build(&json!({}), "user".into(), "#/x".into(), &node, carrier(), None)
            .unwrap();
        assert_eq!(msg.schema_format_type(), SchemaFormatType::ApplicationAvro);
        assert_eq!(
            msg.schema_format(),
            Some("application/vnd.apache.avro;version=1.9.0")
        );
        assert_eq!(msg.payload().unwrap()["name"], "User");
    }

    #[test]
    fn unresolvable_payload_ref_names_message() {
        let node = json!({ "payload": { "$ref": "#/components/schemas/Missing" } });
        let err = MessageDocument::build(&json!({}), "broken".into(), "#/x".into(), &node, carrier(), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvableSchemaReference);
        assert!(err.to_string().contains("message:broken"));
    }

    #[test]
    fn missing_payload_is_unsupported_not_error() {
        let msg = MessageDocument::build(&json!({}), "bare".into(), "#/x".into(), &json!({}), carrier(), None)
            .unwrap();
        assert_eq!(msg.schema_format_type(), SchemaFormatType::Unsupported);
    }

    #[test]
    fn carriers_are_deduplicated() {
        let mut msg =
            MessageDocument::build(&json!({}), "m".into(), "#/x".into(), &json!({}), carrier(), None)
                .unwrap();
        msg.add_carrier(carrier());
        msg.add_carrier(Carrier {
            channel: "orders/created".into(),
            direction: None,
        });
        assert_eq!(msg.carriers().len(), 2);
        assert_eq!(msg.channel_names(), vec!["orders/created"]);
    }
}
