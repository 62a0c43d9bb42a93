use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::error::AsyncApiError;
use crate::message::MessageDocument;

/// Default separator between channel name segments.
pub const DEFAULT_CHANNEL_DELIMITER: &str = "/";

/// A built AsyncAPI document.
///
/// Only the document builder constructs one. There is no mutable API: once
/// built, the document can be shared freely across threads.
#[derive(Debug, Clone, Serialize)]
pub struct AsyncApiDocument {
    asyncapi_version: String,
    info: Info,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_content_type: Option<String>,
    ep: EpDocumentInfo,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    extensions: BTreeMap<String, serde_json::Value>,
    channels: IndexMap<String, Channel>,
    messages: IndexMap<String, MessageDocument>,
}

/// The `info` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Event portal extensions declared at the document root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EpDocumentInfo {
    /// `x-ep-application-domain-name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_domain_name: Option<String>,
    /// `x-ep-assets-application-domain-name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets_application_domain_name: Option<String>,
    /// `x-ep-broker-type`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker_type: Option<BrokerType>,
    /// `x-ep-channel-delimiter`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_delimiter: Option<String>,
}

/// Broker type declared by `x-ep-broker-type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerType {
    Solace,
    Kafka,
    Other(String),
}

impl BrokerType {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "solace" => BrokerType::Solace,
            "kafka" => BrokerType::Kafka,
            _ => BrokerType::Other(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BrokerType::Solace => "solace",
            BrokerType::Kafka => "kafka",
            BrokerType::Other(s) => s,
        }
    }
}

impl fmt::Display for BrokerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for BrokerType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Direction of a channel operation, from the application's point of view
/// in AsyncAPI 2.x terms.
///
/// AsyncAPI 3.x `receive` maps to [`Direction::Publish`] and `send` maps to
/// [`Direction::Subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Publish,
    Subscribe,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Publish => "publish",
            Direction::Subscribe => "subscribe",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A channel and the operations declared on it.
#[derive(Debug, Clone, Serialize)]
pub struct Channel {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    parameters: Vec<String>,
    operations: Vec<ChannelOperation>,
    messages: Vec<String>,
}

/// One publish or subscribe operation on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelOperation {
    pub direction: Direction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// Keys into the document's message map, in declaration order.
    pub messages: Vec<String>,
}

impl Channel {
    pub(crate) fn new(
        name: String,
        address: Option<String>,
        description: Option<String>,
        parameters: Vec<String>,
    ) -> Self {
        Self {
            name,
            address,
            description,
            parameters,
            operations: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub(crate) fn push_operation(&mut self, operation: ChannelOperation) {
        for key in &operation.messages {
            self.add_message(key);
        }
        self.operations.push(operation);
    }

    pub(crate) fn add_message(&mut self, key: &str) {
        if !self.messages.iter().any(|k| k == key) {
            self.messages.push(key.to_string());
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The 3.x `address`, if it differs from the channel name.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Declared channel parameter names.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn operations(&self) -> &[ChannelOperation] {
        &self.operations
    }

    pub fn operation(&self, direction: Direction) -> Option<&ChannelOperation> {
        self.operations.iter().find(|op| op.direction == direction)
    }

    /// Every message key carried on this channel, first-seen order.
    pub fn message_keys(&self) -> &[String] {
        &self.messages
    }

    /// Parameter names used as `{name}` placeholders in the channel name.
    pub fn placeholders(&self) -> Vec<&str> {
        let template = self.address.as_deref().unwrap_or(&self.name);
        let mut names = Vec::new();
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                break;
            };
            names.push(&after[..end]);
            rest = &after[end + 1..];
        }
        names
    }
}

impl AsyncApiDocument {
    pub(crate) fn new(
        asyncapi_version: String,
        info: Info,
        default_content_type: Option<String>,
        ep: EpDocumentInfo,
        extensions: BTreeMap<String, serde_json::Value>,
        channels: IndexMap<String, Channel>,
        messages: IndexMap<String, MessageDocument>,
    ) -> Self {
        Self {
            asyncapi_version,
            info,
            default_content_type,
            ep,
            extensions,
            channels,
            messages,
        }
    }

    /// The `asyncapi` version string (e.g. "2.6.0").
    pub fn asyncapi_version(&self) -> &str {
        &self.asyncapi_version
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    pub fn title(&self) -> &str {
        &self.info.title
    }

    pub fn version(&self) -> &str {
        &self.info.version
    }

    pub fn default_content_type(&self) -> Option<&str> {
        self.default_content_type.as_deref()
    }

    pub fn ep_info(&self) -> &EpDocumentInfo {
        &self.ep
    }

    pub fn application_domain_name(&self) -> Option<&str> {
        self.ep.application_domain_name.as_deref()
    }

    /// Domain for shared assets (schemas, events), falling back to the
    /// document's application domain.
    pub fn assets_application_domain_name(&self) -> Option<&str> {
        self.ep
            .assets_application_domain_name
            .as_deref()
            .or(self.application_domain_name())
    }

    pub fn broker_type(&self) -> Option<&BrokerType> {
        self.ep.broker_type.as_ref()
    }

    pub fn channel_delimiter(&self) -> &str {
        self.ep
            .channel_delimiter
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_CHANNEL_DELIMITER)
    }

    /// Root-level `x-*` extensions, verbatim.
    pub fn extensions(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.extensions
    }

    pub fn channels(&self) -> &IndexMap<String, Channel> {
        &self.channels
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    /// Message documents keyed by canonical key, first-seen order.
    pub fn messages(&self) -> &IndexMap<String, MessageDocument> {
        &self.messages
    }

    pub fn message(&self, key: &str) -> Option<&MessageDocument> {
        self.messages.get(key)
    }

    pub fn message_keys(&self) -> impl Iterator<Item = &str> {
        self.messages.keys().map(String::as_str)
    }

    /// Application domain a message belongs to: its own declaration, else the
    /// document's assets domain.
    pub fn message_application_domain_name<'a>(
        &'a self,
        message: &'a MessageDocument,
    ) -> Option<&'a str> {
        message
            .ep_info()
            .application_domain_name
            .as_deref()
            .or(self.assets_application_domain_name())
    }

    /// Check the structural guarantees the builder establishes.
    ///
    /// A failure here means a document was produced outside the builder's
    /// contract.
    pub fn verify_invariants(&self) -> Result<(), AsyncApiError> {
        let breach = |detail: String| {
            AsyncApiError::malformed(format!("document invariant violated: {}", detail))
        };

        if self.channels.is_empty() {
            return Err(breach("no channels".into()));
        }
        if self.messages.is_empty() {
            return Err(breach("empty message map".into()));
        }
        for (key, message) in &self.messages {
            if message.key() != key.as_str() {
                return Err(breach(format!(
                    "message '{}' is stored under key '{}'",
                    message.key(),
                    key
                )));
            }
            if message.carriers().is_empty() {
                return Err(breach(format!("message '{}' is not carried by any channel", key)));
            }
            for carrier in message.carriers() {
                if !self.channels.contains_key(&carrier.channel) {
                    return Err(breach(format!(
                        "message '{}' references unknown channel '{}'",
                        key, carrier.channel
                    )));
                }
            }
        }
        for (name, channel) in &self.channels {
            let op_keys = channel.operations.iter().flat_map(|op| op.messages.iter());
            for key in channel.messages.iter().chain(op_keys) {
                if !self.messages.contains_key(key) {
                    return Err(breach(format!(
                        "channel '{}' references unknown message '{}'",
                        name, key
                    )));
                }
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn messages_mut_for_test(&mut self) -> &mut IndexMap<String, MessageDocument> {
        &mut self.messages
    }
}
