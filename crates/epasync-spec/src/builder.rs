use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::AsyncApiError;
use crate::message::{
    canonical_key, escape, extract_extensions, unescape, Carrier, MessageDocument, MessageSite,
};
use crate::model::{
    AsyncApiDocument, BrokerType, Channel, ChannelOperation, Direction, EpDocumentInfo, Info,
};
use crate::refs::{deref_node, ref_of};

/// AsyncAPI major versions the builder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Generation {
    /// 2.x: `publish`/`subscribe` operations nested in channels.
    V2,
    /// 3.x: channel `messages` maps plus root-level `operations`.
    V3,
}

/// Build a document from an already-parsed AsyncAPI tree.
///
/// Construction is all-or-nothing: the first structural error aborts the build.
pub fn build_document(root: &Value) -> Result<AsyncApiDocument, AsyncApiError> {
    let root_obj = root
        .as_object()
        .ok_or_else(|| AsyncApiError::malformed("document root must be an object"))?;

    let (asyncapi_version, generation) = detect_version(root_obj)?;

    let info_obj = root_obj
        .get("info")
        .and_then(|v| v.as_object())
        .ok_or_else(|| AsyncApiError::malformed("missing 'info' object"))?;

    let info = Info {
        title: str_field(info_obj, "title")
            .ok_or_else(|| AsyncApiError::malformed("missing 'info.title'"))?,
        version: str_field(info_obj, "version")
            .ok_or_else(|| AsyncApiError::malformed("missing 'info.version'"))?,
        description: str_field(info_obj, "description"),
    };

    let channels = root_obj
        .get("channels")
        .ok_or_else(|| AsyncApiError::malformed("missing 'channels' object"))?
        .as_object()
        .ok_or_else(|| AsyncApiError::malformed("'channels' must be an object"))?;

    if channels.is_empty() {
        return Err(AsyncApiError::EmptyDocument(format!(
            "'{}' declares no channels",
            info.title
        )));
    }

    let default_content_type = str_field(root_obj, "defaultContentType");
    let ep = EpDocumentInfo {
        application_domain_name: str_field(root_obj, "x-ep-application-domain-name"),
        assets_application_domain_name: str_field(root_obj, "x-ep-assets-application-domain-name"),
        broker_type: root_obj
            .get("x-ep-broker-type")
            .and_then(|v| v.as_str())
            .map(BrokerType::parse),
        channel_delimiter: str_field(root_obj, "x-ep-channel-delimiter"),
    };

    let mut collector = MessageCollector {
        root,
        default_content_type: default_content_type.as_deref(),
        messages: IndexMap::new(),
    };

    let built_channels = match generation {
        Generation::V2 => walk_v2_channels(root, channels, &mut collector)?,
        Generation::V3 => walk_v3(root, root_obj, channels, &mut collector)?,
    };

    let messages = collector.messages;
    if messages.is_empty() {
        return Err(AsyncApiError::EmptyDocument(format!(
            "no messages declared on channels: {}",
            built_channels
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    info!(
        title = %info.title,
        asyncapi = %asyncapi_version,
        channels = built_channels.len(),
        messages = messages.len(),
        "built AsyncAPI document"
    );

    Ok(AsyncApiDocument::new(
        asyncapi_version,
        info,
        default_content_type,
        ep,
        extract_extensions(root_obj),
        built_channels,
        messages,
    ))
}

/// Detect the AsyncAPI major version.
fn detect_version(
    root: &serde_json::Map<String, Value>,
) -> Result<(String, Generation), AsyncApiError> {
    let version = root
        .get("asyncapi")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AsyncApiError::malformed("missing 'asyncapi' version field"))?;
    let generation = if version.starts_with("2.") {
        Generation::V2
    } else if version.starts_with("3.") {
        Generation::V3
    } else {
        return Err(AsyncApiError::malformed(format!(
            "unsupported AsyncAPI version: {} (only 2.x and 3.x supported)",
            version
        )));
    };
    Ok((version.to_string(), generation))
}

/// Flattens messages into the document map, rejecting key collisions.
struct MessageCollector<'a> {
    root: &'a Value,
    default_content_type: Option<&'a str>,
    messages: IndexMap<String, MessageDocument>,
}

impl MessageCollector<'_> {
    /// Add the message at `site`, returning its canonical key.
    ///
    /// Reaching the same node again only records another carrier.
    fn collect(&mut self, node: &Value, site: MessageSite<'_>) -> Result<String, AsyncApiError> {
        let entity = format!("channel:{}", site.channel);
        let (concrete, last_ref) = deref_node(self.root, node, &entity)?;
        let origin = last_ref.unwrap_or(site.pointer);
        let mut key = canonical_key(concrete, last_ref, &site);
        let qualified = self
            .messages
            .get(&key)
            .filter(|existing| !existing.is_same_node(origin, concrete))
            .and_then(|_| channel_qualified_key(&key, origin));
        if let Some(qualified) = qualified {
            key = qualified;
        }
        let carrier = Carrier {
            channel: site.channel.to_string(),
            direction: site.direction,
        };

        if let Some(existing) = self.messages.get_mut(&key) {
            if !existing.is_same_node(origin, concrete) {
                let detail = format!(
                    "declared at '{}' and again at '{}' on channel '{}'",
                    existing.origin(),
                    origin,
                    site.channel
                );
                return Err(AsyncApiError::DuplicateMessageKey { key, detail });
            }
            existing.add_carrier(carrier);
            return Ok(key);
        }

        debug!(message = %key, channel = site.channel, origin, "adding message");
        let message = MessageDocument::build(
            self.root,
            key.clone(),
            origin.to_string(),
            concrete,
            carrier,
            self.default_content_type,
        )?;
        self.messages.insert(key.clone(), message);
        Ok(key)
    }

    fn add_carrier(&mut self, key: &str, carrier: Carrier) {
        if let Some(message) = self.messages.get_mut(key) {
            message.add_carrier(carrier);
        }
    }
}

/// Walk AsyncAPI 2.x channels and their `publish`/`subscribe` operations.
fn walk_v2_channels(
    root: &Value,
    channels: &serde_json::Map<String, Value>,
    collector: &mut MessageCollector<'_>,
) -> Result<IndexMap<String, Channel>, AsyncApiError> {
    let mut built = IndexMap::with_capacity(channels.len());

    for (name, value) in channels {
        let entity = format!("channel:{}", name);
        let (node, _) = deref_node(root, value, &entity)?;
        let obj = node.as_object().ok_or_else(|| {
            AsyncApiError::malformed(format!("channel '{}' must be an object", name))
        })?;

        debug!(channel = %name, "walking channel");
        let mut channel = Channel::new(
            name.clone(),
            None,
            str_field(obj, "description"),
            parameter_names(obj),
        );

        for (field, direction) in [
            ("publish", Direction::Publish),
            ("subscribe", Direction::Subscribe),
        ] {
            let Some(op_value) = obj.get(field) else {
                continue;
            };
            let op_obj = op_value.as_object().ok_or_else(|| {
                AsyncApiError::malformed(format!(
                    "{} operation on channel '{}' must be an object",
                    field, name
                ))
            })?;

            let mut keys = Vec::new();
            if let Some(message) = op_obj.get("message") {
                let site_pointer = format!("#/channels/{}/{}/message", escape(name), field);
                let (message_node, last_ref) = deref_node(root, message, &entity)?;

                if let Some(variants) = message_node.get("oneOf").and_then(|v| v.as_array()) {
                    let base = last_ref.unwrap_or(&site_pointer);
                    for (index, variant) in variants.iter().enumerate() {
                        let pointer = format!("{}/oneOf/{}", base, index);
                        let key = collector.collect(
                            variant,
                            MessageSite {
                                channel: name,
                                direction: Some(direction),
                                pointer: &pointer,
                                declared_id: None,
                                index,
                            },
                        )?;
                        push_unique(&mut keys, key);
                    }
                } else {
                    let key = collector.collect(
                        message,
                        MessageSite {
                            channel: name,
                            direction: Some(direction),
                            pointer: &site_pointer,
                            declared_id: None,
                            index: 0,
                        },
                    )?;
                    push_unique(&mut keys, key);
                }
            }

            channel.push_operation(ChannelOperation {
                direction,
                operation_id: str_field(op_obj, "operationId"),
                messages: keys,
            });
        }

        built.insert(name.clone(), channel);
    }

    Ok(built)
}

/// Walk AsyncAPI 3.x channels, then the root `operations` that act on them.
///
/// `receive` operations map to [`Direction::Publish`], `send` to
/// [`Direction::Subscribe`].
fn walk_v3(
    root: &Value,
    root_obj: &serde_json::Map<String, Value>,
    channels: &serde_json::Map<String, Value>,
    collector: &mut MessageCollector<'_>,
) -> Result<IndexMap<String, Channel>, AsyncApiError> {
    let mut built: IndexMap<String, Channel> = IndexMap::with_capacity(channels.len());

    for (name, value) in channels {
        let entity = format!("channel:{}", name);
        let (node, _) = deref_node(root, value, &entity)?;
        let obj = node.as_object().ok_or_else(|| {
            AsyncApiError::malformed(format!("channel '{}' must be an object", name))
        })?;

        debug!(channel = %name, "walking channel");
        let mut channel = Channel::new(
            name.clone(),
            str_field(obj, "address"),
            str_field(obj, "description"),
            parameter_names(obj),
        );

        if let Some(messages) = obj.get("messages").and_then(|v| v.as_object()) {
            for (index, (message_id, message)) in messages.iter().enumerate() {
                let pointer = format!(
                    "#/channels/{}/messages/{}",
                    escape(name),
                    escape(message_id)
                );
                let key = collector.collect(
                    message,
                    MessageSite {
                        channel: name,
                        direction: None,
                        pointer: &pointer,
                        declared_id: Some(message_id.as_str()),
                        index,
                    },
                )?;
                channel.add_message(&key);
            }
        }

        built.insert(name.clone(), channel);
    }

    let Some(operations) = root_obj.get("operations") else {
        return Ok(built);
    };
    let operations = operations
        .as_object()
        .ok_or_else(|| AsyncApiError::malformed("'operations' must be an object"))?;

    for (op_id, value) in operations {
        let entity = format!("operation:{}", op_id);
        let (node, _) = deref_node(root, value, &entity)?;
        let op_obj = node.as_object().ok_or_else(|| {
            AsyncApiError::malformed(format!("operation '{}' must be an object", op_id))
        })?;

        let direction = match op_obj.get("action").and_then(|v| v.as_str()) {
            Some("receive") => Direction::Publish,
            Some("send") => Direction::Subscribe,
            Some(other) => {
                return Err(AsyncApiError::malformed(format!(
                    "operation '{}' has invalid action '{}' (must be 'send' or 'receive')",
                    op_id, other
                )))
            }
            None => {
                return Err(AsyncApiError::malformed(format!(
                    "operation '{}' missing 'action' field",
                    op_id
                )))
            }
        };

        let channel_ref = op_obj.get("channel").and_then(ref_of).ok_or_else(|| {
            AsyncApiError::malformed(format!(
                "operation '{}' must reference its channel with $ref",
                op_id
            ))
        })?;
        let channel_name = channel_ref
            .strip_prefix("#/channels/")
            .map(unescape)
            .filter(|name| built.contains_key(name))
            .ok_or_else(|| AsyncApiError::unresolvable(channel_ref, entity.as_str()))?;

        let keys = match op_obj.get("messages").and_then(|v| v.as_array()) {
            None => {
                let keys = built
                    .get(&channel_name)
                    .map(|c| c.message_keys().to_vec())
                    .unwrap_or_default();
                for key in &keys {
                    collector.add_carrier(
                        key,
                        Carrier {
                            channel: channel_name.clone(),
                            direction: Some(direction),
                        },
                    );
                }
                keys
            }
            Some(refs) => {
                let mut keys = Vec::with_capacity(refs.len());
                for (index, message) in refs.iter().enumerate() {
                    let message_ref = ref_of(message).ok_or_else(|| {
                        AsyncApiError::malformed(format!(
                            "operation '{}' message #{} must be a $ref",
                            op_id,
                            index + 1
                        ))
                    })?;
                    let declared_id = channel_message_id(message_ref);
                    let key = collector.collect(
                        message,
                        MessageSite {
                            channel: &channel_name,
                            direction: Some(direction),
                            pointer: message_ref,
                            declared_id: declared_id.as_deref(),
                            index,
                        },
                    )?;
                    push_unique(&mut keys, key);
                }
                keys
            }
        };

        if let Some(channel) = built.get_mut(&channel_name) {
            channel.push_operation(ChannelOperation {
                direction,
                operation_id: Some(op_id.clone()),
                messages: keys,
            });
        }
    }

    Ok(built)
}

/// The message id of a `#/channels/<channel>/messages/<id>` pointer.
fn channel_message_id(pointer: &str) -> Option<String> {
    channel_message_parts(pointer).map(|(_, id)| id)
}

/// Channel name and message id of a `#/channels/<channel>/messages/<id>` pointer.
fn channel_message_parts(pointer: &str) -> Option<(String, String)> {
    let rest = pointer.strip_prefix("#/channels/")?;
    let mut segments = rest.split('/');
    let channel = segments.next()?;
    if segments.next()? != "messages" {
        return None;
    }
    let id = segments.next()?;
    if segments.next().is_some() {
        return None;
    }
    Some((unescape(channel), unescape(id)))
}

/// `<channel>/<id>` for an inline 3.x channel message keyed by its map entry.
///
/// Channel message ids are only unique within their channel, so a second
/// channel reusing the id gets the qualified key.
fn channel_qualified_key(key: &str, origin: &str) -> Option<String> {
    let (channel, id) = channel_message_parts(origin)?;
    (id == key).then(|| format!("{}/{}", channel, id))
}

fn parameter_names(channel: &serde_json::Map<String, Value>) -> Vec<String> {
    channel
        .get("parameters")
        .and_then(|v| v.as_object())
        .map(|params| params.keys().cloned().collect())
        .unwrap_or_default()
}

fn push_unique(keys: &mut Vec<String>, key: String) {
    if !keys.contains(&key) {
        keys.push(key);
    }
}

fn str_field(obj: &serde_json::Map<String, Value>, field: &str) -> Option<String> {
    obj.get(field).and_then(|v| v.as_str()).map(|s| s.to_string())
}
