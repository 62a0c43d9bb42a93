//! The best-practice rule set.
//!
//! Every rule is a pure function over a built document. Rules report at their
//! default level; the engine applies configured overrides afterwards.

use std::collections::HashMap;

use epasync_spec::{AsyncApiDocument, Level, SchemaFormatType, Violation};

use crate::config::RuleContext;

/// Signature shared by all rules.
pub type RuleFn = fn(&AsyncApiDocument, &RuleContext) -> Vec<Violation>;

/// One entry of the rule set.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    /// Stable identifier (e.g. `BP003`).
    pub id: &'static str,
    /// Short kebab-case name.
    pub name: &'static str,
    /// Default severity.
    pub level: Level,
    pub summary: &'static str,
    pub check: RuleFn,
}

/// All rules, in id order.
pub const RULES: &[Rule] = &[
    Rule {
        id: "BP001",
        name: "info-description",
        level: Level::Warning,
        summary: "info.description is present",
        check: info_description,
    },
    Rule {
        id: "BP002",
        name: "application-domain",
        level: Level::Error,
        summary: "the document declares x-ep-application-domain-name",
        check: application_domain,
    },
    Rule {
        id: "BP003",
        name: "channel-naming",
        level: Level::Error,
        summary: "channel segments are non-empty and match the segment pattern",
        check: channel_naming,
    },
    Rule {
        id: "BP004",
        name: "channel-parameters",
        level: Level::Error,
        summary: "channel placeholders and declared parameters agree",
        check: channel_parameters,
    },
    Rule {
        id: "BP005",
        name: "message-naming",
        level: Level::Error,
        summary: "message keys match the message name pattern",
        check: message_naming,
    },
    Rule {
        id: "BP006",
        name: "message-description",
        level: Level::Warning,
        summary: "messages carry a description or summary",
        check: message_description,
    },
    Rule {
        id: "BP007",
        name: "message-content-type",
        level: Level::Error,
        summary: "messages have an effective content type",
        check: message_content_type,
    },
    Rule {
        id: "BP008",
        name: "schema-format-supported",
        level: Level::Error,
        summary: "payload schemas are JSON Schema or Avro",
        check: schema_format_supported,
    },
    Rule {
        id: "BP009",
        name: "schema-format-deprecated",
        level: Level::Warning,
        summary: "payload schemas do not use JSON Schema draft-03 or draft-04",
        check: schema_format_deprecated,
    },
    Rule {
        id: "BP010",
        name: "operation-id",
        level: Level::Error,
        summary: "operations declare unique operationIds",
        check: operation_id,
    },
];

/// Look up a rule by id (case-insensitive) or name.
pub fn find_rule(id: &str) -> Option<&'static Rule> {
    RULES
        .iter()
        .find(|rule| rule.id.eq_ignore_ascii_case(id) || rule.name == id)
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |s| s.trim().is_empty())
}

fn info_description(doc: &AsyncApiDocument, _ctx: &RuleContext) -> Vec<Violation> {
    if is_blank(doc.info().description.as_deref()) {
        vec![Violation::new(
            "BP001",
            Level::Warning,
            "document#info.description",
            "info.description is missing",
        )]
    } else {
        Vec::new()
    }
}

fn application_domain(doc: &AsyncApiDocument, _ctx: &RuleContext) -> Vec<Violation> {
    if is_blank(doc.application_domain_name()) {
        vec![Violation::new(
            "BP002",
            Level::Error,
            "document#x-ep-application-domain-name",
            "document does not declare x-ep-application-domain-name",
        )]
    } else {
        Vec::new()
    }
}

fn channel_naming(doc: &AsyncApiDocument, ctx: &RuleContext) -> Vec<Violation> {
    let delimiter = doc.channel_delimiter();
    let mut violations = Vec::new();

    for (name, channel) in doc.channels() {
        let template = channel.address().unwrap_or(name);
        let path = format!("channel:{}", name);

        for (index, segment) in template.split(delimiter).enumerate() {
            if segment.is_empty() {
                violations.push(Violation::new(
                    "BP003",
                    Level::Error,
                    path.clone(),
                    format!("'{}' has an empty segment at position {}", template, index + 1),
                ));
                continue;
            }
            if is_placeholder(segment) {
                continue;
            }
            if !ctx.channel_segment().is_match(segment) {
                violations.push(Violation::new(
                    "BP003",
                    Level::Error,
                    path.clone(),
                    format!(
                        "segment '{}' does not match {}",
                        segment,
                        ctx.channel_segment().as_str()
                    ),
                ));
            }
        }
    }

    violations
}

/// `{name}` with a non-empty name of letters, digits, `_` or `-`.
fn is_placeholder(segment: &str) -> bool {
    segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .is_some_and(|inner| {
            !inner.is_empty()
                && inner
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        })
}

fn channel_parameters(doc: &AsyncApiDocument, _ctx: &RuleContext) -> Vec<Violation> {
    let mut violations = Vec::new();

    for (name, channel) in doc.channels() {
        let placeholders = channel.placeholders();
        let declared = channel.parameters();

        for placeholder in &placeholders {
            if !declared.iter().any(|p| p == placeholder) {
                violations.push(Violation::new(
                    "BP004",
                    Level::Error,
                    format!("channel:{}#parameters", name),
                    format!("placeholder '{{{}}}' is not declared in parameters", placeholder),
                ));
            }
        }
        for param in declared {
            if !placeholders.contains(&param.as_str()) {
                violations.push(Violation::new(
                    "BP004",
                    Level::Error,
                    format!("channel:{}#parameters", name),
                    format!("parameter '{}' is declared but not used", param),
                ));
            }
        }
    }

    violations
}

fn message_naming(doc: &AsyncApiDocument, ctx: &RuleContext) -> Vec<Violation> {
    doc.messages()
        .keys()
        .filter(|key| !ctx.message_name().is_match(key))
        .map(|key| {
            Violation::new(
                "BP005",
                Level::Error,
                format!("message:{}", key),
                format!(
                    "name '{}' does not match {}",
                    key,
                    ctx.message_name().as_str()
                ),
            )
        })
        .collect()
}

fn message_description(doc: &AsyncApiDocument, _ctx: &RuleContext) -> Vec<Violation> {
    doc.messages()
        .iter()
        .filter(|(_, m)| is_blank(m.description()) && is_blank(m.summary()))
        .map(|(key, _)| {
            Violation::new(
                "BP006",
                Level::Warning,
                format!("message:{}#description", key),
                "message has neither description nor summary",
            )
        })
        .collect()
}

fn message_content_type(doc: &AsyncApiDocument, _ctx: &RuleContext) -> Vec<Violation> {
    doc.messages()
        .iter()
        .filter(|(_, m)| is_blank(m.effective_content_type()))
        .map(|(key, _)| {
            Violation::new(
                "BP007",
                Level::Error,
                format!("message:{}#contentType", key),
                "no contentType and no document defaultContentType",
            )
        })
        .collect()
}

fn schema_format_supported(doc: &AsyncApiDocument, _ctx: &RuleContext) -> Vec<Violation> {
    doc.messages()
        .iter()
        .filter(|(_, m)| m.schema_format_type() == SchemaFormatType::Unsupported)
        .map(|(key, m)| {
            let detail = match (m.schema_format(), m.payload()) {
                (Some(format), _) => format!("schema format '{}' is not supported", format),
                (None, None) => "message has no payload schema".to_string(),
                (None, Some(_)) => "payload is neither JSON Schema nor Avro".to_string(),
            };
            Violation::new(
                "BP008",
                Level::Error,
                format!("message:{}#payload", key),
                detail,
            )
        })
        .collect()
}

const DEPRECATED_DRAFTS: &[&str] = &["draft-03", "draft-04"];

fn deprecated_draft(text: &str) -> Option<&'static str> {
    let lower = text.to_ascii_lowercase();
    DEPRECATED_DRAFTS
        .iter()
        .copied()
        .find(|draft| lower.contains(draft))
}

fn schema_format_deprecated(doc: &AsyncApiDocument, _ctx: &RuleContext) -> Vec<Violation> {
    let mut violations = Vec::new();

    for (key, message) in doc.messages() {
        if message.schema_format_type() != SchemaFormatType::ApplicationJson {
            continue;
        }
        let declared = message.schema_format().and_then(deprecated_draft);
        let dialect = message
            .payload()
            .and_then(|p| p.get("$schema"))
            .and_then(|s| s.as_str())
            .and_then(deprecated_draft);
        if let Some(draft) = declared.or(dialect) {
            violations.push(Violation::new(
                "BP009",
                Level::Warning,
                format!("message:{}#payload", key),
                format!("JSON Schema {} is deprecated", draft),
            ));
        }
    }

    violations
}

fn operation_id(doc: &AsyncApiDocument, _ctx: &RuleContext) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut seen: HashMap<&str, String> = HashMap::new();

    for (name, channel) in doc.channels() {
        for op in channel.operations() {
            let location = format!("{} on '{}'", op.direction, name);
            let path = format!("channel:{}#{}", name, op.direction);
            match op.operation_id.as_deref() {
                None => violations.push(Violation::new(
                    "BP010",
                    Level::Error,
                    path,
                    format!("{} operation has no operationId", op.direction),
                )),
                Some(id) => {
                    if let Some(first) = seen.get(id) {
                        violations.push(Violation::new(
                            "BP010",
                            Level::Error,
                            path,
                            format!("operationId '{}' already used by {}", id, first),
                        ));
                    } else {
                        seen.insert(id, location);
                    }
                }
            }
        }
    }

    violations
}
