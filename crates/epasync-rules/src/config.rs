//! Rules configuration (`epasync-rules.yaml`).
//!
//! ```yaml
//! mode: fail-fast
//! disabled: [BP001]
//! levels:
//!   BP006: error
//! channel_segment_pattern: "^[a-z][a-z0-9-]*$"
//! message_name_pattern: "^[A-Z][A-Za-z0-9]*$"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use epasync_spec::Level;

use crate::rules::{find_rule, Rule};

/// Lowercase segments, digits allowed, joined by `-`, `_` or `.`.
pub const DEFAULT_CHANNEL_SEGMENT_PATTERN: &str = r"^[a-z0-9]+([-_.][a-z0-9]+)*$";

/// Starts with a letter; letters, digits, `-`, `_` and `.` after that.
pub const DEFAULT_MESSAGE_NAME_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9_.-]*$";

/// Errors raised while loading rules configuration (E2020–E2023).
#[derive(Debug, Error)]
pub enum RulesConfigError {
    /// E2020: The config file could not be read.
    #[error("E2020: failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// E2021: The config is not valid YAML for this schema.
    #[error("E2021: failed to parse rules config: {0}")]
    Parse(String),

    /// E2022: A naming pattern does not compile.
    #[error("E2022: invalid {field} '{pattern}': {reason}")]
    InvalidPattern {
        field: &'static str,
        pattern: String,
        reason: String,
    },

    /// E2023: A rule id that is not in the rule set.
    #[error("E2023: unknown rule id '{0}'")]
    UnknownRule(String),
}

/// How the engine treats error-level violations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationMode {
    /// Run every rule and collect everything.
    #[default]
    Accumulate,
    /// Stop at the first error-level violation.
    FailFast,
}

/// User-tunable rule settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesConfig {
    pub mode: ValidationMode,
    /// Rule ids that never run.
    pub disabled: Vec<String>,
    /// Per-rule severity overrides.
    pub levels: BTreeMap<String, Level>,
    pub channel_segment_pattern: String,
    pub message_name_pattern: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            mode: ValidationMode::Accumulate,
            disabled: Vec::new(),
            levels: BTreeMap::new(),
            channel_segment_pattern: DEFAULT_CHANNEL_SEGMENT_PATTERN.to_string(),
            message_name_pattern: DEFAULT_MESSAGE_NAME_PATTERN.to_string(),
        }
    }
}

impl RulesConfig {
    /// Load a config from a YAML file.
    pub fn load(path: &Path) -> Result<Self, RulesConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| RulesConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and check a config from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, RulesConfigError> {
        let config: RulesConfig =
            serde_yaml::from_str(content).map_err(|e| RulesConfigError::Parse(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn disable(mut self, rule_id: impl Into<String>) -> Self {
        self.disabled.push(rule_id.into());
        self
    }

    pub fn with_level(mut self, rule_id: impl Into<String>, level: Level) -> Self {
        self.levels.insert(rule_id.into(), level);
        self
    }

    pub fn is_disabled(&self, rule_id: &str) -> bool {
        self.disabled.iter().any(|id| id.eq_ignore_ascii_case(rule_id))
    }

    /// The severity a rule reports at, after overrides.
    pub fn level_for(&self, rule: &Rule) -> Level {
        self.levels
            .iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(rule.id))
            .map(|(_, level)| *level)
            .unwrap_or(rule.level)
    }

    /// Reject unknown rule ids and patterns that do not compile.
    pub fn check(&self) -> Result<(), RulesConfigError> {
        for id in self.disabled.iter().chain(self.levels.keys()) {
            if find_rule(id).is_none() {
                return Err(RulesConfigError::UnknownRule(id.clone()));
            }
        }
        RuleContext::compile(self).map(|_| ())
    }
}

/// Compiled settings handed to every rule.
#[derive(Debug, Clone)]
pub struct RuleContext {
    channel_segment: Regex,
    message_name: Regex,
}

impl RuleContext {
    pub fn compile(config: &RulesConfig) -> Result<Self, RulesConfigError> {
        Ok(Self {
            channel_segment: compile_pattern(
                "channel_segment_pattern",
                &config.channel_segment_pattern,
            )?,
            message_name: compile_pattern("message_name_pattern", &config.message_name_pattern)?,
        })
    }

    pub fn channel_segment(&self) -> &Regex {
        &self.channel_segment
    }

    pub fn message_name(&self) -> &Regex {
        &self.message_name
    }
}

impl Default for RuleContext {
    fn default() -> Self {
        Self {
            channel_segment: Regex::new(DEFAULT_CHANNEL_SEGMENT_PATTERN)
                .expect("default channel segment pattern compiles"),
            message_name: Regex::new(DEFAULT_MESSAGE_NAME_PATTERN)
                .expect("default message name pattern compiles"),
        }
    }
}

fn compile_pattern(field: &'static str, pattern: &str) -> Result<Regex, RulesConfigError> {
    Regex::new(pattern).map_err(|e| RulesConfigError::InvalidPattern {
        field,
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}
