//! Best-practice violations.
//!
//! Violations are plain data. The document never stores them; the rules
//! engine returns them and callers decide whether they are fatal.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a violated rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Level {
    Error,
    Warning,
}

impl Level {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warning" | "warn" => Some(Self::Warning),
            _ => None,
        }
    }
}

impl TryFrom<String> for Level {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        Self::parse(&value)
            .ok_or_else(|| format!("unknown level '{}' (expected 'error' or 'warning')", value))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "error"),
            Level::Warning => write!(f, "warning"),
        }
    }
}

/// A single rule failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Rule identifier (e.g. `BP005`).
    pub rule: String,
    pub level: Level,
    /// Entity path: `document`, `channel:<name>` or `message:<key>`, optionally `#field`.
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(
        rule: impl Into<String>,
        level: Level,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.into(),
            level,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.rule, self.level, self.path, self.message
        )
    }
}

/// An ordered collection of violations.
///
/// Entries are kept sorted by path, then rule, then message, so the set
/// is the same regardless of the order rules ran in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Violations {
    violations: Vec<Violation>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        let pos = self
            .violations
            .partition_point(|v| sort_key(v) <= sort_key(&violation));
        self.violations.insert(pos, violation);
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.violations.iter()
    }

    /// Number of error-level entries.
    pub fn error_count(&self) -> usize {
        self.violations
            .iter()
            .filter(|v| v.level == Level::Error)
            .count()
    }

    /// Number of warning-level entries.
    pub fn warning_count(&self) -> usize {
        self.violations
            .iter()
            .filter(|v| v.level == Level::Warning)
            .count()
    }

    /// Violations attached to one entity path (ignoring any `#field` suffix).
    pub fn for_entity<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a Violation> + 'a {
        self.violations
            .iter()
            .filter(move |v| v.path.split('#').next() == Some(entity))
    }
}

fn sort_key(v: &Violation) -> (&str, &str, &str) {
    (v.path.as_str(), v.rule.as_str(), v.message.as_str())
}

impl FromIterator<Violation> for Violations {
    fn from_iter<I: IntoIterator<Item = Violation>>(iter: I) -> Self {
        let mut violations = Violations::new();
        violations.extend(iter);
        violations
    }
}

impl Extend<Violation> for Violations {
    fn extend<I: IntoIterator<Item = Violation>>(&mut self, iter: I) {
        for v in iter {
            self.push(v);
        }
    }
}

impl<'a> IntoIterator for &'a Violations {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.iter()
    }
}

impl IntoIterator for Violations {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.into_iter()
    }
}
