use thiserror::Error;

use crate::violation::Violations;

/// Errors produced while loading, building, or checking an AsyncAPI document (E2000–E2010).
#[derive(Debug, Error)]
pub enum AsyncApiError {
    /// E2000: The spec source could not be read.
    #[error("E2000: I/O error reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// E2001: YAML/JSON parse error.
    #[error("E2001: parse error: {0}")]
    Parse(String),

    /// E2002: Required sections are missing or have the wrong shape.
    #[error("E2002: malformed document: {0}")]
    MalformedDocument(String),

    /// E2003: No usable channels or messages.
    #[error("E2003: empty document: {0}")]
    EmptyDocument(String),

    /// E2004: Two distinct message nodes share a canonical key.
    #[error("E2004: duplicate message key '{key}': {detail}")]
    DuplicateMessageKey { key: String, detail: String },

    /// E2005: A `$ref` could not be dereferenced within the document.
    #[error("E2005: unresolvable reference '{reference}' in {entity}")]
    UnresolvableSchemaReference { reference: String, entity: String },

    /// E2010: One or more error-level best-practice violations.
    #[error("E2010: {} best practice violation(s)", .0.len())]
    BestPracticeViolations(Violations),
}

/// Discriminant of [`AsyncApiError`], for callers that branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Parse,
    MalformedDocument,
    EmptyDocument,
    DuplicateMessageKey,
    UnresolvableSchemaReference,
    BestPracticeViolations,
}

impl AsyncApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AsyncApiError::Io { .. } => ErrorKind::Io,
            AsyncApiError::Parse(_) => ErrorKind::Parse,
            AsyncApiError::MalformedDocument(_) => ErrorKind::MalformedDocument,
            AsyncApiError::EmptyDocument(_) => ErrorKind::EmptyDocument,
            AsyncApiError::DuplicateMessageKey { .. } => ErrorKind::DuplicateMessageKey,
            AsyncApiError::UnresolvableSchemaReference { .. } => {
                ErrorKind::UnresolvableSchemaReference
            }
            AsyncApiError::BestPracticeViolations(_) => ErrorKind::BestPracticeViolations,
        }
    }

    /// Stable diagnostic code, as printed by the CLI.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Io => "E2000",
            ErrorKind::Parse => "E2001",
            ErrorKind::MalformedDocument => "E2002",
            ErrorKind::EmptyDocument => "E2003",
            ErrorKind::DuplicateMessageKey => "E2004",
            ErrorKind::UnresolvableSchemaReference => "E2005",
            ErrorKind::BestPracticeViolations => "E2010",
        }
    }

    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        AsyncApiError::MalformedDocument(detail.into())
    }

    pub(crate) fn unresolvable(reference: &str, entity: impl Into<String>) -> Self {
        AsyncApiError::UnresolvableSchemaReference {
            reference: reference.to_string(),
            entity: entity.into(),
        }
    }
}
