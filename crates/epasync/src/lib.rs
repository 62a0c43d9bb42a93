//! Command implementations for the `epasync` binary.
//!
//! Kept in a library so the result shaping can be tested without spawning
//! the process.

use std::path::Path;

use serde::Serialize;

use epasync_rules::{ValidationEngine, ValidationReport};
use epasync_spec::{
    load_document, AsyncApiDocument, AsyncApiError, Level, SchemaFormatType, Violation,
};
use epasync_telemetry::{log_document_built, log_document_rejected, log_validation_completed};

/// Validation result for a single spec file.
#[derive(Debug, Serialize)]
pub struct ValidationResult {
    pub file: String,
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

#[derive(Debug, Serialize)]
pub struct ValidationIssue {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ValidationIssue {
    fn from_error(file: &str, error: &AsyncApiError) -> Self {
        let code = error.code();
        let text = error.to_string();
        let message = text
            .strip_prefix(code)
            .and_then(|rest| rest.strip_prefix(": "))
            .unwrap_or(&text)
            .to_string();
        Self {
            code: code.to_string(),
            message,
            location: Some(file.to_string()),
        }
    }

    fn from_violation(file: &str, violation: &Violation) -> Self {
        Self {
            code: violation.rule.clone(),
            message: violation.message.clone(),
            location: Some(format!("{}:{}", file, violation.path)),
        }
    }
}

/// Build and check one spec file.
///
/// With `strict`, warnings make the file invalid too.
pub fn validate_file(file: &str, engine: &ValidationEngine, strict: bool) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match load_document(Path::new(file)).and_then(|doc| {
        log_document_built!(
            file = %file,
            title = %doc.title(),
            channels = doc.channels().len(),
            messages = doc.messages().len(),
            "document built"
        );
        engine.validate(&doc)
    }) {
        Ok(report) => {
            log_validation_completed!(
                file = %file,
                errors = report.error_count(),
                warnings = report.warning_count(),
                stopped_early = report.stopped_early,
                "validation completed"
            );
            sort_issues(file, &report, &mut errors, &mut warnings);
        }
        Err(e) => {
            log_document_rejected!(file = %file, code = e.code(), error = %e, "document rejected");
            errors.push(ValidationIssue::from_error(file, &e));
        }
    }

    let valid = errors.is_empty() && !(strict && !warnings.is_empty());
    ValidationResult {
        file: file.to_string(),
        valid,
        errors,
        warnings,
    }
}

fn sort_issues(
    file: &str,
    report: &ValidationReport,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    for violation in report.violations() {
        let issue = ValidationIssue::from_violation(file, violation);
        match violation.level {
            Level::Error => errors.push(issue),
            Level::Warning => warnings.push(issue),
        }
    }
}

/// One row of `epasync inspect`.
#[derive(Debug, Serialize)]
pub struct MessageSummary {
    pub key: String,
    pub schema_format: SchemaFormatType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_domain: Option<String>,
    pub channels: Vec<String>,
}

/// Output of `epasync inspect`.
#[derive(Debug, Serialize)]
pub struct DocumentSummary {
    pub file: String,
    pub asyncapi: String,
    pub title: String,
    pub version: String,
    pub messages: Vec<MessageSummary>,
}

/// Summarize the message map of a built document.
pub fn summarize(file: &str, doc: &AsyncApiDocument) -> DocumentSummary {
    let messages = doc
        .messages()
        .iter()
        .map(|(key, message)| MessageSummary {
            key: key.clone(),
            schema_format: message.schema_format_type(),
            content_type: message.effective_content_type().map(str::to_string),
            application_domain: doc
                .message_application_domain_name(message)
                .map(str::to_string),
            channels: message
                .channel_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
        .collect();

    DocumentSummary {
        file: file.to_string(),
        asyncapi: doc.asyncapi_version().to_string(),
        title: doc.title().to_string(),
        version: doc.version().to_string(),
        messages,
    }
}

/// Load a spec file and summarize it.
pub fn inspect_file(file: &str) -> Result<DocumentSummary, AsyncApiError> {
    let doc = load_document(Path::new(file))?;
    Ok(summarize(file, &doc))
}
