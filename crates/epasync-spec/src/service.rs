//! Document service: source in, built document out.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::builder::build_document;
use crate::error::AsyncApiError;
use crate::model::AsyncApiDocument;

/// Where a document comes from.
#[derive(Debug, Clone)]
pub enum SpecSource {
    /// A YAML or JSON file on disk.
    File(PathBuf),
    /// YAML or JSON text.
    Text(String),
    /// An already-parsed tree.
    Tree(Value),
}

impl SpecSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        SpecSource::File(path.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        SpecSource::Text(text.into())
    }
}

impl From<Value> for SpecSource {
    fn from(tree: Value) -> Self {
        SpecSource::Tree(tree)
    }
}

/// Stateless front door for building documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentService;

impl DocumentService {
    pub fn new() -> Self {
        DocumentService
    }

    /// Read, parse and build a document.
    ///
    /// Read failures are `Io`, syntax failures are `Parse`; builder errors
    /// pass through unchanged.
    pub fn create_from_source(&self, source: SpecSource) -> Result<AsyncApiDocument, AsyncApiError> {
        let tree = match source {
            SpecSource::File(path) => parse_text(&read_file(&path)?)?,
            SpecSource::Text(text) => parse_text(&text)?,
            SpecSource::Tree(tree) => tree,
        };
        build_document(&tree)
    }
}

/// Build a document from a file path.
pub fn load_document(path: &Path) -> Result<AsyncApiDocument, AsyncApiError> {
    DocumentService::new().create_from_source(SpecSource::File(path.to_path_buf()))
}

fn read_file(path: &Path) -> Result<String, AsyncApiError> {
    debug!(path = %path.display(), "reading spec file");
    std::fs::read_to_string(path).map_err(|source| AsyncApiError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Parse YAML (JSON is valid YAML) into a JSON tree.
fn parse_text(text: &str) -> Result<Value, AsyncApiError> {
    serde_yaml::from_str(text).map_err(|e| AsyncApiError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;

    const MINIMAL: &str = r##"
asyncapi: "2.6.0"
info:
  title: Minimal
  version: "1.0.0"
channels:
  ping:
    publish:
      message:
        name: Ping
        payload:
          type: object
"##;

    #[test]
    fn builds_from_text() {
        let doc = DocumentService::new()
            .create_from_source(SpecSource::text(MINIMAL))
            .unwrap();
        assert_eq!(doc.title(), "Minimal");
        assert!(doc.message("Ping").is_some());
    }

    #[test]
    fn builds_from_json_text() {
        let json = r#"{"asyncapi":"2.6.0","info":{"title":"J","version":"1"},
            "channels":{"c":{"subscribe":{"message":{"name":"M","payload":{"type":"string"}}}}}}"#;
        let doc = DocumentService::new()
            .create_from_source(SpecSource::text(json))
            .unwrap();
        assert_eq!(doc.messages().len(), 1);
    }

    #[test]
    fn builds_from_tree() {
        let tree: Value = serde_yaml::from_str(MINIMAL).unwrap();
        let doc = DocumentService::new()
            .create_from_source(tree.into())
            .unwrap();
        assert_eq!(doc.version(), "1.0.0");
    }

    #[test]
    fn builds_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let doc = load_document(file.path()).unwrap();
        assert_eq!(doc.title(), "Minimal");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = DocumentService::new()
            .create_from_source(SpecSource::file("/nonexistent/spec.yaml"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("/nonexistent/spec.yaml"));
    }

    #[test]
    fn invalid_yaml_is_parse_error() {
        let err = DocumentService::new()
            .create_from_source(SpecSource::text("asyncapi: [unclosed"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(err.code(), "E2001");
    }

    #[test]
    fn builder_errors_pass_through() {
        let err = DocumentService::new()
            .create_from_source(SpecSource::text("asyncapi: \"2.6.0\"\ninfo:\n  title: T\n  version: \"1\"\nchannels: {}\n"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyDocument);
    }
}
