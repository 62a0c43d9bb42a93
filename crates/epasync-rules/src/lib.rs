//! Best-practice validation for built AsyncAPI documents.
//!
//! Runs the fixed rule set in [`rules::RULES`] over an [`AsyncApiDocument`]
//! and returns a [`ValidationReport`]. Violations are data, not errors: the
//! only hard failure is a document that breaks the builder's invariants.

pub mod config;
pub mod rules;

use serde::Serialize;
use tracing::debug;

use epasync_spec::{AsyncApiDocument, AsyncApiError, Level, Violation, Violations};

pub use config::{RuleContext, RulesConfig, RulesConfigError, ValidationMode};
pub use rules::{find_rule, Rule, RuleFn, RULES};

/// Outcome of validating one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Document title.
    pub document: String,
    pub violations: Violations,
    /// Number of rules that ran.
    pub rules_run: usize,
    /// Set when fail-fast mode stopped at an error.
    pub stopped_early: bool,
}

impl ValidationReport {
    pub fn violations(&self) -> &Violations {
        &self.violations
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.violations.error_count() > 0
    }

    pub fn error_count(&self) -> usize {
        self.violations.error_count()
    }

    pub fn warning_count(&self) -> usize {
        self.violations.warning_count()
    }

    /// Fail with [`AsyncApiError::BestPracticeViolations`] if any violation
    /// is error-level. Warnings alone keep the report.
    pub fn into_result(self) -> Result<ValidationReport, AsyncApiError> {
        if self.has_errors() {
            Err(AsyncApiError::BestPracticeViolations(self.violations))
        } else {
            Ok(self)
        }
    }
}

/// Runs the rule set with a given configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationEngine {
    config: RulesConfig,
    context: RuleContext,
}

impl ValidationEngine {
    /// Build an engine, compiling the configured patterns.
    pub fn new(config: RulesConfig) -> Result<Self, RulesConfigError> {
        config.check()?;
        let context = RuleContext::compile(&config)?;
        Ok(Self { config, context })
    }

    pub fn config(&self) -> &RulesConfig {
        &self.config
    }

    /// Validate a document.
    ///
    /// Returns `MalformedDocument` only if the document breaks its structural
    /// invariants; rule failures are reported in the returned report.
    pub fn validate(&self, document: &AsyncApiDocument) -> Result<ValidationReport, AsyncApiError> {
        document.verify_invariants()?;

        let fail_fast = self.config.mode == ValidationMode::FailFast;
        let mut violations = Violations::new();
        let mut rules_run = 0;
        let mut stopped_early = false;

        for rule in RULES {
            if self.config.is_disabled(rule.id) {
                debug!(rule = rule.id, "rule disabled");
                continue;
            }
            rules_run += 1;
            let level = self.config.level_for(rule);

            for mut violation in (rule.check)(document, &self.context) {
                violation.level = level;
                violations.push(violation);
                if fail_fast && level == Level::Error {
                    stopped_early = true;
                    break;
                }
            }
            if stopped_early {
                debug!(rule = rule.id, "fail-fast: stopping at first error");
                break;
            }
        }

        debug!(
            document = %document.title(),
            rules_run,
            errors = violations.error_count(),
            warnings = violations.warning_count(),
            "validation finished"
        );

        Ok(ValidationReport {
            document: document.title().to_string(),
            violations,
            rules_run,
            stopped_early,
        })
    }
}

/// Validate a document with the default configuration.
pub fn validate(document: &AsyncApiDocument) -> Result<ValidationReport, AsyncApiError> {
    ValidationEngine::default().validate(document)
}

/// Document-level entry point for best-practice checks.
pub trait BestPractices {
    fn validate_best_practices(&self) -> Result<ValidationReport, AsyncApiError>;
}

impl BestPractices for AsyncApiDocument {
    fn validate_best_practices(&self) -> Result<ValidationReport, AsyncApiError> {
        validate(self)
    }
}

/// Violations of one entity, convenient for callers rendering per-message output.
pub fn violations_for<'a>(
    report: &'a ValidationReport,
    entity: &'a str,
) -> impl Iterator<Item = &'a Violation> + 'a {
    report.violations.for_entity(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use epasync_spec::{build_document, ErrorKind};

    fn doc(yaml: &str) -> AsyncApiDocument {
        let tree: serde_json::Value = serde_yaml::from_str(yaml).unwrap();
        build_document(&tree).unwrap()
    }

    const COMPLIANT: &str = r##"
asyncapi: "2.6.0"
info:
  title: Orders
  version: "1.0.0"
  description: Order lifecycle events
x-ep-application-domain-name: Orders
defaultContentType: application/json
channels:
  orders/{region}/created:
    parameters:
      region:
        schema:
          type: string
    subscribe:
      operationId: onOrderCreated
      message:
        $ref: "#/components/messages/OrderCreated"
  orders/{region}/archived:
    parameters:
      region:
        schema:
          type: string
    publish:
      operationId: archiveOrder
      message:
        $ref: "#/components/messages/OrderArchived"
components:
  messages:
    OrderCreated:
      summary: An order was placed
      schemaFormat: application/vnd.apache.avro;version=1.9.0
      payload:
        type: record
        name: OrderCreated
        fields:
          - name: id
            type: string
    OrderArchived:
      description: An order was archived
      payload:
        type: object
        properties:
          id:
            type: string
"##;

    const MISSING_DOMAIN: &str = r##"
asyncapi: "2.6.0"
info:
  title: No Domain
  version: "1.0.0"
channels:
  orders/created:
    subscribe:
      operationId: onOrderCreated
      message:
        name: OrderCreated
        payload:
          type: object
"##;

    #[test]
    fn compliant_document_has_no_violations() {
        let report = doc(COMPLIANT).validate_best_practices().unwrap();
        assert!(report.is_clean(), "{:?}", report.violations);
        assert_eq!(report.rules_run, RULES.len());
        assert!(!report.stopped_early);
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn missing_domain_names_field_and_entity() {
        let report = validate(&doc(MISSING_DOMAIN)).unwrap();
        let domain: Vec<_> = violations_for(&report, "document")
            .filter(|v| v.rule == "BP002")
            .collect();
        assert_eq!(domain.len(), 1);
        assert_eq!(domain[0].path, "document#x-ep-application-domain-name");
        assert!(domain[0].message.contains("x-ep-application-domain-name"));
    }

    #[test]
    fn accumulate_collects_everything() {
        let report = validate(&doc(MISSING_DOMAIN)).unwrap();
        let rules: Vec<&str> = report.violations.iter().map(|v| v.rule.as_str()).collect();
        // sorted by path: document fields first, then message:OrderCreated#contentType
        assert_eq!(rules, vec!["BP001", "BP002", "BP007", "BP006"]);
        assert_eq!(report.error_count(), 2);
        assert_eq!(report.warning_count(), 2);
    }

    #[test]
    fn fail_fast_stops_at_first_error() {
        let engine =
            ValidationEngine::new(RulesConfig::default().with_mode(ValidationMode::FailFast))
                .unwrap();
        let report = engine.validate(&doc(MISSING_DOMAIN)).unwrap();
        assert!(report.stopped_early);
        assert_eq!(report.rules_run, 2);
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.warning_count(), 1);
    }

    #[test]
    fn disabled_rules_do_not_run() {
        let engine = ValidationEngine::new(RulesConfig::default().disable("BP002")).unwrap();
        let report = engine.validate(&doc(MISSING_DOMAIN)).unwrap();
        assert_eq!(report.rules_run, RULES.len() - 1);
        assert!(report.violations.iter().all(|v| v.rule != "BP002"));
    }

    #[test]
    fn level_overrides_apply() {
        let config = RulesConfig::default()
            .with_level("BP002", Level::Warning)
            .with_level("BP007", Level::Warning);
        let report = ValidationEngine::new(config)
            .unwrap()
            .validate(&doc(MISSING_DOMAIN))
            .unwrap();
        assert!(!report.has_errors());
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn into_result_fails_on_errors() {
        let err = validate(&doc(MISSING_DOMAIN))
            .unwrap()
            .into_result()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BestPracticeViolations);
        assert!(err.to_string().starts_with("E2010: 4 best practice violation(s)"));
        match err {
            AsyncApiError::BestPracticeViolations(v) => assert_eq!(v.error_count(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = RulesConfig {
            message_name_pattern: "[".into(),
            ..RulesConfig::default()
        };
        assert!(matches!(
            ValidationEngine::new(config),
            Err(RulesConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn repeated_validation_is_stable() {
        let document = doc(MISSING_DOMAIN);
        let first = validate(&document).unwrap();
        let second = validate(&document).unwrap();
        assert_eq!(first, second);
    }
}
