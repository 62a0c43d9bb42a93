//! CLI regression tests for the `epasync` binary.
//!
//! These tests invoke the binary as a subprocess to catch regressions in flag
//! names, exit codes and output formats.
//!
//! Run with: `cargo test -p epasync-test`
//! Requires the `epasync` binary to be built first (`cargo build -p epasync`).

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Returns an assert_cmd Command wrapping the `epasync` binary.
fn epasync() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("epasync")
        .expect("epasync binary not found, run `cargo build -p epasync` first");
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Absolute path to the shared test fixtures directory.
fn fixtures() -> PathBuf {
    // CARGO_MANIFEST_DIR = .../crates/epasync-test
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("crates/")
        .parent()
        .expect("workspace root")
        .join("tests/fixtures")
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    let s = String::from_utf8(output.stdout.clone()).expect("stdout should be valid UTF-8");
    serde_json::from_str(&s).expect("stdout should be valid JSON")
}

// ---------------------------------------------------------------------------
// epasync validate
// ---------------------------------------------------------------------------

#[test]
fn validate_compliant_spec_exits_zero() {
    epasync()
        .args(["validate", "--spec"])
        .arg(fixtures().join("avro-and-json.yaml"))
        .assert()
        .success()
        .stderr(contains("is valid"));
}

#[test]
fn validate_asyncapi3_spec_exits_zero() {
    epasync()
        .args(["validate", "--spec"])
        .arg(fixtures().join("asyncapi3.yaml"))
        .assert()
        .success();
}

#[test]
fn validate_missing_domain_reports_rule() {
    epasync()
        .args(["validate", "--spec"])
        .arg(fixtures().join("missing-domain.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("BP002"))
        .stderr(contains("document#x-ep-application-domain-name"));
}

#[test]
fn validate_parse_error_exits_one() {
    epasync()
        .args(["validate", "--spec"])
        .arg(fixtures().join("invalid-parse-error.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E2001"));
}

#[test]
fn validate_missing_file_exits_one() {
    epasync()
        .args(["validate", "--spec", "this-file-does-not-exist.yaml"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E2000"));
}

#[test]
fn validate_duplicate_message_exits_one() {
    epasync()
        .args(["validate", "--spec"])
        .arg(fixtures().join("invalid-duplicate-message.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E2004"))
        .stderr(contains("OrderEvent"));
}

#[test]
fn validate_empty_document_exits_one() {
    epasync()
        .args(["validate", "--spec"])
        .arg(fixtures().join("invalid-empty.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E2003"));
}

#[test]
fn validate_unresolvable_ref_exits_one() {
    epasync()
        .args(["validate", "--spec"])
        .arg(fixtures().join("invalid-unresolvable-ref.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E2005"))
        .stderr(contains("#/components/schemas/Missing"));
}

#[test]
fn validate_multiple_specs_reports_each() {
    epasync()
        .args(["validate", "--spec"])
        .arg(fixtures().join("avro-and-json.yaml"))
        .arg(fixtures().join("missing-domain.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("validated 2 spec(s): 1 valid, 1 invalid"));
}

#[test]
fn validate_warnings_pass_unless_strict() {
    epasync()
        .args(["validate", "--spec"])
        .arg(fixtures().join("warnings-only.yaml"))
        .assert()
        .success()
        .stderr(contains("with 2 warning(s)"));

    epasync()
        .args(["validate", "--strict", "--spec"])
        .arg(fixtures().join("warnings-only.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("(strict)"));
}

#[test]
fn validate_rules_file_changes_outcome() {
    let rules = fixtures().join("rules/lenient.yaml");

    epasync()
        .args(["validate", "--spec"])
        .arg(fixtures().join("missing-domain.yaml"))
        .arg("--rules")
        .arg(&rules)
        .assert()
        .success();

    epasync()
        .args(["validate", "--spec"])
        .arg(fixtures().join("warnings-only.yaml"))
        .arg("--rules")
        .arg(&rules)
        .assert()
        .failure()
        .code(1)
        .stderr(contains("BP006"));
}

#[test]
fn validate_invalid_rules_file_exits_one() {
    epasync()
        .args(["validate", "--spec"])
        .arg(fixtures().join("avro-and-json.yaml"))
        .arg("--rules")
        .arg(fixtures().join("rules/invalid-pattern.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E2022"));
}

#[test]
fn validate_rules_file_from_temp_dir() {
    let tmp = TempDir::new().expect("temp dir");
    let rules = tmp.path().join("rules.yaml");
    std::fs::write(&rules, "disabled: [BP001, BP006]\n").expect("write rules");

    epasync()
        .args(["validate", "--strict", "--spec"])
        .arg(fixtures().join("warnings-only.yaml"))
        .arg("--rules")
        .arg(&rules)
        .assert()
        .success();
}

#[test]
fn validate_fail_fast_reports_single_error() {
    let output = epasync()
        .args(["validate", "--fail-fast", "--format", "json", "--spec"])
        .arg(fixtures().join("missing-domain.yaml"))
        .assert()
        .failure()
        .code(1)
        .get_output()
        .clone();

    let v = stdout_json(&output);
    let errors = v["results"][0]["errors"]
        .as_array()
        .expect("errors should be an array");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["code"], "BP002");
}

#[test]
fn validate_json_format_outputs_valid_json() {
    let output = epasync()
        .args(["validate", "--spec"])
        .arg(fixtures().join("avro-and-json.yaml"))
        .args(["--format", "json"])
        .assert()
        .success()
        .get_output()
        .clone();

    let v = stdout_json(&output);
    assert!(v.get("results").is_some(), "JSON output missing 'results' key");
    assert_eq!(v["summary"]["total"], 1);
    assert_eq!(v["summary"]["valid"], 1);
}

#[test]
fn validate_json_format_invalid_spec_exits_one_with_json() {
    let output = epasync()
        .args(["validate", "--spec"])
        .arg(fixtures().join("invalid-parse-error.yaml"))
        .args(["--format", "json"])
        .assert()
        .failure()
        .code(1)
        .get_output()
        .clone();

    let v = stdout_json(&output);
    let results = v["results"].as_array().expect("results should be an array");
    assert!(!results.is_empty());
    assert_eq!(results[0]["valid"], false);
    assert_eq!(results[0]["errors"][0]["code"], "E2001");
}

#[test]
fn validate_requires_spec_flag() {
    epasync().args(["validate"]).assert().failure().code(2);
}

#[test]
fn unknown_log_format_exits_two() {
    epasync()
        .args(["--log-format", "xml", "validate", "--spec"])
        .arg(fixtures().join("avro-and-json.yaml"))
        .assert()
        .failure()
        .code(2)
        .stderr(contains("unknown log format 'xml'"));
}

#[test]
fn debug_logging_goes_to_stderr() {
    let output = epasync()
        .args(["--log-level", "debug", "validate", "--format", "json", "--spec"])
        .arg(fixtures().join("avro-and-json.yaml"))
        .assert()
        .success()
        .stderr(contains("document_built"))
        .stderr(contains("validation_completed"))
        .get_output()
        .clone();

    // stdout stays parseable JSON
    stdout_json(&output);
}

// ---------------------------------------------------------------------------
// epasync inspect
// ---------------------------------------------------------------------------

#[test]
fn inspect_prints_message_map() {
    let output = epasync()
        .args(["inspect", "--spec"])
        .arg(fixtures().join("avro-and-json.yaml"))
        .assert()
        .success()
        .get_output()
        .clone();

    let v = stdout_json(&output);
    assert_eq!(v["title"], "Discovery Events");
    let messages = v["messages"].as_array().expect("messages should be an array");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["key"], "avro-event");
    assert_eq!(messages[0]["schema_format"], "APPLICATION_AVRO");
    assert_eq!(messages[1]["key"], "json-event");
    assert_eq!(messages[1]["schema_format"], "APPLICATION_JSON");
    assert_eq!(messages[1]["channels"][0], "discovery/json/{region}/created");
}

#[test]
fn inspect_asyncapi3_maps_operations() {
    let output = epasync()
        .args(["inspect", "--spec"])
        .arg(fixtures().join("asyncapi3.yaml"))
        .assert()
        .success()
        .get_output()
        .clone();

    let v = stdout_json(&output);
    assert_eq!(v["asyncapi"], "3.0.0");
    assert_eq!(v["messages"][0]["key"], "UserSignedUp");
    assert_eq!(v["messages"][0]["content_type"], "application/json");
    assert_eq!(v["messages"][0]["application_domain"], "Users");
}

#[test]
fn inspect_invalid_spec_exits_one() {
    epasync()
        .args(["inspect", "--spec"])
        .arg(fixtures().join("invalid-duplicate-message.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E2004"));
}
