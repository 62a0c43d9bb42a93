//! epasync: build and check AsyncAPI documents.

use std::path::Path;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use epasync_lib::{inspect_file, validate_file, ValidationResult};
use epasync_rules::{RulesConfig, ValidationEngine, ValidationMode};
use epasync_telemetry::log_rules_loaded;

#[derive(Parser, Debug)]
#[command(name = "epasync", about = "AsyncAPI document builder and best-practice checker", version)]
struct Cli {
    /// Log level filter (RUST_LOG overrides).
    #[arg(long, global = true, default_value = "warn", env = "EPASYNC_LOG_LEVEL")]
    log_level: String,

    /// Log format (json or pretty).
    #[arg(long, global = true, default_value = "json", env = "EPASYNC_LOG_FORMAT")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build AsyncAPI spec(s) and check them against best practices.
    ///
    /// Build failures are E2000-E2005; rule violations are BP001-BP010.
    Validate {
        /// Input spec file(s) (YAML or JSON).
        #[arg(short, long, required = true, num_args = 1..)]
        spec: Vec<String>,

        /// Output format (text or json).
        #[arg(long, default_value = "text")]
        format: String,

        /// Rules configuration file (YAML).
        #[arg(long)]
        rules: Option<String>,

        /// Stop each spec at its first error-level violation.
        #[arg(long)]
        fail_fast: bool,

        /// Treat warnings as failures.
        #[arg(long)]
        strict: bool,
    },

    /// Print the message map of a spec as JSON.
    Inspect {
        /// Input spec file (YAML or JSON).
        #[arg(short, long)]
        spec: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let telemetry = match epasync_telemetry::config_from_args(&cli.log_level, &cli.log_format) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };
    if let Err(e) = epasync_telemetry::init(&telemetry) {
        eprintln!("warning: {}", e);
    }

    match cli.command {
        Commands::Validate {
            spec,
            format,
            rules,
            fail_fast,
            strict,
        } => run_validate(&spec, &format, rules.as_deref(), fail_fast, strict),
        Commands::Inspect { spec } => run_inspect(&spec),
    }
}

/// Build the rules engine from an optional config file and CLI flags.
fn load_engine(rules: Option<&str>, fail_fast: bool) -> Result<ValidationEngine, String> {
    let mut config = match rules {
        Some(path) => RulesConfig::load(Path::new(path)).map_err(|e| e.to_string())?,
        None => RulesConfig::default(),
    };
    if fail_fast {
        config = config.with_mode(ValidationMode::FailFast);
    }
    log_rules_loaded!(
        source = rules.unwrap_or("<default>"),
        disabled = config.disabled.len(),
        fail_fast = config.mode == ValidationMode::FailFast,
        "rules configuration loaded"
    );
    ValidationEngine::new(config).map_err(|e| e.to_string())
}

/// Run the validate command.
fn run_validate(
    specs: &[String],
    output_format: &str,
    rules: Option<&str>,
    fail_fast: bool,
    strict: bool,
) -> ExitCode {
    let engine = match load_engine(rules, fail_fast) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(1);
        }
    };

    let results: Vec<ValidationResult> = specs
        .iter()
        .map(|spec| validate_file(spec, &engine, strict))
        .collect();
    let has_errors = results.iter().any(|r| !r.valid);

    if output_format == "json" {
        let output = serde_json::json!({
            "results": results,
            "summary": {
                "total": results.len(),
                "valid": results.iter().filter(|r| r.valid).count(),
                "invalid": results.iter().filter(|r| !r.valid).count(),
            }
        });
        if let Err(code) = print_json(&output) {
            return code;
        }
    } else {
        print_text(&results, strict);
    }

    if has_errors {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

fn print_text(results: &[ValidationResult], strict: bool) {
    for result in results {
        if result.valid && result.warnings.is_empty() {
            eprintln!("✓ {} is valid", result.file);
        } else if result.valid {
            eprintln!(
                "✓ {} is valid (with {} warning(s))",
                result.file,
                result.warnings.len()
            );
        } else if result.errors.is_empty() && strict {
            eprintln!(
                "✗ {} has {} warning(s) (strict)",
                result.file,
                result.warnings.len()
            );
        } else {
            eprintln!("✗ {} has {} error(s)", result.file, result.errors.len());
        }

        for err in &result.errors {
            if let Some(loc) = &err.location {
                eprintln!("  {} [{}]: {}", err.code, loc, err.message);
            } else {
                eprintln!("  {}: {}", err.code, err.message);
            }
        }

        for warn in &result.warnings {
            if let Some(loc) = &warn.location {
                eprintln!("  {} [{}]: {} (warning)", warn.code, loc, warn.message);
            } else {
                eprintln!("  {}: {} (warning)", warn.code, warn.message);
            }
        }
    }

    let valid_count = results.iter().filter(|r| r.valid).count();
    let total = results.len();
    eprintln!();
    eprintln!(
        "validated {} spec(s): {} valid, {} invalid",
        total,
        valid_count,
        total - valid_count
    );
}

/// Run the inspect command.
fn run_inspect(spec: &str) -> ExitCode {
    match inspect_file(spec) {
        Ok(summary) => match print_json(&summary) {
            Ok(()) => ExitCode::SUCCESS,
            Err(code) => code,
        },
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(1)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ExitCode> {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            Ok(())
        }
        Err(e) => {
            eprintln!("error: failed to serialize output: {}", e);
            Err(ExitCode::from(1))
        }
    }
}
