//! Best-practice validation benchmarks.
//!
//! Run with: cargo bench -p epasync-rules

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use epasync_rules::{RulesConfig, ValidationEngine, ValidationMode};
use epasync_spec::{build_document, AsyncApiDocument};

/// Build a document with N channels, every tenth one breaking a few rules.
fn create_document(channel_count: usize) -> AsyncApiDocument {
    let mut yaml = String::from(
        r##"asyncapi: "2.6.0"
info:
  title: Benchmark Events
  version: "1.0.0"
  description: Generated for benchmarking
x-ep-application-domain-name: Benchmarks
defaultContentType: application/json
channels:
"##,
    );

    for i in 0..channel_count {
        let (segment, description) = if i % 10 == 0 {
            (format!("Bad_Segment{}", i), "")
        } else {
            (format!("segment{}", i), "description: generated event")
        };
        yaml.push_str(&format!(
            r##"  acme/{segment}/{{tenant}}/created:
    parameters:
      tenant:
        schema:
          type: string
    publish:
      operationId: publishEvent{i}
      message:
        name: Event{i}
        {description}
        payload:
          type: object
          properties:
            id:
              type: string
"##,
        ));
    }

    let tree: serde_json::Value = serde_yaml::from_str(&yaml).unwrap();
    build_document(&tree).unwrap()
}

fn bench_engine_creation(c: &mut Criterion) {
    c.bench_function("engine_creation", |b| {
        b.iter(|| black_box(ValidationEngine::new(RulesConfig::default()).unwrap()));
    });
}

fn bench_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("best_practices");
    let accumulate = ValidationEngine::default();
    let fail_fast =
        ValidationEngine::new(RulesConfig::default().with_mode(ValidationMode::FailFast)).unwrap();

    for channel_count in [10, 100, 500] {
        let document = create_document(channel_count);

        group.bench_with_input(
            BenchmarkId::new("accumulate", channel_count),
            &document,
            |b, document| {
                b.iter(|| black_box(accumulate.validate(black_box(document)).unwrap()));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("fail_fast", channel_count),
            &document,
            |b, document| {
                b.iter(|| black_box(fail_fast.validate(black_box(document)).unwrap()));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_engine_creation, bench_validation);
criterion_main!(benches);
