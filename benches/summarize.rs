//! Benchmarks for the diff summarizer and the rule oracle.

mod common;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use common::{generate_files, generate_unified_diff};
use skip_review::config::DEFAULT_MAX_DIFF_SIZE;
use skip_review::diff::{parse_unified_diff, summarize};
use skip_review::oracle::RuleOracle;

/// Summarize PRs of growing size under the default limit.
///
/// Larger inputs hit the truncation path.
fn bench_summarize(c: &mut Criterion) {
    let mut group = c.benchmark_group("summarize/files");

    for file_count in [10, 100, 500] {
        let files = generate_files(file_count, 60);
        group.throughput(Throughput::Elements(file_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(file_count),
            &files,
            |b, files| {
                b.iter(|| black_box(summarize(black_box(files), DEFAULT_MAX_DIFF_SIZE)));
            },
        );
    }

    group.finish();
}

fn bench_parse_unified_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("summarize/parse_unified_diff");

    for file_count in [10, 100] {
        let diff = generate_unified_diff(&generate_files(file_count, 200));
        group.throughput(Throughput::Bytes(diff.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(file_count), &diff, |b, diff| {
            b.iter(|| black_box(parse_unified_diff(black_box(diff))));
        });
    }

    group.finish();
}

fn bench_rule_oracle(c: &mut Criterion) {
    let mut group = c.benchmark_group("summarize/rule_oracle");
    let oracle = RuleOracle::new();

    for file_count in [10, 100] {
        let files = generate_files(file_count, 60);
        group.bench_with_input(
            BenchmarkId::from_parameter(file_count),
            &files,
            |b, files| {
                b.iter(|| black_box(oracle.evaluate(black_box(files))));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_summarize,
    bench_parse_unified_diff,
    bench_rule_oracle,
);
criterion_main!(benches);
