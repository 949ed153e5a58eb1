//! Criterion benchmarks for session parsing and aggregation

use chrono::{Duration, TimeZone, Utc};
use codex_wrapped::parsers::{CodexParser, SessionLogParser};
use codex_wrapped::services::aggregator::Aggregator;
use codex_wrapped::types::{TokenDelta, UsageEvent};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::path::PathBuf;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("codex")
}

/// One synthetic session: a context record followed by `turns` cumulative snapshots
fn synthetic_session(turns: u64) -> Vec<String> {
    let context = r#"{"type":"turn_context","payload":{"model":"gpt-5-codex"}}"#;
    let mut lines = vec![context.to_string()];
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
    for i in 1..=turns {
        let ts = start + Duration::minutes(i as i64);
        lines.push(format!(
            r#"{{"timestamp":"{}","type":"event_msg","payload":{{"type":"token_count","info":{{"total_token_usage":{{"input_tokens":{},"cached_input_tokens":{},"output_tokens":{},"total_tokens":{}}}}}}}}}"#,
            ts.to_rfc3339(),
            i * 1000,
            i * 400,
            i * 200,
            i * 1200
        ));
    }
    lines
}

fn synthetic_events(count: usize) -> Vec<UsageEvent> {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
    let models = ["gpt-5", "gpt-5-codex", "o3", "o4-mini", "gpt-4.1"];
    (0..count)
        .map(|i| {
            let mut event = UsageEvent::new(
                format!("session-{}", i % 50),
                start + Duration::hours((i * 7) as i64),
                models[i % models.len()],
                i % 11 == 0,
                TokenDelta {
                    input_tokens: 1000,
                    cached_input_tokens: 300,
                    output_tokens: 200,
                    reasoning_output_tokens: 50,
                    total_tokens: 1200,
                },
            );
            event.cost_usd = if i % 13 == 0 { None } else { Some(0.002) };
            event
        })
        .collect()
}

fn bench_parse_lines(c: &mut Criterion) {
    let parser = CodexParser::with_data_dir(fixtures_dir());
    let lines = synthetic_session(1000);
    let bytes: u64 = lines.iter().map(|l| l.len() as u64 + 1).sum();

    let mut group = c.benchmark_group("parser");
    group.throughput(Throughput::Bytes(bytes));
    group.bench_function("parse_lines (1000 cumulative turns)", |b| {
        b.iter(|| parser.parse_lines("bench", black_box(&lines)));
    });
    group.finish();
}

fn bench_parse_fixtures(c: &mut Criterion) {
    let parser = CodexParser::with_data_dir(fixtures_dir());

    let mut group = c.benchmark_group("parser");
    group.bench_function("parse_all (fixtures)", |b| {
        b.iter(|| black_box(parser.parse_all()));
    });
    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregator");
    for count in [1_000usize, 10_000] {
        let events = synthetic_events(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("fold", count), &events, |b, events| {
            b.iter(|| Aggregator::fold(black_box(events)));
        });

        let dates = Aggregator::fold(&events).active_dates();
        let today = *dates.last().unwrap();
        group.bench_with_input(BenchmarkId::new("streaks", count), &dates, |b, dates| {
            b.iter(|| Aggregator::calculate_streaks(black_box(dates), today));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_parse_lines,
    bench_parse_fixtures,
    bench_aggregate
);
criterion_main!(benches);
