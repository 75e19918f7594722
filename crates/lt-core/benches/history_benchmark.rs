//! History Index Benchmarks
//!
//! Measures the cost of:
//! - Building an index from a backend listing
//! - Reconciling a listing into an index holding local entries
//! - Client state reads and writes against SQLite

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use lt_core::history::{HistoryIndex, SessionSummary};
use lt_core::storage::{ClientStore, SqliteStore};

fn listing(count: usize) -> Vec<SessionSummary> {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
    (0..count)
        .map(|i| SessionSummary {
            session_id: format!("session-{}", i),
            first_message: format!("message {}", i),
            created_at: start + Duration::hours(i as i64 * 5),
            confirmed: false,
        })
        .collect()
}

/// Benchmark building and reconciling the index
fn bench_history_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("history_index");

    for size in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("from_server", size), &size, |b, &size| {
            let sessions = listing(size);
            b.iter(|| black_box(HistoryIndex::from_server(sessions.clone())))
        });

        group.bench_with_input(BenchmarkId::new("reconcile", size), &size, |b, &size| {
            let sessions = listing(size);
            b.iter_with_setup(
                || {
                    let mut index = HistoryIndex::from_server(sessions[..size / 2].to_vec());
                    index.record_local(SessionSummary::local(
                        "local-only",
                        "not listed yet",
                        Utc::now(),
                    ));
                    index
                },
                |mut index| black_box(index.reconcile(sessions.clone())),
            )
        });
    }

    group.finish();
}

/// Benchmark client state persistence
fn bench_client_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("client_store");

    group.bench_function("set_session_id", |b| {
        let store = SqliteStore::in_memory().unwrap();
        b.iter(|| store.set("session_id", black_box("abc123")).unwrap())
    });

    group.bench_function("get_session_id", |b| {
        let store = SqliteStore::in_memory().unwrap();
        store.set("session_id", "abc123").unwrap();
        b.iter(|| black_box(store.get("session_id").unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_history_index, bench_client_store);
criterion_main!(benches);
