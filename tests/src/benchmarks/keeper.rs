//! # Keeper Benchmarks
//!
//! - Execute: setup charge, VM call, response handling
//! - Smart query: nested query context and read-only call
//! - Event costs: the cost model on wide events
//! - Submessages: scope branching per submessage

use crate::fixtures::{execute_msg, reflect_msg, Harness, COUNTER_WASM, FLAKY_WASM, REFLECT_WASM};
use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use qc_wasm::domain::messages::{Attribute, Event, SubMsg};
use std::sync::Arc;
use std::time::Duration;

/// Counter increments on a long-lived harness.
pub fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("keeper-execute");
    group.measurement_time(Duration::from_secs(5));

    let mut harness = Harness::new();
    let counter = harness.deploy(COUNTER_WASM, 0);

    group.bench_function("counter_increment", |b| {
        b.iter(|| {
            harness.reset(1_000_000);
            black_box(harness.execute(&counter, b"{}").unwrap())
        });
    });
    group.finish();
}

/// Top-level smart queries.
pub fn bench_smart_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("keeper-query");

    let mut harness = Harness::new();
    let counter = harness.deploy(COUNTER_WASM, 0);
    let keeper = Arc::clone(&harness.keeper);

    group.bench_function("counter_smart_query", |b| {
        b.iter(|| {
            harness.reset(1_000_000);
            black_box(keeper.query_smart(&mut harness.ctx(), &counter, b"{}").unwrap())
        });
    });
    group.finish();
}

/// Cost model over events of growing width.
pub fn bench_event_costs(c: &mut Criterion) {
    let mut group = c.benchmark_group("gas-register");
    let harness = Harness::new();
    let register = harness.keeper.gas_register();

    for width in [1usize, 16, 256] {
        let attributes: Vec<Attribute> = (0..width)
            .map(|i| Attribute::new(format!("key-{i}"), "v".repeat(64)))
            .collect();
        let event = Event {
            ty: "bench".into(),
            attributes: attributes.clone(),
        };
        let events = vec![event; 4];

        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::new("event_costs", width), &width, |b, _| {
            b.iter(|| black_box(register.event_costs(&attributes, &events).unwrap()));
        });
    }
    group.finish();
}

/// Dispatch of `n` successful submessages from one response.
pub fn bench_submessages(c: &mut Criterion) {
    let mut group = c.benchmark_group("keeper-dispatch");
    group.measurement_time(Duration::from_secs(5));

    let mut harness = Harness::new();
    let reflect = harness.deploy(REFLECT_WASM, 0);
    let flaky = harness.deploy(FLAKY_WASM, 0);

    for count in [1usize, 8, 32] {
        let msgs: Vec<SubMsg> = (0..count)
            .map(|_| SubMsg::new(execute_msg(&flaky, b"write")))
            .collect();
        let msg = reflect_msg(&msgs);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("reflect", count), &msg, |b, msg| {
            b.iter(|| {
                harness.reset(50_000_000);
                black_box(harness.execute(&reflect, msg).unwrap())
            });
        });
    }
    group.finish();
}

/// Registers every keeper benchmark.
pub fn register_benchmarks(c: &mut Criterion) {
    bench_execute(c);
    bench_smart_query(c);
    bench_event_costs(c);
    bench_submessages(c);
}
