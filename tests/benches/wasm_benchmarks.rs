//! # Contract Runtime Benchmarks
//!
//! | Group | Measures |
//! |-------|----------|
//! | `keeper-execute` | one counter increment end to end |
//! | `keeper-query` | one top-level smart query |
//! | `gas-register` | event cost model by event width |
//! | `keeper-dispatch` | submessage fan-out |

use criterion::{criterion_group, criterion_main, Criterion};

fn keeper_benchmarks(c: &mut Criterion) {
    qc_tests::benchmarks::keeper::register_benchmarks(c);
}

criterion_group!(benches, keeper_benchmarks);
criterion_main!(benches);
