//! # Contract Runtime Benchmarks
//!
//! Criterion benchmarks of the hot keeper paths, registered from
//! `benches/wasm_benchmarks.rs`.

pub mod keeper;
