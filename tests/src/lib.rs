//! # Quantum-Chain WASM Test Suite
//!
//! Unified test crate for the contract runtime.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Mock contracts and the keeper harness
//! ├── benchmarks/       # Criterion benchmarks
//! │   └── keeper.rs
//! └── integration/      # Whole-runtime scenarios
//!     ├── flows.rs
//!     ├── recursion.rs
//!     ├── gas.rs
//!     └── concurrency.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p qc-tests
//!
//! # By category
//! cargo test -p qc-tests integration::flows::
//! cargo test -p qc-tests integration::gas::
//!
//! # Benchmarks
//! cargo bench -p qc-tests
//! ```

pub mod benchmarks;
pub mod fixtures;
pub mod integration;
