//! # Runtime Metrics
//!
//! Contract call counters and timings, recorded through `quantum-telemetry`.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! qc-wasm = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `qc_wasm_contract_calls_total` - entry point calls by operation and outcome
//! - `qc_wasm_contract_call_duration_seconds` - entry point time by operation
//! - `qc_wasm_query_depth_rejections_total` - smart queries refused for nesting too deep

use std::time::Duration;

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record one entry point call.
#[cfg(feature = "metrics")]
pub fn record_contract_call(operation: &str, ok: bool, elapsed: Duration) {
    quantum_telemetry::observe_contract_call(operation, ok, elapsed.as_secs_f64());
}

/// Record a smart query refused by the nesting limit.
#[cfg(feature = "metrics")]
pub fn record_query_depth_rejection() {
    quantum_telemetry::observe_query_depth_rejection();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_contract_call(_operation: &str, _ok: bool, _elapsed: Duration) {}

#[cfg(not(feature = "metrics"))]
pub fn record_query_depth_rejection() {}
