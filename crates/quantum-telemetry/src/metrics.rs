//! Prometheus metrics for the contract runtime.
//!
//! All metrics follow the naming convention: `qc_wasm_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., contract_calls_total)
//! - **Histogram**: Distribution of values (e.g., contract_call_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Contract entry point calls
    pub static ref CONTRACT_CALLS: CounterVec = CounterVec::new(
        Opts::new("qc_wasm_contract_calls_total", "Contract entry point calls"),
        &["operation", "outcome"]  // outcome: ok/error
    ).expect("metric creation failed");

    /// Contract entry point duration
    pub static ref CONTRACT_CALL_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "qc_wasm_contract_call_duration_seconds",
            "Time spent in contract entry points"
        ).buckets(exponential_buckets(0.0001, 2.0, 15).unwrap()),
        &["operation"]
    ).expect("metric creation failed");

    /// Smart queries refused for nesting too deep
    pub static ref QUERY_DEPTH_REJECTIONS: Counter = Counter::new(
        "qc_wasm_query_depth_rejections_total",
        "Smart queries rejected by the query stack limit"
    ).expect("metric creation failed");
}

/// Handle for the registered metrics
#[derive(Debug, Clone)]
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry. Safe to call twice.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(CONTRACT_CALLS.clone()),
        Box::new(CONTRACT_CALL_DURATION.clone()),
        Box::new(QUERY_DEPTH_REJECTIONS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Record a contract entry point call.
pub fn observe_contract_call(operation: &str, ok: bool, seconds: f64) {
    let outcome = if ok { "ok" } else { "error" };
    CONTRACT_CALLS.with_label_values(&[operation, outcome]).inc();
    CONTRACT_CALL_DURATION
        .with_label_values(&[operation])
        .observe(seconds);
}

/// Record a smart query refused by the nesting limit.
pub fn observe_query_depth_rejection() {
    QUERY_DEPTH_REJECTIONS.inc();
}
