use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use std::sync::LazyLock;

pub static GATE_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "x402_gate_requests_total",
        "Requests to the protected resource by response status",
        &["status"]
    )
    .expect("valid metric definition")
});

pub static VERIFICATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "x402_verifications_total",
        "Payment verifications by scheme and verdict",
        &["scheme", "result"]
    )
    .expect("valid metric definition")
});

pub static SETTLEMENTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "x402_settlements_total",
        "Settlements by scheme and result",
        &["scheme", "result"]
    )
    .expect("valid metric definition")
});

pub static SETTLE_LATENCY: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "x402_settle_duration_seconds",
        "Settlement latency in seconds",
        &["scheme"],
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("valid metric definition")
});

pub static BACKGROUND_SETTLEMENT_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "x402_background_settlement_failures_total",
        "Settlements that failed after access was already granted",
        &["scheme"]
    )
    .expect("valid metric definition")
});

pub static API_KEY_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "x402_api_key_failures_total",
        "Rejected credentials on the delegated verify/settle endpoints",
        &["reason"]
    )
    .expect("valid metric definition")
});

/// Bounded label for a scheme tag. Client-chosen strings never become labels.
pub fn scheme_label(tag: Option<&str>) -> &'static str {
    match x402::SchemeKind::resolve(tag) {
        Some(scheme) => scheme.as_str(),
        None => "unsupported",
    }
}

pub fn metrics_output() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
