use crate::types::ScoringMethod;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

pub const BATCHES_TOTAL: &str = "scoring_batches_total";
pub const LINES_TOTAL: &str = "scoring_lines_total";
pub const FLAGGED_LINES_TOTAL: &str = "scoring_flagged_lines_total";
pub const BATCH_DURATION_MS: &str = "scoring_batch_duration_ms";
pub const MODEL_RELOADS_TOTAL: &str = "model_reloads_total";

/// Installs the global Prometheus recorder; the handle renders `/metrics`.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe();
    Ok(handle)
}

fn describe() {
    describe_counter!(BATCHES_TOTAL, "Scoring calls, labelled by method");
    describe_counter!(LINES_TOTAL, "Line items scored");
    describe_counter!(FLAGGED_LINES_TOTAL, "Line items flagged for review");
    describe_histogram!(BATCH_DURATION_MS, Unit::Milliseconds, "Time spent scoring one batch");
    describe_counter!(MODEL_RELOADS_TOTAL, "Explicit model reloads, labelled by resulting method");
}

pub fn record_batch(method: ScoringMethod, lines: usize, flagged: usize, elapsed: Duration) {
    counter!(BATCHES_TOTAL, "method" => method.as_str()).increment(1);
    counter!(LINES_TOTAL).increment(lines as u64);
    counter!(FLAGGED_LINES_TOTAL).increment(flagged as u64);
    histogram!(BATCH_DURATION_MS).record(elapsed.as_secs_f64() * 1000.0);
}

pub fn record_reload(method: ScoringMethod) {
    counter!(MODEL_RELOADS_TOTAL, "method" => method.as_str()).increment(1);
}
