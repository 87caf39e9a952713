//! Process-scoped counters published through the `metrics` facade, recorded the way the teacher
//! instruments its helper transport: byte counters per direction plus timing histograms, with
//! `tracing` spans carrying the structured context around them.

use std::time::Duration;

use metrics::{counter, histogram};

/// Total bytes sent across every sub-protocol endpoint in this process.
pub const TOTAL_SEND_BYTES: &str = "lagrange_mpc.total_send_bytes";
/// Total bytes received across every sub-protocol endpoint in this process.
pub const TOTAL_RECV_BYTES: &str = "lagrange_mpc.total_recv_bytes";
/// Wall-clock duration of a full orchestrator run.
pub const TOTAL_RUN_TIME: &str = "lagrange_mpc.total_run_time_seconds";
/// Longest single committee's compute time within a run.
pub const MAX_COMPUTE_TIME: &str = "lagrange_mpc.max_compute_time_seconds";

#[cfg(not(feature = "disable-metrics"))]
pub fn record_send_bytes(bytes: u64) {
    counter!(TOTAL_SEND_BYTES).increment(bytes);
}
#[cfg(feature = "disable-metrics")]
pub fn record_send_bytes(_bytes: u64) {}

#[cfg(not(feature = "disable-metrics"))]
pub fn record_recv_bytes(bytes: u64) {
    counter!(TOTAL_RECV_BYTES).increment(bytes);
}
#[cfg(feature = "disable-metrics")]
pub fn record_recv_bytes(_bytes: u64) {}

#[cfg(not(feature = "disable-metrics"))]
pub fn record_run_time(duration: Duration) {
    histogram!(TOTAL_RUN_TIME).record(duration.as_secs_f64());
}
#[cfg(feature = "disable-metrics")]
pub fn record_run_time(_duration: Duration) {}

#[cfg(not(feature = "disable-metrics"))]
pub fn record_max_compute_time(duration: Duration) {
    histogram!(MAX_COMPUTE_TIME).record(duration.as_secs_f64());
}
#[cfg(feature = "disable-metrics")]
pub fn record_max_compute_time(_duration: Duration) {}

/// Installs a `tracing-subscriber` `EnvFilter`-driven formatter as the global default, honoring
/// `RUST_LOG`. Safe to call more than once; subsequent calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
