//! Prometheus instrumentation.
//!
//! The recorder is installed once by the binary; until then every helper
//! below is a no-op, so the library and its tests can call them freely.
//! Series exported:
//! - HTTP traffic per matched route
//! - cache outcome per tier (hit, miss, corrupt) and hot tier size
//! - origin call outcome and end-to-end retrieval latency by source

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

static RECORDER: OnceLock<PrometheusHandle> = OnceLock::new();

pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_CORRUPT_ENTRIES_TOTAL: &str = "cache_corrupt_entries_total";
    pub const CACHE_ENTRIES: &str = "cache_entries";

    pub const ORIGIN_REQUESTS_TOTAL: &str = "origin_requests_total";
    pub const RETRIEVAL_DURATION_SECONDS: &str = "retrieval_duration_seconds";
}

/// Install the global Prometheus recorder.
///
/// `false` means nothing was installed, either because a recorder is
/// already present or because installation failed (logged).
pub fn init_metrics() -> bool {
    if RECORDER.get().is_some() {
        return false;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let installed = RECORDER.set(handle).is_ok();
            if installed {
                tracing::info!("Prometheus recorder installed, scrape GET /metrics");
            }
            installed
        }
        Err(e) => {
            tracing::error!(error = %e, "Prometheus recorder could not be installed");
            false
        }
    }
}

/// Text exposition of every series, or `None` before [`init_metrics`].
pub fn render_metrics() -> Option<String> {
    RECORDER.get().map(PrometheusHandle::render)
}

fn status_class(status: u16) -> &'static str {
    match status / 100 {
        2 => "2xx",
        3 => "3xx",
        4 => "4xx",
        5 => "5xx",
        _ => "other",
    }
}

/// One served request; `path` is the route template.
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let method = method.to_string();
    let path = path.to_string();

    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status.to_string(),
        "status_class" => status_class(status)
    )
    .increment(1);
    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method,
        "path" => path
    )
    .record(duration.as_secs_f64());
}

pub fn record_cache_hit(tier: &'static str) {
    counter!(names::CACHE_HITS_TOTAL, "tier" => tier).increment(1);
}

/// Neither tier had a usable entry.
pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

/// An entry was present but did not decode.
pub fn record_corrupt_entry(tier: &'static str) {
    counter!(names::CACHE_CORRUPT_ENTRIES_TOTAL, "tier" => tier).increment(1);
}

pub fn set_cache_entries(tier: &'static str, count: usize) {
    gauge!(names::CACHE_ENTRIES, "tier" => tier).set(count as f64);
}

/// `outcome` is `"ok"` or the failing `OriginError` kind.
pub fn record_origin_request(outcome: &'static str) {
    counter!(names::ORIGIN_REQUESTS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_retrieval(source: &'static str, duration: Duration) {
    histogram!(names::RETRIEVAL_DURATION_SECONDS, "source" => source)
        .record(duration.as_secs_f64());
}
