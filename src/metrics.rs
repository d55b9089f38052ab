//! Prometheus metrics for the feed.
//!
//! The recorder is installed once per process and rendered in-process by the
//! `/metrics` route. Without a recorder the macros are no-ops, which keeps
//! tests free of global state.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::{Once, OnceLock};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Naming convention: aq_feed_{area}_{name}[_total]
macro_rules! feed_metric {
    (counter, $area:literal, $name:literal) => {
        concat!("aq_feed_", $area, "_", $name, "_total")
    };
    (gauge, $area:literal, $name:literal) => {
        concat!("aq_feed_", $area, "_", $name)
    };
}

/// Idempotent.
pub fn init_metrics() {
    INIT.call_once(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HANDLE.set(handle);
            FeedMetrics::describe();
            info!("Prometheus recorder installed");
        }
        Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
    });
}

/// Prometheus text exposition, if the recorder is installed.
pub fn render() -> Option<String> {
    HANDLE.get().map(|handle| handle.render())
}

pub struct FeedMetrics;

impl FeedMetrics {
    pub fn record_upstream_request(endpoint: &'static str) {
        ::metrics::counter!(feed_metric!(counter, "upstream", "requests"), "endpoint" => endpoint)
            .increment(1);
    }

    pub fn record_upstream_error(endpoint: &'static str) {
        ::metrics::counter!(feed_metric!(counter, "upstream", "errors"), "endpoint" => endpoint)
            .increment(1);
    }

    pub fn record_resolution() {
        ::metrics::counter!(feed_metric!(counter, "pipeline", "resolutions")).increment(1);
    }

    pub fn record_snapshot() {
        ::metrics::counter!(feed_metric!(counter, "pipeline", "snapshots")).increment(1);
    }

    pub fn record_fetch_error(kind: &'static str) {
        ::metrics::counter!(feed_metric!(counter, "pipeline", "fetch_errors"), "kind" => kind)
            .increment(1);
    }

    pub fn record_stream_event(kind: &'static str) {
        ::metrics::counter!(feed_metric!(counter, "stream", "events"), "kind" => kind).increment(1);
    }

    pub fn stream_opened() {
        ::metrics::gauge!(feed_metric!(gauge, "stream", "active")).increment(1.0);
    }

    pub fn stream_closed() {
        ::metrics::gauge!(feed_metric!(gauge, "stream", "active")).decrement(1.0);
    }

    fn describe() {
        use ::metrics::{describe_counter, describe_gauge};

        describe_counter!(
            feed_metric!(counter, "upstream", "requests"),
            "Requests sent to the air-quality provider"
        );
        describe_counter!(
            feed_metric!(counter, "upstream", "errors"),
            "Provider requests that failed or returned a non-success status"
        );
        describe_counter!(
            feed_metric!(counter, "pipeline", "resolutions"),
            "Location lookups performed (one per pipeline instance)"
        );
        describe_counter!(
            feed_metric!(counter, "pipeline", "snapshots"),
            "Normalized snapshots produced"
        );
        describe_counter!(
            feed_metric!(counter, "pipeline", "fetch_errors"),
            "Snapshot fetches that failed, by error kind"
        );
        describe_counter!(
            feed_metric!(counter, "stream", "events"),
            "Events pushed to stream consumers, by kind"
        );
        describe_gauge!(
            feed_metric!(gauge, "stream", "active"),
            "Currently connected stream consumers"
        );
    }
}
