//! Provider and cadence constants shared across the crate.

use std::time::Duration;

// OpenAQ v3 endpoint and credential header
pub const DEFAULT_API_BASE: &str = "https://api.openaq.org/v3";
pub const API_KEY_HEADER: &str = "x-api-key";

/// Search radius, in meters, applied to every location lookup.
pub const SEARCH_RADIUS_METERS: u32 = 25_000;
/// Only the single best match is ever requested.
pub const SEARCH_LIMIT: u32 = 1;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 300_000;
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(25_000);
pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.2;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 15;

/// Events buffered per stream consumer before senders wait.
pub const STREAM_BUFFER: usize = 16;

// Parameter name used when a sensor reports none
pub const UNKNOWN_PARAMETER: &str = "unknown";
