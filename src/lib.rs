pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod ranges;
pub mod server;
pub mod stream;
pub mod types;

// Layered boundaries: ports the core depends on, adapters that implement them
pub mod app;
pub mod infra;

pub use domain::{FeedPayload, LocationQuery, NormalizedSnapshot, SensorLocation, Waveform};
pub use error::{FeedError, Result};
pub use pipeline::AcquisitionPipeline;
pub use stream::{StreamDeliveryLoop, StreamEvent, StreamHandle, StreamState};
