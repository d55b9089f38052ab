use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Invalid location query: {0}")]
    InvalidQuery(String),

    #[error("No location found for specified parameters")]
    LocationNotFound,

    #[error("No latest data found for location {location_id}")]
    NoDataAvailable { location_id: i64 },

    #[error("Upstream request failed: {message}")]
    UpstreamFailure { status: Option<u16>, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    InvalidConfig(String),
}

impl FeedError {
    /// Whether a caller may reasonably retry the same request later.
    ///
    /// Malformed input and configuration never heal on their own; everything
    /// that came back from (or failed to reach) the provider might.
    pub fn is_retryable(&self) -> bool {
        match self {
            FeedError::InvalidQuery(_)
            | FeedError::InvalidConfig(_)
            | FeedError::Toml(_)
            | FeedError::Io(_) => false,
            FeedError::LocationNotFound
            | FeedError::NoDataAvailable { .. }
            | FeedError::UpstreamFailure { .. }
            | FeedError::Http(_)
            | FeedError::Json(_) => true,
        }
    }

    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FeedError::InvalidQuery(_) => "invalid_query",
            FeedError::LocationNotFound => "location_not_found",
            FeedError::NoDataAvailable { .. } => "no_data",
            FeedError::UpstreamFailure { .. } => "upstream",
            FeedError::Http(_) => "http",
            FeedError::Json(_) => "json",
            FeedError::Toml(_) => "toml",
            FeedError::Io(_) => "io",
            FeedError::InvalidConfig(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;
