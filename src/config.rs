use crate::constants::{
    DEFAULT_API_BASE, DEFAULT_POLL_INTERVAL_MS, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT_SECONDS,
    DEFAULT_SMOOTHING_FACTOR,
};
use crate::domain::LocationQuery;
use crate::error::{FeedError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base: String,
    pub api_key: Option<String>,
    pub location: LocationConfig,
    pub poll_interval_ms: u64,
    pub smoothing_factor: f64,
    pub port: u16,
    pub request_timeout_seconds: u64,
}

/// Default location used when a request names none.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub city: Option<String>,
    pub country: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            location: LocationConfig::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            port: DEFAULT_PORT,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
        }
    }
}

impl Config {
    /// Defaults overlaid with the process environment (and `.env`, if present).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Config::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// A TOML file overlaid with the process environment.
    pub fn load_file(path: &Path) -> Result<Self> {
        dotenv::dotenv().ok();
        let content = fs::read_to_string(path).map_err(|e| {
            FeedError::InvalidConfig(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies every recognized variable `lookup` returns a value for.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("OPENAQ_API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = get("OPENAQ_API_BASE") {
            self.api_base = v;
        }
        if let Some(v) = get("LOCATION_CITY") {
            self.location.city = Some(v);
        }
        if let Some(v) = get("LOCATION_COUNTRY") {
            self.location.country = Some(v);
        }
        if let Some(v) = get("LOCATION_LAT") {
            self.location.lat = Some(parse_var("LOCATION_LAT", &v)?);
        }
        if let Some(v) = get("LOCATION_LON") {
            self.location.lon = Some(parse_var("LOCATION_LON", &v)?);
        }
        if let Some(v) = get("POLL_INTERVAL") {
            self.poll_interval_ms = parse_var("POLL_INTERVAL", &v)?;
        }
        if let Some(v) = get("SMOOTHING_FACTOR") {
            self.smoothing_factor = parse_var("SMOOTHING_FACTOR", &v)?;
        }
        if let Some(v) = get("AQ_FEED_PORT") {
            self.port = parse_var("AQ_FEED_PORT", &v)?;
        }
        if let Some(v) = get("REQUEST_TIMEOUT_SECONDS") {
            self.request_timeout_seconds = parse_var("REQUEST_TIMEOUT_SECONDS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(FeedError::InvalidConfig("poll interval must be positive".to_string()));
        }
        if !(self.smoothing_factor > 0.0 && self.smoothing_factor <= 1.0) {
            return Err(FeedError::InvalidConfig(format!(
                "smoothing factor must be in (0, 1], got {}",
                self.smoothing_factor
            )));
        }
        Ok(())
    }

    /// City and country win over coordinates here, matching how the
    /// location env vars have always been read.
    pub fn default_query(&self) -> Result<LocationQuery> {
        let loc = &self.location;
        match (&loc.city, &loc.country) {
            (Some(city), Some(country)) => LocationQuery::from_parts(Some(city.as_str()), Some(country.as_str()), None, None),
            _ => LocationQuery::from_parts(None, None, loc.lat, loc.lon),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| FeedError::InvalidConfig(format!("{} has an invalid value: '{}'", key, value)))
}
