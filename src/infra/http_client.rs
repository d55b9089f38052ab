use crate::app::ports::{LocationSearch, UpstreamPort};
use crate::config::Config;
use crate::constants::API_KEY_HEADER;
use crate::error::{FeedError, Result};
use crate::metrics::FeedMetrics;
use crate::types::{LatestRecord, LocationRecord, ResultsEnvelope};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Longest slice of an error body carried into `UpstreamFailure`.
const ERROR_BODY_EXCERPT: usize = 200;

/// OpenAQ v3 over reqwest. One client is shared by every pipeline.
#[derive(Debug, Clone)]
pub struct OpenAqHttp {
    client: reqwest::Client,
    base: String,
    api_key: Option<String>,
}

impl OpenAqHttp {
    pub fn new(base: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("aq_feed/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_base, config.api_key.clone(), config.request_timeout())
    }

    async fn get_results<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let url = format!("{}{}", self.base, path);
        tracing::debug!("HTTP GET request to: {} {:?}", url, query);
        FeedMetrics::record_upstream_request(endpoint);

        let mut request = self.client.get(&url).query(query);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let resp = request.send().await.map_err(|e| {
            FeedMetrics::record_upstream_error(endpoint);
            FeedError::Http(e)
        })?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        tracing::debug!("HTTP response: status={}, size={} bytes", status.as_u16(), bytes.len());

        if !status.is_success() {
            FeedMetrics::record_upstream_error(endpoint);
            let body = String::from_utf8_lossy(&bytes);
            let excerpt: String = body.chars().take(ERROR_BODY_EXCERPT).collect();
            return Err(FeedError::UpstreamFailure {
                status: Some(status.as_u16()),
                message: format!("{} returned status {}: {}", path, status.as_u16(), excerpt.trim()),
            });
        }

        let envelope: ResultsEnvelope<T> = serde_json::from_slice(&bytes)?;
        Ok(envelope.results)
    }
}

#[async_trait]
impl UpstreamPort for OpenAqHttp {
    async fn search_locations(&self, search: &LocationSearch) -> Result<Vec<LocationRecord>> {
        self.get_results("locations", "/locations", &search.params).await
    }

    async fn location(&self, location_id: i64) -> Result<Vec<LocationRecord>> {
        self.get_results("location", &format!("/locations/{}", location_id), &[])
            .await
    }

    async fn latest(&self, location_id: i64) -> Result<Vec<LatestRecord>> {
        self.get_results("latest", &format!("/locations/{}/latest", location_id), &[])
            .await
    }
}
