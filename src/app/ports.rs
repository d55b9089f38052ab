use crate::error::Result;
use crate::types::{LatestRecord, LocationRecord};
use async_trait::async_trait;

/// Query-string pairs for a `/locations` search.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationSearch {
    pub params: Vec<(&'static str, String)>,
}

/// The air-quality provider, as seen by the resolver and the pipeline.
///
/// Implementations return the decoded `results` array; an empty vector is a
/// valid answer and is interpreted by the caller.
#[async_trait]
pub trait UpstreamPort: Send + Sync {
    async fn search_locations(&self, search: &LocationSearch) -> Result<Vec<LocationRecord>>;
    async fn location(&self, location_id: i64) -> Result<Vec<LocationRecord>>;
    async fn latest(&self, location_id: i64) -> Result<Vec<LatestRecord>>;
}
