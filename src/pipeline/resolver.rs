use crate::app::ports::{LocationSearch, UpstreamPort};
use crate::constants::{SEARCH_LIMIT, SEARCH_RADIUS_METERS};
use crate::domain::{LocationQuery, ResolvedLocation};
use crate::error::{FeedError, Result};
use crate::metrics::FeedMetrics;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

impl LocationSearch {
    pub fn for_query(query: &LocationQuery) -> Self {
        let mut params = match query {
            LocationQuery::City { city, country } => vec![
                ("city", city.clone()),
                ("country", country.clone()),
            ],
            LocationQuery::Coordinates { latitude, longitude } => {
                vec![("coordinates", format!("{},{}", latitude, longitude))]
            }
        };
        params.push(("radius", SEARCH_RADIUS_METERS.to_string()));
        params.push(("limit", SEARCH_LIMIT.to_string()));
        Self { params }
    }
}

/// Resolves a query to a provider location once, then serves the cached answer.
#[derive(Debug)]
pub struct LocationResolver {
    query: LocationQuery,
    resolved: Option<ResolvedLocation>,
}

impl LocationResolver {
    pub fn new(query: LocationQuery) -> Self {
        Self {
            query,
            resolved: None,
        }
    }

    pub fn query(&self) -> &LocationQuery {
        &self.query
    }

    pub fn cached(&self) -> Option<&ResolvedLocation> {
        self.resolved.as_ref()
    }

    #[instrument(skip_all, fields(query = ?self.query))]
    pub async fn resolve(&mut self, upstream: &dyn UpstreamPort) -> Result<&ResolvedLocation> {
        if self.resolved.is_none() {
            self.query.validate()?;
            let resolved = lookup(&self.query, upstream).await?;
            info!(
                location_id = resolved.location_id,
                sensors = resolved.sensor_map.len(),
                "Resolved location"
            );
            FeedMetrics::record_resolution();
            self.resolved = Some(resolved);
        }
        self.resolved.as_ref().ok_or(FeedError::LocationNotFound)
    }
}

async fn lookup(query: &LocationQuery, upstream: &dyn UpstreamPort) -> Result<ResolvedLocation> {
    let search = LocationSearch::for_query(query);
    let location = upstream
        .search_locations(&search)
        .await?
        .into_iter()
        .next()
        .ok_or(FeedError::LocationNotFound)?;

    let mut sensor_map = HashMap::new();
    for sensor in &location.sensors {
        match (sensor.id, sensor.parameter_name()) {
            (Some(id), Some(name)) => {
                sensor_map.insert(id, name.to_lowercase());
            }
            _ => debug!(?sensor, "Skipping sensor without id or parameter name"),
        }
    }

    Ok(ResolvedLocation {
        location_id: location.id,
        sensor_map,
    })
}
