use crate::app::ports::UpstreamPort;
use crate::constants::UNKNOWN_PARAMETER;
use crate::domain::{FeedPayload, LocationQuery, NormalizedSnapshot, RawReading, SensorLocation};
use crate::error::{FeedError, Result};
use crate::metrics::FeedMetrics;
use crate::pipeline::normalize::NormalizationEngine;
use crate::pipeline::resolver::LocationResolver;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Resolve, fetch, normalize.
///
/// Holds the resolution cache and the smoothing history for one consumer.
/// Every fetch takes `&mut self`, so overlapping fetches on one instance are
/// impossible by construction.
pub struct AcquisitionPipeline {
    upstream: Arc<dyn UpstreamPort>,
    resolver: LocationResolver,
    engine: NormalizationEngine,
}

impl AcquisitionPipeline {
    pub fn new(upstream: Arc<dyn UpstreamPort>, query: LocationQuery) -> Self {
        Self::with_engine(upstream, query, NormalizationEngine::default())
    }

    pub fn with_engine(
        upstream: Arc<dyn UpstreamPort>,
        query: LocationQuery,
        engine: NormalizationEngine,
    ) -> Self {
        Self {
            upstream,
            resolver: LocationResolver::new(query),
            engine,
        }
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    pub fn engine(&self) -> &NormalizationEngine {
        &self.engine
    }

    #[instrument(skip(self))]
    pub async fn fetch_snapshot(&mut self) -> Result<NormalizedSnapshot> {
        let resolved = self.resolver.resolve(self.upstream.as_ref()).await?;
        let location_id = resolved.location_id;

        let latest = self.upstream.latest(location_id).await?;
        if latest.is_empty() {
            return Err(FeedError::NoDataAvailable { location_id });
        }

        let mut raw = RawReading::new();
        let mut observed_at = None;
        for record in &latest {
            let Some(sensors_id) = record.sensors_id else {
                debug!(?record, "Ignoring reading without sensor id");
                continue;
            };
            let Some(parameter) = resolved.sensor_map.get(&sensors_id) else {
                debug!(sensor = sensors_id, "Ignoring reading from unmapped sensor");
                continue;
            };
            if let Some(value) = record.value {
                raw.insert(parameter.clone(), value);
            }
            observed_at = observed_at.max(record.observed_at());
        }
        debug!(location_id, parameters = raw.len(), "Joined latest readings");

        let mut snapshot = self.engine.normalize(&raw);
        snapshot.observed_at = observed_at;
        FeedMetrics::record_snapshot();
        Ok(snapshot)
    }

    #[instrument(skip(self))]
    pub async fn fetch_sensor_locations(&mut self) -> Result<Vec<SensorLocation>> {
        let location_id = self.resolver.resolve(self.upstream.as_ref()).await?.location_id;

        let Some(location) = self.upstream.location(location_id).await?.into_iter().next() else {
            return Ok(Vec::new());
        };

        let sensors: Vec<SensorLocation> = location
            .sensors
            .iter()
            .map(|sensor| SensorLocation {
                id: sensor.id,
                parameter: sensor
                    .parameter_name()
                    .map(str::to_lowercase)
                    .unwrap_or_else(|| UNKNOWN_PARAMETER.to_string()),
                coordinates: sensor.coordinates.or(location.coordinates),
            })
            .collect();
        info!(location_id, sensors = sensors.len(), "Fetched sensor locations");
        Ok(sensors)
    }

    /// Snapshot first, then sensor positions, merged for map consumers.
    pub async fn fetch_snapshot_with_sensors(&mut self) -> Result<FeedPayload> {
        let snapshot = self.fetch_snapshot().await?;
        let sensors = self.fetch_sensor_locations().await?;
        Ok(FeedPayload { snapshot, sensors })
    }
}
