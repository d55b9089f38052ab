//! In-memory provider used by unit tests.

use crate::app::ports::{LocationSearch, UpstreamPort};
use crate::domain::Coordinates;
use crate::error::{FeedError, Result};
use crate::types::{LatestRecord, LocationRecord, ParameterRecord, SensorRecord};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MockUpstream {
    pub locations: Mutex<Vec<LocationRecord>>,
    pub latest: Mutex<Vec<LatestRecord>>,
    pub fail_latest: Mutex<Option<String>>,
    pub searches: Mutex<Vec<LocationSearch>>,
    pub latest_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
}

impl MockUpstream {
    pub fn with_location(location: LocationRecord) -> Self {
        let mock = Self::default();
        mock.locations.lock().unwrap().push(location);
        mock
    }

    pub fn set_latest(&self, readings: &[(i64, f64)]) {
        *self.latest.lock().unwrap() = readings
            .iter()
            .map(|(sensors_id, value)| LatestRecord {
                sensors_id: Some(*sensors_id),
                value: Some(*value),
                datetime: None,
            })
            .collect();
    }

    pub fn search_count(&self) -> usize {
        self.searches.lock().unwrap().len()
    }
}

pub fn sensor(id: i64, name: &str) -> SensorRecord {
    SensorRecord {
        id: Some(id),
        parameter: Some(ParameterRecord {
            name: Some(name.to_string()),
            units: None,
        }),
        coordinates: None,
    }
}

pub fn location(id: i64, sensors: Vec<SensorRecord>) -> LocationRecord {
    LocationRecord {
        id,
        name: Some("Test Station".to_string()),
        coordinates: Some(Coordinates {
            latitude: 47.6,
            longitude: -122.3,
        }),
        sensors,
    }
}

#[async_trait]
impl UpstreamPort for MockUpstream {
    async fn search_locations(&self, search: &LocationSearch) -> Result<Vec<LocationRecord>> {
        self.searches.lock().unwrap().push(search.clone());
        Ok(self.locations.lock().unwrap().clone())
    }

    async fn location(&self, _location_id: i64) -> Result<Vec<LocationRecord>> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.locations.lock().unwrap().clone())
    }

    async fn latest(&self, _location_id: i64) -> Result<Vec<LatestRecord>> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_latest.lock().unwrap().clone() {
            return Err(FeedError::UpstreamFailure {
                status: Some(503),
                message,
            });
        }
        Ok(self.latest.lock().unwrap().clone())
    }
}
