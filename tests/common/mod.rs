#![allow(dead_code)]

use aq_feed::app::ports::{LocationSearch, UpstreamPort};
use aq_feed::types::{LatestRecord, LocationRecord, ParameterRecord, SensorRecord};
use aq_feed::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Scripted provider: one station, settable latest readings, call counters.
pub struct FakeProvider {
    station: LocationRecord,
    latest: Mutex<Vec<LatestRecord>>,
    pub searches: AtomicUsize,
    pub latest_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new(location_id: i64, sensors: &[(i64, &str)]) -> Self {
        let sensors = sensors
            .iter()
            .map(|(id, name)| SensorRecord {
                id: Some(*id),
                parameter: Some(ParameterRecord {
                    name: Some(name.to_string()),
                    units: None,
                }),
                coordinates: None,
            })
            .collect();
        Self {
            station: LocationRecord {
                id: location_id,
                name: Some("Fake Station".to_string()),
                coordinates: None,
                sensors,
            },
            latest: Mutex::new(Vec::new()),
            searches: AtomicUsize::new(0),
            latest_calls: AtomicUsize::new(0),
        }
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

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamPort for FakeProvider {
    async fn search_locations(&self, _search: &LocationSearch) -> Result<Vec<LocationRecord>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(vec![self.station.clone()])
    }

    async fn location(&self, _location_id: i64) -> Result<Vec<LocationRecord>> {
        Ok(vec![self.station.clone()])
    }

    async fn latest(&self, _location_id: i64) -> Result<Vec<LatestRecord>> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.latest.lock().unwrap().clone())
    }
}
