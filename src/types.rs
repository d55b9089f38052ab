use crate::domain::Coordinates;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Every provider response wraps its records in a `results` array.
/// An empty array means "nothing matched", never an HTTP error.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultsEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// A monitoring location as returned by `/locations` and `/locations/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationRecord {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub sensors: Vec<SensorRecord>,
}

/// Sensor metadata; ids and parameter names are not guaranteed present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SensorRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub parameter: Option<ParameterRecord>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParameterRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
}

impl SensorRecord {
    pub fn parameter_name(&self) -> Option<&str> {
        self.parameter.as_ref().and_then(|p| p.name.as_deref())
    }
}

/// One entry of `/locations/{id}/latest`.
#[derive(Debug, Clone, Deserialize)]
pub struct LatestRecord {
    #[serde(rename = "sensorsId", default)]
    pub sensors_id: Option<i64>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub datetime: Option<LatestDatetime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestDatetime {
    #[serde(default)]
    pub utc: Option<DateTime<Utc>>,
}

impl LatestRecord {
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        self.datetime.as_ref().and_then(|d| d.utc)
    }
}
