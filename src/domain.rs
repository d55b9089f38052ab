//! Data shapes shared by the pipeline, the stream loop and the HTTP layer.

use crate::error::{FeedError, Result};
use crate::ranges::Parameter;
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;

/// Where to look for readings.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    City { city: String, country: String },
    Coordinates { latitude: f64, longitude: f64 },
}

impl LocationQuery {
    /// Builds a query from loose parts, as found in query strings or env vars.
    ///
    /// Coordinates take precedence when both forms are complete.
    pub fn from_parts(
        city: Option<&str>,
        country: Option<&str>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<Self> {
        let query = match (latitude, longitude, city, country) {
            (Some(latitude), Some(longitude), _, _) => LocationQuery::Coordinates { latitude, longitude },
            (_, _, Some(city), Some(country)) => LocationQuery::City {
                city: city.to_string(),
                country: country.to_string(),
            },
            _ => {
                return Err(FeedError::InvalidQuery(
                    "expected city and country, or latitude and longitude".to_string(),
                ))
            }
        };
        query.validate()?;
        Ok(query)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            LocationQuery::City { city, country } => {
                if city.trim().is_empty() || country.trim().is_empty() {
                    return Err(FeedError::InvalidQuery(
                        "city and country must both be non-empty".to_string(),
                    ));
                }
            }
            LocationQuery::Coordinates { latitude, longitude } => {
                if !latitude.is_finite() || !(-90.0..=90.0).contains(latitude) {
                    return Err(FeedError::InvalidQuery(format!("latitude out of range: {}", latitude)));
                }
                if !longitude.is_finite() || !(-180.0..=180.0).contains(longitude) {
                    return Err(FeedError::InvalidQuery(format!("longitude out of range: {}", longitude)));
                }
            }
        }
        Ok(())
    }
}

/// Provider-side location and its sensor id → parameter name map.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub location_id: i64,
    pub sensor_map: HashMap<i64, String>,
}

/// Parameter name → latest value, before normalization.
pub type RawReading = HashMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorLocation {
    /// Absent when the provider lists a sensor without an id.
    pub id: Option<i64>,
    pub parameter: String,
    pub coordinates: Option<Coordinates>,
}

/// Discrete mode derived from the raw CO concentration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    /// Low band, CO below 5.
    Sine,
    /// Medium band, 5 up to 15.
    Triangle,
    /// High band, 15 and above.
    Sawtooth,
}

impl Waveform {
    pub fn for_co(raw_co: f64) -> Self {
        if raw_co < 5.0 {
            Waveform::Sine
        } else if raw_co < 15.0 {
            Waveform::Triangle
        } else {
            Waveform::Sawtooth
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Triangle => "triangle",
            Waveform::Sawtooth => "sawtooth",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Value as observed, or the range minimum when it was missing.
    pub raw: f64,
    /// Smoothed normalized value.
    pub norm: f64,
}

/// One normalized feature vector.
///
/// Serializes flat: `pm25`, `pm25_norm`, ..., `co_waveform`, and
/// `observed_at` when the provider reported a timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSnapshot {
    readings: [Reading; 9],
    pub co_waveform: Waveform,
    pub observed_at: Option<DateTime<Utc>>,
}

impl NormalizedSnapshot {
    pub(crate) fn new(readings: [Reading; 9]) -> Self {
        let co_waveform = Waveform::for_co(readings[Parameter::Co.index()].raw);
        Self {
            readings,
            co_waveform,
            observed_at: None,
        }
    }

    pub fn reading(&self, parameter: Parameter) -> Reading {
        self.readings[parameter.index()]
    }

    pub fn raw(&self, parameter: Parameter) -> f64 {
        self.reading(parameter).raw
    }

    pub fn norm(&self, parameter: Parameter) -> f64 {
        self.reading(parameter).norm
    }

    pub fn iter(&self) -> impl Iterator<Item = (Parameter, Reading)> + '_ {
        Parameter::ALL.iter().map(move |p| (*p, self.reading(*p)))
    }
}

impl Serialize for NormalizedSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (parameter, reading) in self.iter() {
            map.serialize_entry(parameter.key(), &reading.raw)?;
            map.serialize_entry(parameter.norm_key(), &reading.norm)?;
        }
        map.serialize_entry("co_waveform", &self.co_waveform)?;
        if let Some(observed_at) = &self.observed_at {
            map.serialize_entry("observed_at", observed_at)?;
        }
        map.end()
    }
}

/// A snapshot merged with sensor positions for consumers that draw a map.
#[derive(Debug, Clone, Serialize)]
pub struct FeedPayload {
    #[serde(flatten)]
    pub snapshot: NormalizedSnapshot,
    pub sensors: Vec<SensorLocation>,
}
