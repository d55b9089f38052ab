//! Static per-parameter bounds, alias lists and scaling rules.
//!
//! Every tracked parameter has a fixed `[min, max]` range. Particulate matter
//! is normalized on a log scale because concentrations cluster at the low end;
//! everything else is scaled linearly.

use serde::Serialize;

/// Floor applied to the range minimum and the value before taking logarithms.
pub const LOG_EPSILON: f64 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Parameter {
    Pm25,
    Pm10,
    No2,
    O3,
    So2,
    Co,
    Temperature,
    Humidity,
    Wind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Linear,
    Logarithmic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
}

impl Parameter {
    /// Processing and serialization order.
    pub const ALL: [Parameter; 9] = [
        Parameter::Pm25,
        Parameter::Pm10,
        Parameter::No2,
        Parameter::O3,
        Parameter::So2,
        Parameter::Co,
        Parameter::Temperature,
        Parameter::Humidity,
        Parameter::Wind,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Parameter::Pm25 => "pm25",
            Parameter::Pm10 => "pm10",
            Parameter::No2 => "no2",
            Parameter::O3 => "o3",
            Parameter::So2 => "so2",
            Parameter::Co => "co",
            Parameter::Temperature => "temperature",
            Parameter::Humidity => "humidity",
            Parameter::Wind => "wind",
        }
    }

    /// Key of the smoothed normalized value in serialized output.
    pub fn norm_key(self) -> &'static str {
        match self {
            Parameter::Pm25 => "pm25_norm",
            Parameter::Pm10 => "pm10_norm",
            Parameter::No2 => "no2_norm",
            Parameter::O3 => "o3_norm",
            Parameter::So2 => "so2_norm",
            Parameter::Co => "co_norm",
            Parameter::Temperature => "temperature_norm",
            Parameter::Humidity => "humidity_norm",
            Parameter::Wind => "wind_norm",
        }
    }

    /// Upstream names accepted for this parameter, in priority order.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Parameter::Pm25 => &["pm25", "pm2.5"],
            Parameter::Pm10 => &["pm10"],
            Parameter::No2 => &["no2"],
            Parameter::O3 => &["o3"],
            Parameter::So2 => &["so2"],
            Parameter::Co => &["co"],
            Parameter::Temperature => &["temperature", "temp"],
            Parameter::Humidity => &["humidity"],
            Parameter::Wind => &["wind", "wind_speed"],
        }
    }

    pub fn range(self) -> ParameterRange {
        let (min, max) = match self {
            Parameter::Pm25 => (0.0, 500.0),
            Parameter::Pm10 => (0.0, 600.0),
            Parameter::No2 => (0.0, 200.0),
            Parameter::O3 => (0.0, 200.0),
            Parameter::So2 => (0.0, 100.0),
            Parameter::Co => (0.0, 50.0),
            Parameter::Temperature => (-20.0, 50.0),
            Parameter::Humidity => (0.0, 100.0),
            Parameter::Wind => (0.0, 30.0),
        };
        ParameterRange { min, max }
    }

    pub fn scale(self) -> Scale {
        match self {
            Parameter::Pm25 | Parameter::Pm10 => Scale::Logarithmic,
            _ => Scale::Linear,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl ParameterRange {
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    pub fn linear(&self, value: f64) -> f64 {
        (self.clamp(value) - self.min) / (self.max - self.min)
    }

    /// Log-scaled position of `value` within the range.
    ///
    /// Values above `max` are not clamped and map above 1.
    pub fn logarithmic(&self, value: f64) -> f64 {
        let safe_min = if self.min <= 0.0 { LOG_EPSILON } else { self.min };
        let safe_value = value.max(safe_min);
        let log_min = safe_min.ln();
        (safe_value.ln() - log_min) / (self.max.ln() - log_min)
    }

    pub fn normalize(&self, scale: Scale, value: f64) -> f64 {
        match scale {
            Scale::Linear => self.linear(value),
            Scale::Logarithmic => self.logarithmic(value),
        }
    }
}
