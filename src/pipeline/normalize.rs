//! Raw readings to a bounded, smoothed feature vector.
//!
//! Each parameter is looked up through its aliases, defaulted to its range
//! minimum when absent, scaled into `[0, 1]` and then blended with the
//! previous output by an exponential moving average. The engine keeps the
//! last snapshot it produced; that history is the only state it has.

use crate::constants::DEFAULT_SMOOTHING_FACTOR;
use crate::domain::{NormalizedSnapshot, RawReading, Reading};
use crate::error::{FeedError, Result};
use crate::ranges::Parameter;

#[derive(Debug, Clone)]
pub struct NormalizationEngine {
    smoothing_factor: f64,
    previous: Option<NormalizedSnapshot>,
}

impl Default for NormalizationEngine {
    fn default() -> Self {
        Self {
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            previous: None,
        }
    }
}

impl NormalizationEngine {
    /// `smoothing_factor` is the weight of the newest observation, in `(0, 1]`.
    pub fn new(smoothing_factor: f64) -> Result<Self> {
        if !(smoothing_factor > 0.0 && smoothing_factor <= 1.0) {
            return Err(FeedError::InvalidConfig(format!(
                "smoothing factor must be in (0, 1], got {}",
                smoothing_factor
            )));
        }
        Ok(Self {
            smoothing_factor,
            previous: None,
        })
    }

    pub fn smoothing_factor(&self) -> f64 {
        self.smoothing_factor
    }

    pub fn has_history(&self) -> bool {
        self.previous.is_some()
    }

    /// Forget the smoothing history; the next call is unsmoothed.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    pub fn normalize(&mut self, raw: &RawReading) -> NormalizedSnapshot {
        let mut readings = [Reading { raw: 0.0, norm: 0.0 }; 9];

        for parameter in Parameter::ALL {
            let range = parameter.range();
            let value = lookup(raw, parameter).unwrap_or(range.min);
            let fresh = range.normalize(parameter.scale(), value);
            let norm = match &self.previous {
                Some(previous) => {
                    let alpha = self.smoothing_factor;
                    alpha * fresh + (1.0 - alpha) * previous.norm(parameter)
                }
                None => fresh,
            };
            readings[parameter.index()] = Reading { raw: value, norm };
        }

        let snapshot = NormalizedSnapshot::new(readings);
        self.previous = Some(snapshot.clone());
        snapshot
    }
}

/// First alias carrying a usable number wins; NaN and infinities count as absent.
fn lookup(raw: &RawReading, parameter: Parameter) -> Option<f64> {
    parameter
        .aliases()
        .iter()
        .find_map(|alias| raw.get(*alias).copied())
        .filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Waveform;

    const EPS: f64 = 1e-12;

    fn reading(pairs: &[(&str, f64)]) -> RawReading {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_first_call_is_unsmoothed() {
        let mut engine = NormalizationEngine::default();
        let snapshot = engine.normalize(&reading(&[("no2", 100.0), ("temperature", 15.0)]));

        assert!((snapshot.norm(Parameter::No2) - 0.5).abs() < EPS);
        assert!((snapshot.norm(Parameter::Temperature) - 0.5).abs() < EPS);
        assert!(engine.has_history());
    }

    #[test]
    fn test_second_call_blends_with_previous() {
        let mut engine = NormalizationEngine::default();
        engine.normalize(&reading(&[("no2", 100.0)]));
        let snapshot = engine.normalize(&reading(&[("no2", 200.0)]));

        // 0.2 * 1.0 + 0.8 * 0.5
        assert!((snapshot.norm(Parameter::No2) - 0.6).abs() < EPS);
        assert_eq!(snapshot.raw(Parameter::No2), 200.0);
    }

    #[test]
    fn test_missing_value_defaults_to_range_min_and_is_smoothed() {
        let mut engine = NormalizationEngine::default();
        engine.normalize(&reading(&[("temperature", 50.0)]));
        let snapshot = engine.normalize(&reading(&[]));

        assert_eq!(snapshot.raw(Parameter::Temperature), -20.0);
        // fresh norm is 0, previous is 1
        assert!((snapshot.norm(Parameter::Temperature) - 0.8).abs() < EPS);
    }

    #[test]
    fn test_nan_counts_as_missing() {
        let mut engine = NormalizationEngine::default();
        let snapshot = engine.normalize(&reading(&[("so2", f64::NAN), ("humidity", f64::INFINITY)]));
        assert_eq!(snapshot.raw(Parameter::So2), 0.0);
        assert_eq!(snapshot.raw(Parameter::Humidity), 0.0);
        assert_eq!(snapshot.norm(Parameter::So2), 0.0);
    }

    #[test]
    fn test_aliases_resolve_in_priority_order() {
        let mut engine = NormalizationEngine::default();
        let snapshot = engine.normalize(&reading(&[
            ("pm2.5", 40.0),
            ("temp", 10.0),
            ("wind_speed", 3.0),
            ("wind", 6.0),
        ]));

        assert_eq!(snapshot.raw(Parameter::Pm25), 40.0);
        assert_eq!(snapshot.raw(Parameter::Temperature), 10.0);
        assert_eq!(snapshot.raw(Parameter::Wind), 6.0);

        let snapshot = engine.normalize(&reading(&[("pm25", 5.0), ("pm2.5", 40.0)]));
        assert_eq!(snapshot.raw(Parameter::Pm25), 5.0);
    }

    #[test]
    fn test_particulates_use_log_scale() {
        let mut engine = NormalizationEngine::default();
        let snapshot = engine.normalize(&reading(&[("pm25", 50.0), ("pm10", 600.0)]));

        let expected = (50f64.ln() - 0.0001f64.ln()) / (500f64.ln() - 0.0001f64.ln());
        assert!((snapshot.norm(Parameter::Pm25) - expected).abs() < EPS);
        assert!((snapshot.norm(Parameter::Pm10) - 1.0).abs() < EPS);
        // Log scaling lifts low concentrations well above the linear position.
        assert!(snapshot.norm(Parameter::Pm25) > 50.0 / 500.0);
    }

    #[test]
    fn test_waveform_uses_raw_co() {
        let mut engine = NormalizationEngine::default();
        assert_eq!(engine.normalize(&reading(&[("co", 4.99)])).co_waveform, Waveform::Sine);
        assert_eq!(engine.normalize(&reading(&[("co", 5.0)])).co_waveform, Waveform::Triangle);
        assert_eq!(engine.normalize(&reading(&[("co", 14.99)])).co_waveform, Waveform::Triangle);
        assert_eq!(engine.normalize(&reading(&[("co", 15.0)])).co_waveform, Waveform::Sawtooth);
        assert_eq!(engine.normalize(&reading(&[])).co_waveform, Waveform::Sine);
    }

    #[test]
    fn test_reset_drops_history() {
        let mut engine = NormalizationEngine::default();
        engine.normalize(&reading(&[("o3", 200.0)]));
        engine.reset();
        let snapshot = engine.normalize(&reading(&[("o3", 0.0)]));
        assert_eq!(snapshot.norm(Parameter::O3), 0.0);
    }

    #[test]
    fn test_custom_smoothing_factor() {
        let mut engine = NormalizationEngine::new(0.5).unwrap();
        engine.normalize(&reading(&[("humidity", 0.0)]));
        let snapshot = engine.normalize(&reading(&[("humidity", 100.0)]));
        assert!((snapshot.norm(Parameter::Humidity) - 0.5).abs() < EPS);
    }

    #[test]
    fn test_smoothing_factor_is_validated() {
        assert!(NormalizationEngine::new(0.0).is_err());
        assert!(NormalizationEngine::new(1.5).is_err());
        assert!(NormalizationEngine::new(f64::NAN).is_err());
        assert!(NormalizationEngine::new(1.0).is_ok());
    }
}
