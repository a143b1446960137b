//! Physical-bounds validation for raw observation values.
//!
//! Every numeric field entering the system passes through [`safe_float`];
//! values outside their physical bounds are dropped (set to `None`) with a
//! WARN so that a single bad sensor row can never poison a forecast.

use serde_json::Value;
use tracing::warn;

/// Inclusive physical bounds per field, as (min, max).
pub mod limits {
    /// Significant wave height (meters)
    pub const WAVE_HEIGHT: (f64, f64) = (0.0, 30.0);
    /// Dominant wave period (seconds). Below 4 s is a phantom swell.
    pub const DOMINANT_PERIOD: (f64, f64) = (4.0, 30.0);
    /// Average wave period (seconds)
    pub const AVERAGE_PERIOD: (f64, f64) = (2.0, 25.0);
    /// Wind speed (m/s)
    pub const WIND_SPEED: (f64, f64) = (0.0, 150.0);
    /// Atmospheric pressure (hPa)
    pub const PRESSURE: (f64, f64) = (900.0, 1100.0);
    /// Water temperature (Celsius)
    pub const WATER_TEMP: (f64, f64) = (-2.0, 35.0);
    /// Air temperature (Celsius)
    pub const AIR_TEMP: (f64, f64) = (-40.0, 50.0);
    /// Any direction (degrees, 0 = from North, clockwise)
    pub const DIRECTION: (f64, f64) = (0.0, 360.0);
}

/// Coerce a raw string to a float within `[min, max]`.
///
/// Returns `None` without logging for empty/absent input (missing data is
/// normal), and `None` with a WARN when the value parses outside bounds or
/// does not parse at all.
pub fn safe_float(raw: Option<&str>, min: f64, max: f64, field: &str) -> Option<f64> {
    let raw = raw?.trim();
    if raw.is_empty() || raw == "MM" {
        // NDBC uses "MM" for missing measurements
        return None;
    }

    match raw.parse::<f64>() {
        Ok(v) if (min..=max).contains(&v) => Some(v),
        Ok(v) => {
            warn!(field = field, value = v, min = min, max = max, "Value outside physical bounds, dropping");
            None
        }
        Err(_) => {
            warn!(field = field, value = raw, "Unparseable numeric value, dropping");
            None
        }
    }
}

/// JSON variant of [`safe_float`]: accepts numbers or numeric strings.
pub fn safe_float_value(raw: Option<&Value>, min: f64, max: f64, field: &str) -> Option<f64> {
    match raw {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => {
            let v = n.as_f64()?;
            if (min..=max).contains(&v) {
                Some(v)
            } else {
                warn!(field = field, value = v, min = min, max = max, "Value outside physical bounds, dropping");
                None
            }
        }
        Some(Value::String(s)) => safe_float(Some(s), min, max, field),
        Some(other) => {
            warn!(field = field, value = %other, "Non-numeric value, dropping");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_range_value_passes() {
        assert_eq!(safe_float(Some("2.5"), 0.0, 30.0, "wave_height"), Some(2.5));
    }

    #[test]
    fn out_of_range_value_dropped() {
        assert_eq!(safe_float(Some("42.0"), 0.0, 30.0, "wave_height"), None);
        assert_eq!(safe_float(Some("-1.0"), 0.0, 30.0, "wave_height"), None);
    }

    #[test]
    fn phantom_period_rejected() {
        let (min, max) = limits::DOMINANT_PERIOD;
        assert_eq!(safe_float(Some("3.0"), min, max, "dominant_period"), None);
        assert_eq!(safe_float(Some("4.0"), min, max, "dominant_period"), Some(4.0));
    }

    #[test]
    fn missing_input_is_silent_none() {
        assert_eq!(safe_float(None, 0.0, 30.0, "wave_height"), None);
        assert_eq!(safe_float(Some(""), 0.0, 30.0, "wave_height"), None);
        assert_eq!(safe_float(Some("MM"), 0.0, 30.0, "wave_height"), None);
    }

    #[test]
    fn garbage_input_dropped() {
        assert_eq!(safe_float(Some("n/a"), 0.0, 30.0, "wave_height"), None);
    }

    #[test]
    fn json_number_and_string_accepted() {
        let n = serde_json::json!(1.8);
        assert_eq!(safe_float_value(Some(&n), 0.0, 30.0, "wave_height"), Some(1.8));
        let s = serde_json::json!("1.8");
        assert_eq!(safe_float_value(Some(&s), 0.0, 30.0, "wave_height"), Some(1.8));
        assert_eq!(safe_float_value(None, 0.0, 30.0, "wave_height"), None);
    }
}
