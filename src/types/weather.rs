//! Weather forecast types and the NWS ingest path.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::buoy::parse_rfc3339;
use super::Metadata;

/// One forecast period from a weather feed. Units are normalized at ingest:
/// temperature in Celsius, wind speed in m/s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherPeriod {
    pub timestamp: DateTime<Utc>,
    pub name: Option<String>,
    /// Temperature (Celsius)
    pub temperature: Option<f64>,
    /// Wind speed (m/s)
    pub wind_speed: Option<f64>,
    /// Wind direction (degrees)
    pub wind_direction: Option<f64>,
    pub short_forecast: Option<String>,
    pub detailed_forecast: Option<String>,
}

impl WeatherPeriod {
    /// Parse one `properties.periods[*]` entry from an NWS forecast JSON.
    ///
    /// NWS reports temperature in F with a unit marker and wind speed as a
    /// free-text string like `"10 to 15 mph"`; the upper bound is kept.
    pub fn from_nws(period: &Value, now: DateTime<Utc>) -> Self {
        let timestamp = period
            .get("startTime")
            .or_else(|| period.get("timestamp"))
            .and_then(Value::as_str)
            .and_then(parse_rfc3339)
            .unwrap_or(now);

        let temperature = period.get("temperature").and_then(Value::as_f64).map(|t| {
            let unit = period
                .get("temperatureUnit")
                .and_then(Value::as_str)
                .unwrap_or("F");
            if unit.eq_ignore_ascii_case("F") {
                (t - 32.0) * 5.0 / 9.0
            } else {
                t
            }
        });

        let wind_speed = period
            .get("windSpeed")
            .and_then(Value::as_str)
            .and_then(parse_wind_speed_ms);

        let wind_direction = period
            .get("windDirection")
            .and_then(Value::as_str)
            .and_then(compass_to_degrees);

        Self {
            timestamp,
            name: period.get("name").and_then(Value::as_str).map(str::to_string),
            temperature,
            wind_speed,
            wind_direction,
            short_forecast: period
                .get("shortForecast")
                .and_then(Value::as_str)
                .map(str::to_string),
            detailed_forecast: period
                .get("detailedForecast")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

/// Complete weather dataset from one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherData {
    pub provider: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub periods: Vec<WeatherPeriod>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl WeatherData {
    /// Parse an NWS forecast JSON document (`properties.periods[*]`).
    pub fn from_nws_json(data: &Value, now: DateTime<Utc>) -> Self {
        let properties = data.get("properties").cloned().unwrap_or(Value::Null);
        let periods = properties
            .get("periods")
            .and_then(Value::as_array)
            .map(|ps| ps.iter().map(|p| WeatherPeriod::from_nws(p, now)).collect())
            .unwrap_or_default();

        Self {
            provider: data
                .get("provider")
                .and_then(Value::as_str)
                .unwrap_or("nws")
                .to_string(),
            latitude: data.get("latitude").and_then(Value::as_f64),
            longitude: data.get("longitude").and_then(Value::as_f64),
            periods,
            metadata: data
                .get("metadata")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        }
    }

    pub fn current_period(&self) -> Option<&WeatherPeriod> {
        self.periods.first()
    }
}

/// Parse an NWS wind-speed string (e.g. `"10 to 15 mph"`, `"8 kt"`) into m/s.
/// When a range is given, the upper bound is used.
pub fn parse_wind_speed_ms(raw: &str) -> Option<f64> {
    let re = Regex::new(r"(\d+(?:\.\d+)?)").ok()?;
    let value: f64 = re
        .find_iter(raw)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .fold(None, |max: Option<f64>, v| Some(max.map_or(v, |m| m.max(v))))?;

    let lower = raw.to_ascii_lowercase();
    let ms = if lower.contains("mph") {
        value * 0.44704
    } else if lower.contains("kt") || lower.contains("knot") {
        value * 0.51444
    } else if lower.contains("km/h") || lower.contains("kph") {
        value * 0.27778
    } else {
        // Assume already m/s
        value
    };
    Some(ms)
}

/// Convert a 16-point compass string to degrees. Numeric strings pass
/// through, normalized to [0, 360).
pub fn compass_to_degrees(raw: &str) -> Option<f64> {
    const POINTS: [(&str, f64); 16] = [
        ("N", 0.0),
        ("NNE", 22.5),
        ("NE", 45.0),
        ("ENE", 67.5),
        ("E", 90.0),
        ("ESE", 112.5),
        ("SE", 135.0),
        ("SSE", 157.5),
        ("S", 180.0),
        ("SSW", 202.5),
        ("SW", 225.0),
        ("WSW", 247.5),
        ("W", 270.0),
        ("WNW", 292.5),
        ("NW", 315.0),
        ("NNW", 337.5),
    ];
    let upper = raw.trim().to_ascii_uppercase();
    if let Ok(deg) = upper.parse::<f64>() {
        return Some(deg.rem_euclid(360.0));
    }
    POINTS.iter().find(|(p, _)| *p == upper).map(|(_, d)| *d)
}

/// Convert degrees to the nearest 16-point compass direction.
pub fn degrees_to_compass(degrees: f64) -> &'static str {
    const POINTS: [&str; 16] = [
        "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW",
        "NW", "NNW",
    ];
    let deg = degrees.rem_euclid(360.0);
    let idx = ((deg + 11.25) / 22.5) as usize % 16;
    POINTS[idx]
}
