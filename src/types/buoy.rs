//! Buoy observation types and the NDBC ingest path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::bounds::{limits, safe_float_value};
use super::Metadata;

/// Single observation from a buoy.
///
/// All numeric fields are bounds-validated at construction; any field
/// outside its physical range is `None`. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    /// Significant wave height (meters)
    pub wave_height: Option<f64>,
    /// Dominant wave period (seconds)
    pub dominant_period: Option<f64>,
    /// Average wave period (seconds)
    pub average_period: Option<f64>,
    /// Wave direction (degrees)
    pub wave_direction: Option<f64>,
    /// Wind speed (m/s)
    pub wind_speed: Option<f64>,
    /// Wind direction (degrees)
    pub wind_direction: Option<f64>,
    /// Air temperature (Celsius)
    pub air_temperature: Option<f64>,
    /// Water temperature (Celsius)
    pub water_temperature: Option<f64>,
    /// Atmospheric pressure (hPa)
    pub pressure: Option<f64>,
}

impl Observation {
    /// Total measurement fields expected from a fully reporting buoy.
    pub const EXPECTED_FIELDS: usize = 9;

    /// Build an observation from a raw NDBC key/value row.
    ///
    /// Key mapping: WVHT→wave_height, DPD→dominant_period, APD→average_period,
    /// MWD→wave_direction, WSPD→wind_speed, WDIR→wind_direction,
    /// ATMP→air_temperature, WTMP→water_temperature, PRES→pressure.
    /// Both the raw NDBC keys and normalized snake_case keys are accepted.
    pub fn from_ndbc(row: &Value, now: DateTime<Utc>) -> Self {
        let get = |ndbc: &str, normalized: &str| -> Option<&Value> {
            row.get(ndbc).or_else(|| row.get(normalized))
        };

        let timestamp = get("Date", "timestamp")
            .or_else(|| row.get("DATE"))
            .and_then(Value::as_str)
            .and_then(parse_rfc3339)
            .unwrap_or(now);

        Self {
            timestamp,
            wave_height: safe_float_value(
                get("WVHT", "wave_height"),
                limits::WAVE_HEIGHT.0,
                limits::WAVE_HEIGHT.1,
                "wave_height",
            ),
            dominant_period: safe_float_value(
                get("DPD", "dominant_period"),
                limits::DOMINANT_PERIOD.0,
                limits::DOMINANT_PERIOD.1,
                "dominant_period",
            ),
            average_period: safe_float_value(
                get("APD", "average_period"),
                limits::AVERAGE_PERIOD.0,
                limits::AVERAGE_PERIOD.1,
                "average_period",
            ),
            wave_direction: safe_float_value(
                get("MWD", "wave_direction"),
                limits::DIRECTION.0,
                limits::DIRECTION.1,
                "wave_direction",
            ),
            wind_speed: safe_float_value(
                get("WSPD", "wind_speed"),
                limits::WIND_SPEED.0,
                limits::WIND_SPEED.1,
                "wind_speed",
            ),
            wind_direction: safe_float_value(
                get("WDIR", "wind_direction"),
                limits::DIRECTION.0,
                limits::DIRECTION.1,
                "wind_direction",
            ),
            air_temperature: safe_float_value(
                get("ATMP", "air_temperature"),
                limits::AIR_TEMP.0,
                limits::AIR_TEMP.1,
                "air_temperature",
            ),
            water_temperature: safe_float_value(
                get("WTMP", "water_temperature"),
                limits::WATER_TEMP.0,
                limits::WATER_TEMP.1,
                "water_temperature",
            ),
            pressure: safe_float_value(
                get("PRES", "pressure"),
                limits::PRESSURE.0,
                limits::PRESSURE.1,
                "pressure",
            ),
        }
    }

    /// Count of non-null measurement fields (used for completeness scoring).
    pub fn populated_fields(&self) -> usize {
        [
            self.wave_height,
            self.dominant_period,
            self.average_period,
            self.wave_direction,
            self.wind_speed,
            self.wind_direction,
            self.air_temperature,
            self.water_temperature,
            self.pressure,
        ]
        .iter()
        .filter(|f| f.is_some())
        .count()
    }
}

/// Complete buoy dataset: station metadata plus observations newest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuoyData {
    pub station_id: String,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Observations sorted by timestamp descending (newest first).
    pub observations: Vec<Observation>,
    /// Optional path to a directional spectrum file for this station.
    pub spec_file_path: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl BuoyData {
    /// Most recent observation, if any.
    pub fn latest_observation(&self) -> Option<&Observation> {
        self.observations.first()
    }

    /// Parse an NDBC JSON document into a `BuoyData`, sorting observations
    /// newest-first. Accepts both raw NDBC rows and normalized rows.
    pub fn from_ndbc_json(data: &Value, now: DateTime<Utc>) -> Self {
        let station_id = data
            .get("station_id")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        let mut observations: Vec<Observation> = data
            .get("observations")
            .and_then(Value::as_array)
            .map(|rows| rows.iter().map(|r| Observation::from_ndbc(r, now)).collect())
            .unwrap_or_default();
        observations.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Self {
            name: data
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| Some(format!("NDBC Buoy {station_id}"))),
            latitude: data.get("latitude").and_then(Value::as_f64),
            longitude: data.get("longitude").and_then(Value::as_f64),
            spec_file_path: data
                .get("spec_file_path")
                .and_then(Value::as_str)
                .map(str::to_string),
            metadata: data
                .get("metadata")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            station_id,
            observations,
        }
    }

    /// Display name for prompts and logs.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.station_id)
    }
}

/// Duck-typed buoy input at module boundaries: either a raw NDBC document
/// or an already-parsed record. `normalize` is the single gate.
#[derive(Debug, Clone)]
pub enum BuoyInput {
    Raw(Value),
    Parsed(BuoyData),
}

impl BuoyInput {
    /// Normalize to a `BuoyData`, parsing raw documents as needed.
    pub fn normalize(self, now: DateTime<Utc>) -> BuoyData {
        match self {
            BuoyInput::Parsed(data) => data,
            BuoyInput::Raw(value) => BuoyData::from_ndbc_json(&value, now),
        }
    }
}

/// Lenient RFC3339 parse; accepts a trailing `Z` and space-separated times.
pub fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Tolerate "YYYY-MM-DD HH:MM" styles from tide/chart feeds
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }
    warn!(value = raw, "Unparseable timestamp");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        parse_rfc3339("2025-10-07T12:00:00Z").unwrap()
    }

    #[test]
    fn ndbc_row_maps_keys_and_validates_bounds() {
        let row = json!({
            "Date": "2025-10-07T11:30:00Z",
            "WVHT": "2.4",
            "DPD": "14.0",
            "APD": "9.5",
            "MWD": "315",
            "WSPD": "6.2",
            "WDIR": "60",
            "ATMP": "26.1",
            "WTMP": "25.8",
            "PRES": "1015.2"
        });
        let obs = Observation::from_ndbc(&row, now());
        assert_eq!(obs.wave_height, Some(2.4));
        assert_eq!(obs.dominant_period, Some(14.0));
        assert_eq!(obs.wave_direction, Some(315.0));
        assert_eq!(obs.populated_fields(), 9);
    }

    #[test]
    fn phantom_period_nulled_on_ingest() {
        let row = json!({ "WVHT": "1.2", "DPD": "3.0" });
        let obs = Observation::from_ndbc(&row, now());
        assert_eq!(obs.wave_height, Some(1.2));
        assert_eq!(obs.dominant_period, None, "period below 4s must be rejected");
    }

    #[test]
    fn observations_sorted_newest_first() {
        let doc = json!({
            "station_id": "51201",
            "observations": [
                { "timestamp": "2025-10-07T06:00:00Z", "wave_height": 1.0, "dominant_period": 12.0 },
                { "timestamp": "2025-10-07T10:00:00Z", "wave_height": 1.4, "dominant_period": 12.0 },
                { "timestamp": "2025-10-07T08:00:00Z", "wave_height": 1.2, "dominant_period": 12.0 }
            ]
        });
        let buoy = BuoyData::from_ndbc_json(&doc, now());
        assert_eq!(buoy.station_id, "51201");
        assert_eq!(buoy.observations.len(), 3);
        assert!(buoy
            .observations
            .windows(2)
            .all(|w| w[0].timestamp >= w[1].timestamp));
        assert_eq!(buoy.latest_observation().unwrap().wave_height, Some(1.4));
    }

    #[test]
    fn normalize_gate_accepts_both_variants() {
        let doc = json!({ "station_id": "51001", "observations": [] });
        let from_raw = BuoyInput::Raw(doc).normalize(now());
        assert_eq!(from_raw.station_id, "51001");

        let parsed = BuoyInput::Parsed(from_raw.clone()).normalize(now());
        assert_eq!(parsed.station_id, from_raw.station_id);
    }
}
