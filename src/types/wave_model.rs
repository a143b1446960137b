//! Wave model output types (SWAN, WaveWatch III).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::buoy::parse_rfc3339;
use super::Metadata;

/// One grid point in a model forecast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Significant wave height (meters)
    pub wave_height: Option<f64>,
    /// Peak period (seconds)
    pub wave_period: Option<f64>,
    /// Wave direction (degrees)
    pub wave_direction: Option<f64>,
    /// Wind speed (m/s)
    pub wind_speed: Option<f64>,
    /// Wind direction (degrees)
    pub wind_direction: Option<f64>,
}

/// One forecast time step: all grid points valid at the same hour offset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelForecast {
    pub timestamp: DateTime<Utc>,
    pub forecast_hour: i64,
    pub points: Vec<ModelPoint>,
}

/// Complete model run: forecasts ordered by forecast hour ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelData {
    pub model_id: String,
    pub run_time: DateTime<Utc>,
    pub region: String,
    pub forecasts: Vec<ModelForecast>,
    #[serde(default)]
    pub metadata: Metadata,
}

fn parse_point(p: &Value, speed_key: &str, dir_key: &str) -> ModelPoint {
    ModelPoint {
        latitude: p.get("lat").and_then(Value::as_f64).unwrap_or(0.0),
        longitude: p.get("lon").and_then(Value::as_f64).unwrap_or(0.0),
        wave_height: p.get("hs").and_then(Value::as_f64),
        wave_period: p.get("tp").and_then(Value::as_f64),
        wave_direction: p.get("dir").and_then(Value::as_f64),
        wind_speed: p.get(speed_key).and_then(Value::as_f64),
        wind_direction: p.get(dir_key).and_then(Value::as_f64),
    }
}

impl ModelData {
    /// Parse a SWAN JSON document:
    /// `metadata.{model,region,run_time}` + `forecasts[].{hour,timestamp,points[]}`
    /// where points use `{lat,lon,hs,tp,dir,wind_speed,wind_dir}`.
    pub fn from_swan_json(data: &Value, now: DateTime<Utc>) -> Self {
        let meta = data.get("metadata").cloned().unwrap_or(Value::Null);
        let run_time = meta
            .get("run_time")
            .and_then(Value::as_str)
            .and_then(parse_rfc3339)
            .unwrap_or(now);

        let mut forecasts: Vec<ModelForecast> = data
            .get("forecasts")
            .and_then(Value::as_array)
            .map(|fs| {
                fs.iter()
                    .map(|f| ModelForecast {
                        timestamp: f
                            .get("timestamp")
                            .and_then(Value::as_str)
                            .and_then(parse_rfc3339)
                            .unwrap_or(now),
                        forecast_hour: f.get("hour").and_then(Value::as_i64).unwrap_or(0),
                        points: f
                            .get("points")
                            .and_then(Value::as_array)
                            .map(|ps| ps.iter().map(|p| parse_point(p, "wind_speed", "wind_dir")).collect())
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        forecasts.sort_by_key(|f| f.forecast_hour);

        Self {
            model_id: meta
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or("swan")
                .to_string(),
            run_time,
            region: meta
                .get("region")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            forecasts,
            metadata: meta.as_object().cloned().unwrap_or_default(),
        }
    }

    /// Parse a WaveWatch III JSON document:
    /// `header.{refTime,area}` + `data[].{timestamp,forecastHour,grid[]}`
    /// where grid points use `{lat,lon,hs,tp,dir,ws,wd}`.
    pub fn from_ww3_json(data: &Value, now: DateTime<Utc>) -> Self {
        let header = data.get("header").cloned().unwrap_or(Value::Null);
        let run_time = header
            .get("refTime")
            .and_then(Value::as_str)
            .and_then(parse_rfc3339)
            .unwrap_or(now);

        let mut forecasts: Vec<ModelForecast> = data
            .get("data")
            .and_then(Value::as_array)
            .map(|fs| {
                fs.iter()
                    .map(|f| ModelForecast {
                        timestamp: f
                            .get("timestamp")
                            .and_then(Value::as_str)
                            .and_then(parse_rfc3339)
                            .unwrap_or(now),
                        forecast_hour: f.get("forecastHour").and_then(Value::as_i64).unwrap_or(0),
                        points: f
                            .get("grid")
                            .and_then(Value::as_array)
                            .map(|ps| ps.iter().map(|p| parse_point(p, "ws", "wd")).collect())
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        forecasts.sort_by_key(|f| f.forecast_hour);

        Self {
            model_id: "ww3".to_string(),
            run_time,
            region: header
                .get("area")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            forecasts,
            metadata: header.as_object().cloned().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn swan_and_ww3_parse_to_same_payload() {
        let now = Utc::now();
        let swan = json!({
            "metadata": { "model": "swan-oahu", "region": "oahu", "run_time": "2025-10-07T00:00:00Z" },
            "forecasts": [
                { "hour": 24, "timestamp": "2025-10-08T00:00:00Z",
                  "points": [{ "lat": 21.6, "lon": -158.1, "hs": 3.0, "tp": 14.0, "dir": 315.0 }] },
                { "hour": 0, "timestamp": "2025-10-07T00:00:00Z",
                  "points": [{ "lat": 21.6, "lon": -158.1, "hs": 2.0, "tp": 13.0, "dir": 310.0 }] }
            ]
        });
        let ww3 = json!({
            "header": { "refTime": "2025-10-07T00:00:00Z", "area": "north_pacific" },
            "data": [
                { "forecastHour": 0, "timestamp": "2025-10-07T00:00:00Z",
                  "grid": [{ "lat": 21.6, "lon": -158.1, "hs": 2.0, "tp": 13.0, "dir": 310.0 }] }
            ]
        });

        let swan = ModelData::from_swan_json(&swan, now);
        assert_eq!(swan.model_id, "swan-oahu");
        // Forecasts re-ordered by forecast hour ascending
        assert_eq!(swan.forecasts[0].forecast_hour, 0);
        assert_eq!(swan.forecasts[1].forecast_hour, 24);
        assert_eq!(swan.forecasts[1].points[0].wave_height, Some(3.0));

        let ww3 = ModelData::from_ww3_json(&ww3, now);
        assert_eq!(ww3.model_id, "ww3");
        assert_eq!(ww3.region, "north_pacific");
        assert_eq!(ww3.forecasts[0].points[0].wave_period, Some(13.0));
    }
}
