//! Wave model processing: cleaning, trend analysis over the forecast run,
//! per-shore impact, and automatic swell-event detection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use tracing::debug;

use super::circular_mean_degrees;
use crate::geo::HawaiiContext;
use crate::physics::{self, haversine_km};
use crate::types::{ModelData, ModelPoint};

/// Points farther than this from a shore centroid are ignored for shore impact.
const SHORE_RADIUS_KM: f64 = 50.0;

/// Height trend shape over the forecast run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrend {
    Increasing,
    Decreasing,
    Stable,
}

/// Trend analysis over one model run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTrend {
    pub trend: RunTrend,
    /// Middle-third maximum exceeds both tails by ≥25 %
    pub peaking: bool,
    pub values: Vec<f64>,
}

/// Maximum conditions across the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaxConditions {
    pub max_height: f64,
    pub max_period: f64,
    pub max_height_hour: Option<i64>,
    pub max_period_hour: Option<i64>,
}

/// Aggregate statistics over all points of the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelStats {
    pub forecast_count: usize,
    pub total_points: usize,
    pub height_mean: Option<f64>,
    pub height_median: Option<f64>,
    pub height_max: Option<f64>,
    pub period_mean: Option<f64>,
    pub period_max: Option<f64>,
    pub direction_mean: Option<f64>,
    /// Distinct 10° direction sectors seen
    pub direction_sectors: usize,
}

/// Impact of the run on one shore.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShoreImpact {
    /// Mean of the top-3 per-forecast impacts
    pub impact_score: f64,
    pub max_height: f64,
    /// Best exposure factor achieved inside a quality direction band
    pub optimal_direction_match: f64,
}

/// One swell event auto-detected from the run's height time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedSwellEvent {
    pub event_id: String,
    pub peak_time: DateTime<Utc>,
    pub peak_hour: i64,
    /// Mean height at the peak step (meters)
    pub peak_height: f64,
    pub peak_period: Option<f64>,
    pub peak_direction: Option<f64>,
    pub significance: f64,
    pub hawaii_scale: f64,
    pub start_time: Option<DateTime<Utc>>,
    pub start_hour: Option<i64>,
    pub end_time: Option<DateTime<Utc>>,
    pub end_hour: Option<i64>,
    pub duration_hours: Option<i64>,
}

/// Result of processing one model run.
#[derive(Debug, Clone)]
pub struct ProcessedModel {
    pub data: ModelData,
    pub forecast_range_hours: Option<i64>,
    pub height_trend: Option<ModelTrend>,
    pub period_trend: Option<RunTrend>,
    pub max_conditions: MaxConditions,
    pub stats: ModelStats,
    pub shore_impacts: BTreeMap<String, ShoreImpact>,
    pub detected_events: Vec<DetectedSwellEvent>,
    pub special_conditions: Vec<String>,
    pub warnings: Vec<String>,
}

/// Processor for wave model runs.
#[derive(Debug, Clone, Default)]
pub struct WaveModelProcessor {
    hawaii: HawaiiContext,
}

impl WaveModelProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&self, mut data: ModelData, now: DateTime<Utc>) -> ProcessedModel {
        clean_forecasts(&mut data);

        let mut warnings = Vec::new();
        let hours_old = (now - data.run_time).num_seconds() as f64 / 3600.0;
        if hours_old > 12.0 {
            warnings.push(format!("Model data is {hours_old:.1} hours old"));
        }

        let forecast_range_hours = if data.forecasts.len() >= 2 {
            let min = data.forecasts.iter().map(|f| f.forecast_hour).min().unwrap();
            let max = data.forecasts.iter().map(|f| f.forecast_hour).max().unwrap();
            Some(max - min)
        } else {
            None
        };

        let heights = step_means(&data, |p| p.wave_height);
        let periods = step_means(&data, |p| p.wave_period);
        let height_trend = analyze_height_trend(&heights);
        let period_trend = thirds_trend(&periods.iter().map(|(_, _, v)| *v).collect::<Vec<_>>(), 1.15);

        let max_conditions = max_conditions(&data);
        let stats = overall_stats(&data);
        let shore_impacts = self.shore_impacts(&data, now);
        let detected_events = detect_swell_events(&data, &heights);

        let mut special_conditions = Vec::new();
        if max_conditions.max_height > 3.0 {
            special_conditions.push("large_swell_forecast".to_string());
        }
        if max_conditions.max_period > 15.0 {
            special_conditions.push("long_period_swell_forecast".to_string());
        }

        debug!(
            model = %data.model_id,
            steps = data.forecasts.len(),
            events = detected_events.len(),
            "Wave model processed"
        );

        ProcessedModel {
            data,
            forecast_range_hours,
            height_trend,
            period_trend,
            max_conditions,
            stats,
            shore_impacts,
            detected_events,
            special_conditions,
            warnings,
        }
    }

    fn shore_impacts(&self, data: &ModelData, now: DateTime<Utc>) -> BTreeMap<String, ShoreImpact> {
        let mut impacts = BTreeMap::new();

        for shore in self.hawaii.all_shores() {
            let mut impact = ShoreImpact::default();
            let seasonal = self.hawaii.seasonal_factor(shore.key, now);
            let mut per_forecast: Vec<f64> = Vec::new();

            for forecast in &data.forecasts {
                let near: Vec<&ModelPoint> = forecast
                    .points
                    .iter()
                    .filter(|p| {
                        haversine_km(shore.latitude, shore.longitude, p.latitude, p.longitude)
                            <= SHORE_RADIUS_KM
                    })
                    .collect();
                if near.is_empty() {
                    continue;
                }

                let heights: Vec<f64> = near.iter().filter_map(|p| p.wave_height).collect();
                if heights.is_empty() {
                    continue;
                }
                let avg_height = heights.iter().sum::<f64>() / heights.len() as f64;

                let directions: Vec<f64> = near.iter().filter_map(|p| p.wave_direction).collect();
                let avg_direction = circular_mean_degrees(&directions);

                let exposure = avg_direction
                    .map(|d| self.hawaii.exposure_factor(shore.key, d))
                    .unwrap_or(0.5);

                per_forecast.push(avg_height * exposure * seasonal);
                impact.max_height = impact.max_height.max(avg_height);

                if let Some(dir) = avg_direction {
                    let in_quality = shore
                        .quality_directions
                        .iter()
                        .any(|&r| self.hawaii.is_in_range(dir, r));
                    if in_quality {
                        impact.optimal_direction_match =
                            impact.optimal_direction_match.max(exposure);
                    }
                }
            }

            // Impact score: mean of the three strongest forecast steps
            per_forecast.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
            let top = &per_forecast[..per_forecast.len().min(3)];
            if !top.is_empty() {
                impact.impact_score = top.iter().sum::<f64>() / top.len() as f64;
            }

            impacts.insert(shore.key.to_string(), impact);
        }

        impacts
    }
}

/// Drop points with non-physical heights and forecasts with no valid points;
/// null out impossible periods/directions.
pub fn clean_forecasts(data: &mut ModelData) {
    for forecast in &mut data.forecasts {
        forecast.points.retain(|p| p.wave_height.is_some_and(|h| h > 0.0));
        for point in &mut forecast.points {
            if point.wave_period.is_some_and(|t| t <= 0.0) {
                point.wave_period = None;
            }
            if point.wave_direction.is_some_and(|d| !(0.0..=360.0).contains(&d)) {
                point.wave_direction = None;
            }
        }
    }
    data.forecasts.retain(|f| !f.points.is_empty());
    data.forecasts.sort_by_key(|f| f.forecast_hour);
}

/// Mean of a point quantity for each forecast step:
/// `(forecast_hour, timestamp, mean)`.
fn step_means(
    data: &ModelData,
    quantity: impl Fn(&ModelPoint) -> Option<f64>,
) -> Vec<(i64, DateTime<Utc>, f64)> {
    data.forecasts
        .iter()
        .filter_map(|f| {
            let values: Vec<f64> = f.points.iter().filter_map(&quantity).collect();
            if values.is_empty() {
                None
            } else {
                Some((
                    f.forecast_hour,
                    f.timestamp,
                    values.iter().sum::<f64>() / values.len() as f64,
                ))
            }
        })
        .collect()
}

/// First-third vs last-third trend with the given ratio threshold.
fn thirds_trend(values: &[f64], threshold: f64) -> Option<RunTrend> {
    if values.len() < 3 {
        return None;
    }
    let third = values.len() / 3;
    let first = &values[..third.max(1)];
    let last = &values[values.len() - third.max(1)..];
    let first_avg = first.iter().sum::<f64>() / first.len() as f64;
    let last_avg = last.iter().sum::<f64>() / last.len() as f64;

    Some(if last_avg > first_avg * threshold {
        RunTrend::Increasing
    } else if first_avg > last_avg * threshold {
        RunTrend::Decreasing
    } else {
        RunTrend::Stable
    })
}

fn analyze_height_trend(heights: &[(i64, DateTime<Utc>, f64)]) -> Option<ModelTrend> {
    let values: Vec<f64> = heights.iter().map(|(_, _, v)| *v).collect();
    let trend = thirds_trend(&values, 1.25)?;

    let third = values.len() / 3;
    let first = &values[..third.max(1)];
    let last = &values[values.len() - third.max(1)..];
    let first_avg = first.iter().sum::<f64>() / first.len() as f64;
    let last_avg = last.iter().sum::<f64>() / last.len() as f64;

    let middle = &values[third..values.len() - third];
    let peaking = middle
        .iter()
        .cloned()
        .fold(None::<f64>, |m, v| Some(m.map_or(v, |m| m.max(v))))
        .is_some_and(|mid_max| mid_max > first_avg.max(last_avg) * 1.25);

    Some(ModelTrend {
        trend,
        peaking,
        values,
    })
}

fn max_conditions(data: &ModelData) -> MaxConditions {
    let mut max = MaxConditions::default();
    for forecast in &data.forecasts {
        for point in &forecast.points {
            if let Some(h) = point.wave_height {
                if h > max.max_height {
                    max.max_height = h;
                    max.max_height_hour = Some(forecast.forecast_hour);
                }
            }
            if let Some(p) = point.wave_period {
                if p > max.max_period {
                    max.max_period = p;
                    max.max_period_hour = Some(forecast.forecast_hour);
                }
            }
        }
    }
    max
}

fn overall_stats(data: &ModelData) -> ModelStats {
    let mut heights = Vec::new();
    let mut periods = Vec::new();
    let mut directions = Vec::new();
    let mut total_points = 0usize;

    for forecast in &data.forecasts {
        total_points += forecast.points.len();
        for point in &forecast.points {
            if let Some(h) = point.wave_height {
                heights.push(h);
            }
            if let Some(p) = point.wave_period {
                periods.push(p);
            }
            if let Some(d) = point.wave_direction {
                directions.push(d);
            }
        }
    }

    let sectors: std::collections::BTreeSet<i64> = directions
        .iter()
        .map(|d| ((d / 10.0).round() as i64) * 10)
        .collect();

    ModelStats {
        forecast_count: data.forecasts.len(),
        total_points,
        height_mean: (!heights.is_empty()).then(|| heights.iter().mean()),
        height_median: median(&mut heights.clone()),
        height_max: heights.iter().cloned().fold(None, |m, v| Some(m.map_or(v, |m: f64| m.max(v)))),
        period_mean: (!periods.is_empty()).then(|| periods.iter().mean()),
        period_max: periods.iter().cloned().fold(None, |m, v| Some(m.map_or(v, |m: f64| m.max(v)))),
        direction_mean: circular_mean_degrees(&directions),
        direction_sectors: sectors.len(),
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some(values[values.len() / 2])
}

/// Detect swell events as local maxima of the per-step mean height that
/// exceed their neighbours' average by ≥20 %. Each peak is traced backward
/// and forward to the first crossing of 50 % of the peak height to define
/// the event window. When no peak qualifies the run maximum stands in.
pub fn detect_swell_events(
    data: &ModelData,
    heights: &[(i64, DateTime<Utc>, f64)],
) -> Vec<DetectedSwellEvent> {
    if heights.len() < 3 {
        return Vec::new();
    }

    let values: Vec<f64> = heights.iter().map(|(_, _, v)| *v).collect();
    let mut peak_indexes = Vec::new();
    for i in 1..values.len() - 1 {
        if values[i] > values[i - 1] && values[i] > values[i + 1] {
            let surrounding = (values[i - 1] + values[i + 1]) / 2.0;
            if values[i] > surrounding * 1.2 {
                peak_indexes.push(i);
            }
        }
    }
    if peak_indexes.is_empty() {
        let max_idx = values
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i);
        if let Some(i) = max_idx {
            peak_indexes.push(i);
        }
    }

    let mut events = Vec::new();
    for (n, &peak_idx) in peak_indexes.iter().enumerate() {
        let (peak_hour, peak_time, peak_height) = heights[peak_idx];

        let peak_forecast = data.forecasts.iter().find(|f| f.forecast_hour == peak_hour);
        let (peak_period, peak_direction) = peak_forecast
            .map(|f| {
                let periods: Vec<f64> = f.points.iter().filter_map(|p| p.wave_period).collect();
                let directions: Vec<f64> =
                    f.points.iter().filter_map(|p| p.wave_direction).collect();
                (
                    (!periods.is_empty())
                        .then(|| periods.iter().sum::<f64>() / periods.len() as f64),
                    circular_mean_degrees(&directions),
                )
            })
            .unwrap_or((None, None));

        // Trace to the 50% crossings
        let half = peak_height * 0.5;
        let mut start_idx = peak_idx;
        while start_idx > 0 && values[start_idx - 1] >= half {
            start_idx -= 1;
        }
        let mut end_idx = peak_idx;
        while end_idx + 1 < values.len() && values[end_idx + 1] >= half {
            end_idx += 1;
        }

        let (start_hour, start_time, _) = heights[start_idx];
        let (end_hour, end_time, _) = heights[end_idx];

        events.push(DetectedSwellEvent {
            event_id: format!("swell_{}_{}", data.model_id, n + 1),
            peak_time,
            peak_hour,
            peak_height,
            peak_period,
            peak_direction,
            significance: physics::significance(Some(peak_height), peak_period),
            hawaii_scale: physics::hawaii_scale_ft(peak_height),
            start_time: Some(start_time),
            start_hour: Some(start_hour),
            end_time: Some(end_time),
            end_hour: Some(end_hour),
            duration_hours: Some(end_hour - start_hour),
        });
    }

    events.sort_by(|a, b| {
        b.significance
            .partial_cmp(&a.significance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// SWAN run whose mean height ramps up to a clear mid-run peak near the
    /// North Shore.
    fn peaked_run() -> ModelData {
        let heights = [1.0, 1.2, 2.0, 3.2, 2.0, 1.2, 1.0];
        let forecasts: Vec<serde_json::Value> = heights
            .iter()
            .enumerate()
            .map(|(i, h)| {
                json!({
                    "hour": (i as i64) * 12,
                    "timestamp": format!("2025-10-{:02}T{:02}:00:00Z", 7 + (i / 2), (i % 2) * 12),
                    "points": [
                        { "lat": 21.66, "lon": -158.05, "hs": h, "tp": 14.0, "dir": 315.0 }
                    ]
                })
            })
            .collect();
        ModelData::from_swan_json(
            &json!({
                "metadata": { "model": "swan-oahu", "region": "oahu", "run_time": "2025-10-07T00:00:00Z" },
                "forecasts": forecasts
            }),
            Utc::now(),
        )
    }

    #[test]
    fn cleaning_drops_invalid_points() {
        let mut data = ModelData::from_swan_json(
            &json!({
                "metadata": { "model": "swan", "region": "oahu", "run_time": "2025-10-07T00:00:00Z" },
                "forecasts": [
                    { "hour": 0, "timestamp": "2025-10-07T00:00:00Z", "points": [
                        { "lat": 21.6, "lon": -158.0, "hs": -1.0 },
                        { "lat": 21.6, "lon": -158.0, "hs": 2.0, "tp": -5.0, "dir": 400.0 }
                    ]},
                    { "hour": 24, "timestamp": "2025-10-08T00:00:00Z", "points": [
                        { "lat": 21.6, "lon": -158.0, "hs": 0.0 }
                    ]}
                ]
            }),
            Utc::now(),
        );
        clean_forecasts(&mut data);
        assert_eq!(data.forecasts.len(), 1);
        let point = &data.forecasts[0].points[0];
        assert_eq!(point.wave_height, Some(2.0));
        assert_eq!(point.wave_period, None, "negative period nulled");
        assert_eq!(point.wave_direction, None, "out-of-range direction nulled");
    }

    #[test]
    fn detects_mid_run_peak_with_window() {
        let data = peaked_run();
        let heights = step_means(&data, |p| p.wave_height);
        let events = detect_swell_events(&data, &heights);
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.peak_hour, 36);
        assert!((event.peak_height - 3.2).abs() < 1e-9);
        // 50% crossing: 1.6m — steps at 2.0m are in, 1.2m steps are out
        assert_eq!(event.start_hour, Some(24));
        assert_eq!(event.end_hour, Some(48));
        assert_eq!(event.duration_hours, Some(24));
        assert!((event.hawaii_scale - 3.2 * 6.56168).abs() < 1e-6);
    }

    #[test]
    fn peaking_pattern_detected() {
        let processed = WaveModelProcessor::new().process(peaked_run(), Utc::now());
        let trend = processed.height_trend.unwrap();
        assert!(trend.peaking, "mid-run bump must be flagged as peaking");
        assert_eq!(processed.forecast_range_hours, Some(72));
    }

    #[test]
    fn north_shore_sees_nw_swell_impact() {
        let processed = WaveModelProcessor::new().process(peaked_run(), Utc::now());
        let north = &processed.shore_impacts["north_shore"];
        let south = &processed.shore_impacts["south_shore"];
        assert!(north.impact_score > 0.0);
        assert!(north.optimal_direction_match > 0.9, "315° is prime NW");
        assert_eq!(south.impact_score, 0.0, "South Shore shadowed from NW");
        assert!((north.max_height - 3.2).abs() < 1e-9);
    }

    #[test]
    fn stats_cover_all_steps() {
        let processed = WaveModelProcessor::new().process(peaked_run(), Utc::now());
        assert_eq!(processed.stats.forecast_count, 7);
        assert_eq!(processed.stats.total_points, 7);
        assert_eq!(processed.stats.direction_sectors, 1);
        assert!((processed.max_conditions.max_height - 3.2).abs() < 1e-9);
        assert!(processed
            .special_conditions
            .contains(&"large_swell_forecast".to_string()));
    }
}
