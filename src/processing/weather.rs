//! Weather data processing: wind classification, per-shore surf impact,
//! and forecast-text analysis.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::geo::HawaiiContext;
use crate::types::WeatherData;

/// Wind condition class by speed (m/s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindCondition {
    /// < 2.5 m/s
    Calm,
    /// ≤ 5 m/s
    Light,
    /// ≤ 7.5 m/s
    Moderate,
    /// ≤ 12.5 m/s
    StrongOffshore,
    /// > 12.5 m/s
    StrongOnshore,
}

impl WindCondition {
    pub fn classify(speed_ms: f64) -> Self {
        if speed_ms < 2.5 {
            WindCondition::Calm
        } else if speed_ms <= 5.0 {
            WindCondition::Light
        } else if speed_ms <= 7.5 {
            WindCondition::Moderate
        } else if speed_ms <= 12.5 {
            WindCondition::StrongOffshore
        } else {
            WindCondition::StrongOnshore
        }
    }

    /// Base surf impact in [−1, +1], before the offshore/onshore adjustment.
    pub fn base_impact(self) -> f64 {
        match self {
            WindCondition::Calm => 1.0,
            WindCondition::Light => 0.9,
            WindCondition::Moderate => 0.7,
            WindCondition::StrongOffshore => 0.4,
            WindCondition::StrongOnshore => -0.9,
        }
    }
}

/// Wind impact tally for one shore across forecast periods.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShoreWindImpact {
    pub favorable_periods: usize,
    pub unfavorable_periods: usize,
    /// Favorable-vs-unfavorable balance scaled to [0, 1]
    pub overall_rating: f64,
}

/// Counters for surf-relevant words in forecast text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextMentions {
    pub rain: usize,
    pub shower: usize,
    pub thunder: usize,
    pub storm: usize,
    pub sunny: usize,
    pub clear: usize,
    pub cloudy: usize,
}

/// Dominant weather type of one period, from its forecast text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherType {
    Thunderstorm,
    Rain,
    Cloudy,
    PartlyCloudy,
    Sunny,
    Unknown,
}

/// Result of processing one weather feed.
#[derive(Debug, Clone)]
pub struct ProcessedWeather {
    pub data: WeatherData,
    pub shore_impacts: BTreeMap<String, ShoreWindImpact>,
    pub avg_wind_speed: Option<f64>,
    pub avg_wind_direction: Option<f64>,
    pub mentions: TextMentions,
    pub rain_probability: BTreeMap<usize, u32>,
    pub weather_types: BTreeMap<usize, WeatherType>,
    pub warnings: Vec<String>,
}

/// Processor for weather feeds.
#[derive(Debug, Clone, Default)]
pub struct WeatherProcessor {
    hawaii: HawaiiContext,
}

impl WeatherProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&self, data: WeatherData, now: DateTime<Utc>) -> ProcessedWeather {
        let mut warnings = Vec::new();

        if let Some(first) = data.current_period() {
            let hours_old = (now - first.timestamp).num_seconds() as f64 / 3600.0;
            if hours_old > 12.0 {
                warnings.push(format!("Weather forecast is {hours_old:.1} hours old"));
            }
        }

        let (shore_impacts, avg_wind_speed, avg_wind_direction) = self.analyze_wind(&data);
        let (mentions, rain_probability, weather_types) = self.analyze_text(&data);

        ProcessedWeather {
            data,
            shore_impacts,
            avg_wind_speed,
            avg_wind_direction,
            mentions,
            rain_probability,
            weather_types,
            warnings,
        }
    }

    /// Is the wind vector within 90° of the shore's offshore bearing
    /// (= facing + 180°)?
    pub fn is_offshore(shore_facing: f64, wind_direction: f64) -> bool {
        let offshore = (shore_facing + 180.0).rem_euclid(360.0);
        let mut diff = (wind_direction - offshore).abs();
        if diff > 180.0 {
            diff = 360.0 - diff;
        }
        diff < 90.0
    }

    /// Per-period surf impact for one shore: start from the wind-class base
    /// impact, flip positive impacts for onshore flow, and halve (and flip)
    /// negative impacts for offshore flow.
    pub fn shore_impact_factor(condition: WindCondition, shore_facing: f64, wind_direction: f64) -> f64 {
        let offshore = Self::is_offshore(shore_facing, wind_direction);
        let base = condition.base_impact();
        if !offshore && base > 0.0 {
            -base
        } else if offshore && base < 0.0 {
            -base * 0.5
        } else {
            base
        }
    }

    fn analyze_wind(
        &self,
        data: &WeatherData,
    ) -> (BTreeMap<String, ShoreWindImpact>, Option<f64>, Option<f64>) {
        let mut impacts: BTreeMap<String, ShoreWindImpact> = self
            .hawaii
            .all_shores()
            .iter()
            .map(|s| (s.key.to_string(), ShoreWindImpact::default()))
            .collect();

        let mut speeds = Vec::new();
        let mut directions = Vec::new();
        let mut analyzed_periods = 0usize;

        for period in &data.periods {
            let (Some(speed), Some(direction)) = (period.wind_speed, period.wind_direction) else {
                continue;
            };
            analyzed_periods += 1;
            speeds.push(speed);
            directions.push(direction);

            let condition = WindCondition::classify(speed);
            for shore in self.hawaii.all_shores() {
                let factor =
                    Self::shore_impact_factor(condition, shore.facing_direction, direction);
                let entry = impacts
                    .get_mut(shore.key)
                    .expect("impact map seeded for every shore");
                if factor > 0.0 {
                    entry.favorable_periods += 1;
                } else if factor < 0.0 {
                    entry.unfavorable_periods += 1;
                }
            }
        }

        for impact in impacts.values_mut() {
            let total = impact.favorable_periods + impact.unfavorable_periods;
            if total > 0 {
                let balance = (impact.favorable_periods as f64 - impact.unfavorable_periods as f64)
                    / total as f64;
                impact.overall_rating = (balance + 1.0) / 2.0;
            } else {
                impact.overall_rating = 0.5;
            }
        }

        debug!(periods = analyzed_periods, "Wind analysis complete");
        let avg_speed = if speeds.is_empty() {
            None
        } else {
            Some(speeds.iter().sum::<f64>() / speeds.len() as f64)
        };
        let avg_dir = super::circular_mean_degrees(&directions);
        (impacts, avg_speed, avg_dir)
    }

    fn analyze_text(
        &self,
        data: &WeatherData,
    ) -> (TextMentions, BTreeMap<usize, u32>, BTreeMap<usize, WeatherType>) {
        let rain_re = Regex::new(r"(\d+)% chance of (rain|showers|precipitation)")
            .expect("static regex");

        let mut mentions = TextMentions::default();
        let mut rain_probability = BTreeMap::new();
        let mut weather_types = BTreeMap::new();

        for (i, period) in data.periods.iter().enumerate() {
            let mut text = String::new();
            if let Some(detailed) = &period.detailed_forecast {
                text.push_str(&detailed.to_lowercase());
                text.push(' ');
            }
            if let Some(short) = &period.short_forecast {
                text.push_str(&short.to_lowercase());
            }
            if text.trim().is_empty() {
                continue;
            }

            // One increment per period mentioning a term
            for (word, counter) in [
                ("rain", &mut mentions.rain),
                ("shower", &mut mentions.shower),
                ("thunder", &mut mentions.thunder),
                ("storm", &mut mentions.storm),
                ("sunny", &mut mentions.sunny),
                ("clear", &mut mentions.clear),
                ("cloudy", &mut mentions.cloudy),
            ] {
                if text.contains(word) {
                    *counter += 1;
                }
            }

            if let Some(caps) = rain_re.captures(&text) {
                if let Ok(p) = caps[1].parse::<u32>() {
                    rain_probability.insert(i, p);
                }
            }

            let weather_type = if text.contains("thunder") || text.contains("lightning") {
                WeatherType::Thunderstorm
            } else if text.contains("rain") || text.contains("shower") {
                WeatherType::Rain
            } else if text.contains("partly cloudy") || text.contains("partly sunny") {
                WeatherType::PartlyCloudy
            } else if text.contains("cloudy") || text.contains("overcast") {
                WeatherType::Cloudy
            } else if text.contains("sunny") || text.contains("clear") {
                WeatherType::Sunny
            } else {
                WeatherType::Unknown
            };
            weather_types.insert(i, weather_type);
        }

        (mentions, rain_probability, weather_types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nws_doc(periods: serde_json::Value) -> WeatherData {
        WeatherData::from_nws_json(&json!({ "properties": { "periods": periods } }), Utc::now())
    }

    #[test]
    fn wind_classes() {
        assert_eq!(WindCondition::classify(1.0), WindCondition::Calm);
        assert_eq!(WindCondition::classify(4.0), WindCondition::Light);
        assert_eq!(WindCondition::classify(6.0), WindCondition::Moderate);
        assert_eq!(WindCondition::classify(10.0), WindCondition::StrongOffshore);
        assert_eq!(WindCondition::classify(20.0), WindCondition::StrongOnshore);
    }

    #[test]
    fn offshore_test_uses_facing_plus_180() {
        // North Shore faces 0°; offshore flow comes from the south (180°)
        assert!(WeatherProcessor::is_offshore(0.0, 180.0));
        assert!(!WeatherProcessor::is_offshore(0.0, 0.0));
        // East Shore faces 90°; west winds (270°) are offshore
        assert!(WeatherProcessor::is_offshore(90.0, 270.0));
    }

    #[test]
    fn onshore_flips_positive_impact() {
        // Light wind straight onshore for a north-facing shore
        let f = WeatherProcessor::shore_impact_factor(WindCondition::Light, 0.0, 0.0);
        assert!(f < 0.0);
        // Same wind offshore keeps its positive impact
        let f = WeatherProcessor::shore_impact_factor(WindCondition::Light, 0.0, 180.0);
        assert!((f - 0.9).abs() < 1e-9);
        // Strong wind blowing offshore is damped, not favorable
        let f = WeatherProcessor::shore_impact_factor(WindCondition::StrongOnshore, 0.0, 180.0);
        assert!((f - 0.45).abs() < 1e-9);
    }

    #[test]
    fn trade_winds_favor_north_shore_over_east() {
        // Persistent ENE trades: onshore for East Shore, side/offshore for others
        let periods = json!([
            { "startTime": "2025-10-07T06:00:00Z", "windSpeed": "12 mph", "windDirection": "ENE",
              "shortForecast": "Mostly Sunny", "temperature": 80, "temperatureUnit": "F" },
            { "startTime": "2025-10-07T18:00:00Z", "windSpeed": "14 mph", "windDirection": "ENE",
              "shortForecast": "Mostly Sunny", "temperature": 78, "temperatureUnit": "F" }
        ]);
        let processed = WeatherProcessor::new().process(nws_doc(periods), Utc::now());
        let east = &processed.shore_impacts["east_shore"];
        assert_eq!(east.unfavorable_periods, 2);
        assert!(east.overall_rating < 0.5);
    }

    #[test]
    fn text_analysis_counts_and_classifies() {
        let periods = json!([
            { "startTime": "2025-10-07T06:00:00Z", "temperature": 80, "temperatureUnit": "F",
              "windSpeed": "5 mph", "windDirection": "N",
              "shortForecast": "Scattered Showers",
              "detailedForecast": "Scattered showers with a 40% chance of rain." },
            { "startTime": "2025-10-07T18:00:00Z", "temperature": 75, "temperatureUnit": "F",
              "windSpeed": "5 mph", "windDirection": "N",
              "shortForecast": "Sunny", "detailedForecast": "Sunny and clear." }
        ]);
        let processed = WeatherProcessor::new().process(nws_doc(periods), Utc::now());
        assert_eq!(processed.mentions.shower, 1);
        assert_eq!(processed.mentions.rain, 1);
        assert_eq!(processed.mentions.sunny, 1);
        assert_eq!(processed.rain_probability.get(&0), Some(&40));
        assert_eq!(processed.weather_types.get(&0), Some(&WeatherType::Rain));
        assert_eq!(processed.weather_types.get(&1), Some(&WeatherType::Sunny));
    }

    #[test]
    fn stale_forecast_warns() {
        let old = (Utc::now() - chrono::Duration::hours(20)).to_rfc3339();
        let periods = json!([
            { "startTime": old, "windSpeed": "5 mph", "windDirection": "N",
              "temperature": 80, "temperatureUnit": "F", "shortForecast": "Sunny" }
        ]);
        let processed = WeatherProcessor::new().process(nws_doc(periods), Utc::now());
        assert_eq!(processed.warnings.len(), 1);
    }
}
