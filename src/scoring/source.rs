//! Tiered per-source reliability scoring.
//!
//! Every input source gets `overall = 0.4·tier + 0.25·freshness +
//! 0.2·completeness + 0.15·accuracy`, which downstream fusion uses as its
//! weight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{BuoyData, ModelData, Observation, WeatherData};

/// Source reliability tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceTier {
    /// NDBC buoys — direct observations
    Tier1,
    /// NOAA wave models (WW3 / SWAN)
    Tier2,
    /// NWS weather forecasts
    Tier3,
    Unknown,
}

impl SourceTier {
    pub fn score(self) -> f64 {
        match self {
            SourceTier::Tier1 => 1.0,
            SourceTier::Tier2 => 0.9,
            SourceTier::Tier3 => 0.8,
            SourceTier::Unknown => 0.5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SourceTier::Tier1 => "TIER_1",
            SourceTier::Tier2 => "TIER_2",
            SourceTier::Tier3 => "TIER_3",
            SourceTier::Unknown => "UNKNOWN",
        }
    }
}

/// Reliability score for one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceScore {
    pub overall_score: f64,
    pub tier: SourceTier,
    pub tier_score: f64,
    pub freshness_score: f64,
    pub completeness_score: f64,
    pub accuracy_score: f64,
}

/// Scores heterogeneous sources for reliability weighting.
#[derive(Debug, Clone)]
pub struct SourceScorer {
    /// Accuracy baseline; updated from validation performance when available.
    accuracy: f64,
}

impl Default for SourceScorer {
    fn default() -> Self {
        Self { accuracy: 0.7 }
    }
}

impl SourceScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed recent validation accuracy into scoring: `max(0, 1 − MAE_ft/5)`.
    pub fn with_recent_mae(mut self, recent_mae_ft: Option<f64>) -> Self {
        if let Some(mae) = recent_mae_ft {
            self.accuracy = (1.0 - mae / 5.0).clamp(0.0, 1.0);
        }
        self
    }

    fn combine(&self, tier: SourceTier, freshness: f64, completeness: f64) -> SourceScore {
        let tier_score = tier.score();
        let overall = 0.4 * tier_score
            + 0.25 * freshness.clamp(0.0, 1.0)
            + 0.2 * completeness.clamp(0.0, 1.0)
            + 0.15 * self.accuracy;
        SourceScore {
            overall_score: overall,
            tier,
            tier_score,
            freshness_score: freshness.clamp(0.0, 1.0),
            completeness_score: completeness.clamp(0.0, 1.0),
            accuracy_score: self.accuracy,
        }
    }

    /// Freshness: linear decay to zero over 24 hours.
    fn freshness(age_hours: f64) -> f64 {
        (1.0 - age_hours / 24.0).max(0.0)
    }

    /// Score a buoy source from its latest observation.
    pub fn score_buoy(&self, buoy: &BuoyData, now: DateTime<Utc>) -> SourceScore {
        let (freshness, completeness) = match buoy.latest_observation() {
            Some(obs) => {
                let age_hours = (now - obs.timestamp).num_seconds() as f64 / 3600.0;
                (
                    Self::freshness(age_hours),
                    obs.populated_fields() as f64 / Observation::EXPECTED_FIELDS as f64,
                )
            }
            None => (0.0, 0.0),
        };
        self.combine(SourceTier::Tier1, freshness, completeness)
    }

    /// Score a weather source from its first period.
    pub fn score_weather(&self, weather: &WeatherData, now: DateTime<Utc>) -> SourceScore {
        let (freshness, completeness) = match weather.current_period() {
            Some(p) => {
                let age_hours = (now - p.timestamp).num_seconds() as f64 / 3600.0;
                let fields = [
                    p.temperature.is_some(),
                    p.wind_speed.is_some(),
                    p.wind_direction.is_some(),
                    p.short_forecast.is_some(),
                    p.detailed_forecast.is_some(),
                ];
                let populated = fields.iter().filter(|f| **f).count() as f64;
                // Forward-looking periods count as fully fresh
                (Self::freshness(age_hours.max(0.0)), populated / fields.len() as f64)
            }
            None => (0.0, 0.0),
        };
        self.combine(SourceTier::Tier3, freshness, completeness)
    }

    /// Score a wave model source from its run time and point completeness.
    pub fn score_model(&self, model: &ModelData, now: DateTime<Utc>) -> SourceScore {
        let age_hours = (now - model.run_time).num_seconds() as f64 / 3600.0;
        let freshness = Self::freshness(age_hours.max(0.0));

        let (mut populated, mut expected) = (0usize, 0usize);
        for forecast in &model.forecasts {
            for point in &forecast.points {
                expected += 3;
                populated += [point.wave_height, point.wave_period, point.wave_direction]
                    .iter()
                    .filter(|f| f.is_some())
                    .count();
            }
        }
        let completeness = if expected > 0 {
            populated as f64 / expected as f64
        } else {
            0.0
        };
        self.combine(SourceTier::Tier2, freshness, completeness)
    }

    /// Score every source, keyed by its identifier.
    pub fn score_sources(
        &self,
        buoys: &[BuoyData],
        weather: &[WeatherData],
        models: &[ModelData],
        now: DateTime<Utc>,
    ) -> BTreeMap<String, SourceScore> {
        let mut scores = BTreeMap::new();
        for buoy in buoys {
            scores.insert(buoy.station_id.clone(), self.score_buoy(buoy, now));
        }
        for w in weather {
            scores.insert(w.provider.clone(), self.score_weather(w, now));
        }
        for model in models {
            scores.insert(model.model_id.clone(), self.score_model(model, now));
        }
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_rfc3339;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        parse_rfc3339("2025-10-07T12:00:00Z").unwrap()
    }

    fn buoy(obs_time: &str, fields: usize) -> BuoyData {
        let mut row = serde_json::Map::new();
        row.insert("timestamp".into(), json!(obs_time));
        let keys = [
            "wave_height",
            "dominant_period",
            "average_period",
            "wave_direction",
            "wind_speed",
            "wind_direction",
            "air_temperature",
            "water_temperature",
            "pressure",
        ];
        let values = [2.0, 14.0, 9.0, 315.0, 5.0, 60.0, 26.0, 25.0, 1015.0];
        for i in 0..fields {
            row.insert(keys[i].into(), json!(values[i]));
        }
        BuoyData::from_ndbc_json(
            &json!({ "station_id": "51001", "observations": [row] }),
            now(),
        )
    }

    #[test]
    fn fresh_complete_buoy_scores_near_top() {
        let score = SourceScorer::new().score_buoy(&buoy("2025-10-07T12:00:00Z", 9), now());
        assert_eq!(score.tier, SourceTier::Tier1);
        // 0.4*1.0 + 0.25*1.0 + 0.2*1.0 + 0.15*0.7 = 0.955
        assert!((score.overall_score - 0.955).abs() < 1e-9, "got {}", score.overall_score);
    }

    #[test]
    fn freshness_decays_over_24h() {
        let half_day = SourceScorer::new().score_buoy(&buoy("2025-10-07T00:00:00Z", 9), now());
        assert!((half_day.freshness_score - 0.5).abs() < 1e-9);

        let two_days = SourceScorer::new().score_buoy(&buoy("2025-10-05T12:00:00Z", 9), now());
        assert_eq!(two_days.freshness_score, 0.0);
    }

    #[test]
    fn completeness_counts_populated_fields() {
        let score = SourceScorer::new().score_buoy(&buoy("2025-10-07T12:00:00Z", 3), now());
        assert!((score.completeness_score - 3.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn recent_mae_updates_accuracy() {
        let scorer = SourceScorer::new().with_recent_mae(Some(1.0));
        let score = scorer.score_buoy(&buoy("2025-10-07T12:00:00Z", 9), now());
        assert!((score.accuracy_score - 0.8).abs() < 1e-9);

        // MAE beyond 5 ft floors at zero
        let scorer = SourceScorer::new().with_recent_mae(Some(9.0));
        let score = scorer.score_buoy(&buoy("2025-10-07T12:00:00Z", 9), now());
        assert_eq!(score.accuracy_score, 0.0);
    }
}
