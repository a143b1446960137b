//! Five-factor forecast confidence scoring.
//!
//! `overall = 0.30·consensus + 0.25·reliability + 0.20·completeness +
//! 0.15·horizon + 0.10·accuracy`, with a transparent per-factor breakdown
//! and explicit warnings for every degraded input.

use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::ConfidenceWeights;
use crate::types::{
    ConfidenceCategory, ConfidenceFactors, ConfidenceReport, SwellEvent,
};

/// Source classes expected by the completeness factor.
pub const EXPECTED_SOURCE_CLASSES: [&str; 4] = ["buoys", "models", "charts", "satellite"];

/// Inputs to one confidence computation, assembled by the fusion engine.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceInput<'a> {
    /// All fused swell events
    pub swell_events: &'a [SwellEvent],
    /// Per-source overall reliability scores
    pub source_scores: BTreeMap<String, f64>,
    /// Which of the expected source classes are present
    pub has_buoys: bool,
    pub has_models: bool,
    pub has_charts: bool,
    pub has_satellite: bool,
    /// Recent validation MAE in feet, if the performance store answered
    pub recent_mae_ft: Option<f64>,
}

/// Calculates forecast confidence from data-quality factors.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceScorer {
    weights: ConfidenceWeights,
}

impl ConfidenceScorer {
    pub fn new(weights: ConfidenceWeights) -> Self {
        Self { weights }
    }

    /// Score a fused forecast `days_ahead` days out.
    pub fn calculate(&self, input: &ConfidenceInput<'_>, days_ahead: i64) -> ConfidenceReport {
        let consensus = self.model_consensus(input.swell_events);
        let reliability = self.source_reliability(&input.source_scores);
        let completeness = self.data_completeness(input);
        let horizon = Self::forecast_horizon(days_ahead);
        let accuracy = Self::historical_accuracy(input.recent_mae_ft);

        let overall = consensus * self.weights.model_consensus
            + reliability * self.weights.source_reliability
            + completeness * self.weights.data_completeness
            + horizon * self.weights.forecast_horizon
            + accuracy * self.weights.historical_accuracy;

        let category = ConfidenceCategory::from_score(overall);
        let warnings = self.build_warnings(input, consensus, completeness);

        info!(
            score = format!("{overall:.3}"),
            category = %category,
            consensus = format!("{consensus:.2}"),
            reliability = format!("{reliability:.2}"),
            completeness = format!("{completeness:.2}"),
            horizon = format!("{horizon:.2}"),
            accuracy = format!("{accuracy:.2}"),
            "Confidence calculated"
        );

        ConfidenceReport {
            overall_score: overall,
            category,
            factors: ConfidenceFactors {
                model_consensus: consensus,
                source_reliability: reliability,
                data_completeness: completeness,
                forecast_horizon: horizon,
                historical_accuracy: accuracy,
            },
            breakdown: input.source_scores.clone(),
            warnings,
        }
    }

    /// Model consensus from the coefficient of variation of model-event
    /// heights: `1/(1+CV)`. Fewer than two model events → 0.7 (no
    /// disagreement possible); none → 0.5 (nothing to corroborate).
    fn model_consensus(&self, events: &[SwellEvent]) -> f64 {
        let heights: Vec<f64> = events
            .iter()
            .filter(|e| e.source == "model")
            .filter_map(|e| {
                e.primary_components
                    .iter()
                    .map(|c| c.height)
                    .fold(None, |max: Option<f64>, h| Some(max.map_or(h, |m| m.max(h))))
            })
            .collect();

        if heights.is_empty() {
            return 0.5;
        }
        if heights.len() < 2 {
            return 0.7;
        }

        let mean = heights.iter().mean();
        if mean <= 0.0 {
            return 0.5;
        }
        let cv = heights.iter().std_dev() / mean;
        debug!(models = heights.len(), cv = format!("{cv:.3}"), "Model consensus inputs");
        (1.0 / (1.0 + cv)).clamp(0.0, 1.0)
    }

    /// Arithmetic mean of source overall scores; 0.5 when none exist.
    fn source_reliability(&self, scores: &BTreeMap<String, f64>) -> f64 {
        if scores.is_empty() {
            return 0.5;
        }
        let sum: f64 = scores.values().sum();
        (sum / scores.len() as f64).clamp(0.0, 1.0)
    }

    /// Present source classes / 4.
    fn data_completeness(&self, input: &ConfidenceInput<'_>) -> f64 {
        let present = [
            input.has_buoys,
            input.has_models,
            input.has_charts,
            input.has_satellite,
        ]
        .iter()
        .filter(|p| **p)
        .count();
        present as f64 / EXPECTED_SOURCE_CLASSES.len() as f64
    }

    /// `max(0.5, 1 − 0.1·days_ahead)`.
    fn forecast_horizon(days_ahead: i64) -> f64 {
        (1.0 - days_ahead as f64 * 0.1).max(0.5)
    }

    /// `max(0, 1 − MAE_ft/5)`; 0.7 when no validation data exists.
    fn historical_accuracy(recent_mae_ft: Option<f64>) -> f64 {
        match recent_mae_ft {
            Some(mae) => (1.0 - mae / 5.0).clamp(0.0, 1.0),
            None => 0.7,
        }
    }

    fn build_warnings(
        &self,
        input: &ConfidenceInput<'_>,
        consensus: f64,
        completeness: f64,
    ) -> Vec<String> {
        let mut warnings = Vec::new();

        if completeness < 0.5 {
            warnings.push("limited data".to_string());
        }
        if consensus < 0.5 {
            warnings.push("model disagreement".to_string());
        }

        let missing: Vec<&str> = [
            ("buoys", input.has_buoys),
            ("models", input.has_models),
            ("charts", input.has_charts),
            ("satellite", input.has_satellite),
        ]
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect();
        if !missing.is_empty() {
            warnings.push(format!("missing feeds: {}", missing.join(", ")));
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Metadata, QualityFlag, SwellComponent};

    fn model_event(height: f64) -> SwellEvent {
        SwellEvent {
            event_id: format!("model_{height}"),
            start_time: None,
            peak_time: None,
            end_time: None,
            primary_direction: Some(315.0),
            significance: 0.5,
            hawaii_scale: Some(height * 6.56168),
            source: "model".into(),
            quality_flag: QualityFlag::Valid,
            primary_components: vec![SwellComponent {
                height,
                period: 14.0,
                direction: 315.0,
                confidence: 0.7,
                source: "model".into(),
                quality_flag: QualityFlag::Valid,
            }],
            secondary_components: vec![],
            metadata: Metadata::new(),
        }
    }

    fn full_input(events: &[SwellEvent]) -> ConfidenceInput<'_> {
        let mut source_scores = BTreeMap::new();
        source_scores.insert("51001".to_string(), 0.9);
        source_scores.insert("ww3".to_string(), 0.85);
        ConfidenceInput {
            swell_events: events,
            source_scores,
            has_buoys: true,
            has_models: true,
            has_charts: true,
            has_satellite: true,
            recent_mae_ft: None,
        }
    }

    #[test]
    fn overall_is_exact_weighted_sum() {
        let events = vec![model_event(3.0), model_event(2.5)];
        let input = full_input(&events);
        let report = ConfidenceScorer::default().calculate(&input, 2);

        let f = &report.factors;
        let expected = 0.30 * f.model_consensus
            + 0.25 * f.source_reliability
            + 0.20 * f.data_completeness
            + 0.15 * f.forecast_horizon
            + 0.10 * f.historical_accuracy;
        assert!((report.overall_score - expected).abs() < 1e-9);
    }

    #[test]
    fn category_boundaries_are_monotone() {
        assert_eq!(ConfidenceCategory::from_score(0.7), ConfidenceCategory::High);
        assert_eq!(ConfidenceCategory::from_score(0.4), ConfidenceCategory::Medium);
        assert_eq!(ConfidenceCategory::from_score(0.39), ConfidenceCategory::Low);
    }

    #[test]
    fn agreeing_models_score_high_consensus() {
        let events = vec![model_event(3.0), model_event(2.5)];
        let report = ConfidenceScorer::default().calculate(&full_input(&events), 2);
        assert!(report.factors.model_consensus > 0.8);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn single_model_is_neutral_high() {
        let events = vec![model_event(3.0)];
        let report = ConfidenceScorer::default().calculate(&full_input(&events), 2);
        assert!((report.factors.model_consensus - 0.7).abs() < 1e-9);
    }

    #[test]
    fn missing_feeds_enumerated() {
        let events: Vec<SwellEvent> = vec![];
        let mut input = full_input(&events);
        input.has_charts = false;
        input.has_satellite = false;
        let report = ConfidenceScorer::default().calculate(&input, 2);

        assert!((report.factors.data_completeness - 0.5).abs() < 1e-9);
        assert!(report
            .warnings
            .iter()
            .any(|w| w == "missing feeds: charts, satellite"));
    }

    #[test]
    fn horizon_floors_at_half() {
        let events: Vec<SwellEvent> = vec![];
        let input = full_input(&events);
        let near = ConfidenceScorer::default().calculate(&input, 1);
        let far = ConfidenceScorer::default().calculate(&input, 10);
        assert!((near.factors.forecast_horizon - 0.9).abs() < 1e-9);
        assert!((far.factors.forecast_horizon - 0.5).abs() < 1e-9);
    }

    #[test]
    fn accuracy_from_mae() {
        let events: Vec<SwellEvent> = vec![];
        let mut input = full_input(&events);
        input.recent_mae_ft = Some(1.5);
        let report = ConfidenceScorer::default().calculate(&input, 2);
        assert!((report.factors.historical_accuracy - 0.7).abs() < 1e-9);

        input.recent_mae_ft = None;
        let report = ConfidenceScorer::default().calculate(&input, 2);
        assert!((report.factors.historical_accuracy - 0.7).abs() < 1e-9);

        input.recent_mae_ft = Some(0.5);
        let report = ConfidenceScorer::default().calculate(&input, 2);
        assert!((report.factors.historical_accuracy - 0.9).abs() < 1e-9);
    }
}
