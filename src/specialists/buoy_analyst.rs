//! Buoy data analyst specialist.
//!
//! Analyzes buoy observations from multiple stations: trends, Z-score
//! anomalies, per-buoy quality flags, cross-buoy agreement, and an
//! LLM-generated narrative. Quality flags produced here live in the
//! specialist output only and never mutate upstream data.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::{combine_confidence, SpecialistOutput};
use crate::config::LlmConfig;
use crate::error::SpecialistError;
use crate::llm::{generate_with_retry, LlmClient, LlmRequest};
use crate::processing::{
    self, AnomalySeverity, BuoyAnomaly, BuoyTrend, CrossValidation,
};
use crate::types::{BuoyData, BuoyInput, Metadata, QualityFlag};

const SYSTEM_PROMPT: &str = "You are an expert surf forecaster and oceanographer analyzing buoy data.
Your task is to provide a comprehensive analysis of buoy observations, focusing on:
1. Current wave conditions across all buoys
2. Trends in wave height, period, and direction
3. Any anomalies or unusual readings
4. Agreement between buoys and data reliability
5. Implications for surf forecasting

Write a 500-1000 word narrative analysis that is:
- Technical but accessible
- Focused on actionable insights
- Specific about locations and measurements
- Clear about confidence levels and uncertainties";

/// Min/max/mean of height and period across all observations, rounded to
/// two decimals.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SummaryStats {
    pub avg_wave_height: Option<f64>,
    pub max_wave_height: Option<f64>,
    pub min_wave_height: Option<f64>,
    pub avg_period: Option<f64>,
    pub max_period: Option<f64>,
    pub min_period: Option<f64>,
}

/// Structured output of the buoy analyst.
#[derive(Debug, Clone, Serialize)]
pub struct BuoyAnalystData {
    pub trends: Vec<BuoyTrend>,
    pub anomalies: Vec<BuoyAnomaly>,
    pub quality_flags: BTreeMap<String, QualityFlag>,
    pub cross_validation: CrossValidation,
    pub summary_stats: SummaryStats,
}

/// Specialist for analyzing buoy observation data.
pub struct BuoyAnalyst {
    model: String,
    llm: Arc<dyn LlmClient>,
    llm_config: LlmConfig,
}

impl BuoyAnalyst {
    pub fn new(llm: Arc<dyn LlmClient>, llm_config: LlmConfig) -> Self {
        Self {
            model: llm_config.buoy_model.clone(),
            llm,
            llm_config,
        }
    }

    /// Analyze a set of buoy feeds as of `now`.
    pub async fn analyze(
        &self,
        inputs: Vec<BuoyInput>,
        now: DateTime<Utc>,
    ) -> Result<SpecialistOutput<BuoyAnalystData>, SpecialistError> {
        if inputs.is_empty() {
            return Err(SpecialistError::InvalidInput(
                "buoy_data must be a non-empty list".into(),
            ));
        }

        info!(buoys = inputs.len(), "Starting buoy analysis");

        let mut buoys: Vec<BuoyData> = inputs.into_iter().map(|i| i.normalize(now)).collect();
        for buoy in &mut buoys {
            processing::clean_observations(buoy);
        }

        let trends = processing::analyze_trends(&buoys);
        let anomalies = processing::detect_anomalies(&buoys);
        let quality_flags = processing::assign_quality_flags(&buoys, &anomalies, &trends, now);
        let cross_validation = processing::cross_validation(&buoys);
        let summary_stats = summary_stats(&buoys);

        let confidence = self.analysis_confidence(&buoys, &anomalies, &cross_validation);

        let prompt = build_analysis_prompt(&buoys, &trends, &anomalies, &cross_validation, &summary_stats);
        let response = generate_with_retry(
            &self.llm,
            LlmRequest::text(&self.model, SYSTEM_PROMPT.to_string(), prompt),
            self.llm_config.timeout_seconds,
            self.llm_config.max_retries,
            self.llm_config.retry_initial_delay_seconds,
        )
        .await?;

        let total_observations: usize = buoys.iter().map(|b| b.observations.len()).sum();
        info!(
            confidence = format!("{confidence:.2}"),
            observations = total_observations,
            "Buoy analysis complete"
        );

        let mut metadata = Metadata::new();
        metadata.insert("num_buoys".into(), json!(buoys.len()));
        metadata.insert("total_observations".into(), json!(total_observations));
        metadata.insert(
            "analysis_method".into(),
            json!("trend_anomaly_cross_validation"),
        );
        metadata.insert("timestamp".into(), json!(now.to_rfc3339()));

        Ok(SpecialistOutput::new(
            confidence,
            BuoyAnalystData {
                trends,
                anomalies,
                quality_flags,
                cross_validation,
                summary_stats,
            },
            response.text,
            metadata,
        ))
    }

    /// Confidence: 0.5·quality + 0.3·consistency + 0.2·completeness where
    /// quality = 1 − anomalies/buoys, consistency = cross-buoy agreement,
    /// completeness = buoys with data / total.
    fn analysis_confidence(
        &self,
        buoys: &[BuoyData],
        anomalies: &[BuoyAnomaly],
        cross_validation: &CrossValidation,
    ) -> f64 {
        let total = buoys.len().max(1) as f64;
        let with_data = buoys.iter().filter(|b| !b.observations.is_empty()).count() as f64;
        let completeness = with_data / total;
        let consistency = cross_validation.agreement_score;
        let quality = (1.0 - anomalies.len() as f64 / total).max(0.0);
        combine_confidence(completeness, consistency, quality)
    }
}

fn summary_stats(buoys: &[BuoyData]) -> SummaryStats {
    let heights: Vec<f64> = buoys
        .iter()
        .flat_map(|b| b.observations.iter().filter_map(|o| o.wave_height))
        .collect();
    let periods: Vec<f64> = buoys
        .iter()
        .flat_map(|b| b.observations.iter().filter_map(|o| o.dominant_period))
        .collect();

    let round2 = |v: f64| (v * 100.0).round() / 100.0;
    SummaryStats {
        avg_wave_height: (!heights.is_empty()).then(|| round2(heights.iter().mean())),
        max_wave_height: heights.iter().cloned().fold(None, |m, v| Some(m.map_or(v, |m: f64| m.max(v)))).map(round2),
        min_wave_height: heights.iter().cloned().fold(None, |m, v| Some(m.map_or(v, |m: f64| m.min(v)))).map(round2),
        avg_period: (!periods.is_empty()).then(|| round2(periods.iter().mean())),
        max_period: periods.iter().cloned().fold(None, |m, v| Some(m.map_or(v, |m: f64| m.max(v)))).map(round2),
        min_period: periods.iter().cloned().fold(None, |m, v| Some(m.map_or(v, |m: f64| m.min(v)))).map(round2),
    }
}

fn build_analysis_prompt(
    buoys: &[BuoyData],
    trends: &[BuoyTrend],
    anomalies: &[BuoyAnomaly],
    cross_validation: &CrossValidation,
    stats: &SummaryStats,
) -> String {
    let mut prompt = format!(
        "Analyze the following buoy data from {} stations around Oahu:\n\n\
         SUMMARY STATISTICS:\n\
         - Average wave height: {:?}m (range: {:?}-{:?}m)\n\
         - Average period: {:?}s (range: {:?}-{:?}s)\n\n\
         TRENDS DETECTED:\n",
        buoys.len(),
        stats.avg_wave_height,
        stats.min_wave_height,
        stats.max_wave_height,
        stats.avg_period,
        stats.min_period,
        stats.max_period,
    );

    for trend in trends {
        prompt.push_str(&format!(
            "\n{} ({}):\n  - Height: {} (current: {:?}m, slope: {:.4})\n  - Period: {} (current: {:?}s)\n  - Direction: {} (current: {:?}°)\n",
            trend.buoy_name,
            trend.buoy_id,
            trend.height.category,
            trend.height_current,
            trend.height.slope,
            trend.period.category,
            trend.period_current,
            trend.direction.category,
            trend.direction_current,
        ));
    }

    prompt.push_str(&format!("\nANOMALIES DETECTED: {}\n", anomalies.len()));
    for anomaly in anomalies {
        let severity = match anomaly.severity {
            AnomalySeverity::High => "high",
            AnomalySeverity::Moderate => "moderate",
        };
        prompt.push_str(&format!(
            "  - {}: {:?} ({severity}) - {}\n",
            anomaly.buoy_name, anomaly.kind, anomaly.details
        ));
    }

    prompt.push_str(&format!(
        "\nCROSS-BUOY VALIDATION:\n  - Overall agreement: {} ({})\n  - Height agreement: {}\n  - Period agreement: {}\n",
        cross_validation.agreement_score,
        cross_validation.interpretation.as_str(),
        cross_validation.height_agreement,
        cross_validation.period_agreement,
    ));

    prompt.push_str(
        "\nProvide a comprehensive analysis of these observations and their implications for surf forecasting.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::TemplateClient;
    use crate::types::parse_rfc3339;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        parse_rfc3339("2025-10-07T12:00:00Z").unwrap()
    }

    fn analyst() -> BuoyAnalyst {
        BuoyAnalyst::new(Arc::new(TemplateClient), LlmConfig::default())
    }

    fn raw_buoy(id: &str, heights: &[f64]) -> BuoyInput {
        let observations: Vec<serde_json::Value> = heights
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let ts = now() - chrono::Duration::hours((heights.len() - 1 - i) as i64);
                json!({
                    "timestamp": ts.to_rfc3339(),
                    "wave_height": h,
                    "dominant_period": 13.0,
                    "wave_direction": 315.0
                })
            })
            .collect();
        BuoyInput::Raw(json!({ "station_id": id, "observations": observations }))
    }

    #[tokio::test]
    async fn rejects_empty_input() {
        let err = analyst().analyze(vec![], now()).await.unwrap_err();
        assert!(matches!(err, SpecialistError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn clean_data_yields_high_confidence() {
        let output = analyst()
            .analyze(
                vec![
                    raw_buoy("51001", &[2.0, 2.1, 2.2]),
                    raw_buoy("51101", &[2.1, 2.2, 2.3]),
                    raw_buoy("51201", &[1.9, 2.0, 2.1]),
                ],
                now(),
            )
            .await
            .unwrap();

        assert!(output.confidence > 0.8, "got {}", output.confidence);
        assert_eq!(output.data.trends.len(), 3);
        assert!(output.data.anomalies.is_empty());
        assert!(output
            .data
            .quality_flags
            .values()
            .all(|f| *f == QualityFlag::Valid));
        assert!(!output.narrative.is_empty());
        assert!(output.metadata.contains_key("timestamp"));
    }

    #[tokio::test]
    async fn anomalous_buoy_lowers_confidence_and_is_flagged() {
        let buoys = vec![
            raw_buoy("a", &[1.0, 1.0, 1.0]),
            raw_buoy("b", &[1.1, 1.1, 1.1]),
            raw_buoy("c", &[1.2, 1.2, 1.2]),
            raw_buoy("d", &[1.0, 1.0, 1.05]),
            raw_buoy("e", &[1.0, 1.0, 8.0]),
        ];
        let output = analyst().analyze(buoys, now()).await.unwrap();

        assert!(!output.data.anomalies.is_empty());
        assert_eq!(output.data.quality_flags["e"], QualityFlag::Excluded);
        let clean = analyst()
            .analyze(
                vec![
                    raw_buoy("a", &[1.0, 1.0, 1.0]),
                    raw_buoy("b", &[1.1, 1.1, 1.1]),
                    raw_buoy("c", &[1.2, 1.2, 1.2]),
                ],
                now(),
            )
            .await
            .unwrap();
        assert!(output.confidence < clean.confidence);
    }

    #[tokio::test]
    async fn summary_stats_rounded() {
        let output = analyst()
            .analyze(vec![raw_buoy("51001", &[2.004, 2.006])], now())
            .await
            .unwrap();
        let stats = &output.data.summary_stats;
        assert_eq!(stats.min_wave_height, Some(2.0));
        assert_eq!(stats.max_wave_height, Some(2.01));
        assert_eq!(stats.avg_period, Some(13.0));
    }
}
