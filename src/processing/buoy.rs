//! Buoy data processing: cleaning, trend analysis, Z-score anomaly
//! detection, quality-flag assignment, and cross-buoy agreement.
//!
//! The same routines back both the fusion engine's event extraction and the
//! buoy analyst specialist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use super::{TrendCategory, TrendSummary};
use crate::types::{BuoyData, Observation, QualityFlag};

/// Z-score above which an anomaly is moderate.
pub const ANOMALY_THRESHOLD: f64 = 2.0;
/// Z-score above which an anomaly is high severity.
pub const ANOMALY_THRESHOLD_HIGH: f64 = 3.0;

/// Per-buoy trend report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuoyTrend {
    pub buoy_id: String,
    pub buoy_name: String,
    pub height: TrendSummary,
    pub height_current: Option<f64>,
    pub period: TrendSummary,
    pub period_current: Option<f64>,
    pub direction: TrendSummary,
    pub direction_current: Option<f64>,
    pub observations_count: usize,
}

/// Quantity an anomaly was detected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    WaveHeight,
    Period,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Moderate,
    High,
}

/// One Z-score anomaly on a buoy's latest observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuoyAnomaly {
    pub buoy_id: String,
    pub buoy_name: String,
    pub kind: AnomalyKind,
    pub severity: AnomalySeverity,
    pub z_score: f64,
    pub details: String,
}

/// Agreement interpretation bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementLevel {
    ExcellentAgreement,
    GoodAgreement,
    ModerateAgreement,
    PoorAgreement,
    VeryPoorAgreement,
}

impl AgreementLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            AgreementLevel::ExcellentAgreement
        } else if score >= 0.75 {
            AgreementLevel::GoodAgreement
        } else if score >= 0.6 {
            AgreementLevel::ModerateAgreement
        } else if score >= 0.4 {
            AgreementLevel::PoorAgreement
        } else {
            AgreementLevel::VeryPoorAgreement
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgreementLevel::ExcellentAgreement => "excellent_agreement",
            AgreementLevel::GoodAgreement => "good_agreement",
            AgreementLevel::ModerateAgreement => "moderate_agreement",
            AgreementLevel::PoorAgreement => "poor_agreement",
            AgreementLevel::VeryPoorAgreement => "very_poor_agreement",
        }
    }
}

/// Cross-buoy agreement metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidation {
    pub agreement_score: f64,
    pub height_agreement: f64,
    pub period_agreement: f64,
    pub num_buoys_compared: usize,
    pub interpretation: AgreementLevel,
}

/// Result of processing one buoy feed.
#[derive(Debug, Clone)]
pub struct ProcessedBuoy {
    pub data: BuoyData,
    pub trend: Option<BuoyTrend>,
    pub quality_score: f64,
    pub hours_since_update: Option<f64>,
    /// True when >3 h separates consecutive observations
    pub has_gaps: bool,
    pub special_conditions: Vec<String>,
    pub warnings: Vec<String>,
}

/// Processor for buoy feeds: clean → trend → freshness/gap/special-condition
/// analysis. Anomalies and quality flags need the full buoy set and are
/// computed by the free functions below.
#[derive(Debug, Clone, Default)]
pub struct BuoyProcessor;

impl BuoyProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Run the per-buoy pipeline on one feed.
    pub fn process(&self, mut data: BuoyData, now: DateTime<Utc>) -> ProcessedBuoy {
        clean_observations(&mut data);

        let mut warnings = Vec::new();
        let mut quality_score: f64 = 1.0;

        let hours_since_update = data.latest_observation().map(|obs| {
            let hours = (now - obs.timestamp).num_seconds() as f64 / 3600.0;
            if hours > 6.0 {
                warnings.push(format!("Buoy data is {hours:.1} hours old"));
                quality_score -= (hours / 24.0).min(0.5);
            }
            hours
        });

        let has_gaps = has_time_gaps(&data);
        if has_gaps {
            warnings.push("Gaps found in buoy data time series".to_string());
            quality_score -= 0.2;
        }

        let trend = analyze_trends(std::slice::from_ref(&data)).into_iter().next();
        let special_conditions = special_conditions(&data);

        ProcessedBuoy {
            trend,
            quality_score: quality_score.max(0.0),
            hours_since_update,
            has_gaps,
            special_conditions,
            warnings,
            data,
        }
    }
}

/// Drop observations missing both height and period; keep observations
/// sorted newest-first. Individual impossible values were already nulled by
/// bounds validation at ingest.
pub fn clean_observations(data: &mut BuoyData) {
    data.observations
        .retain(|obs| obs.wave_height.is_some() || obs.dominant_period.is_some());
    data.observations
        .sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

fn has_time_gaps(data: &BuoyData) -> bool {
    data.observations.windows(2).any(|w| {
        let gap_hours = (w[0].timestamp - w[1].timestamp).num_seconds() as f64 / 3600.0;
        gap_hours > 3.0
    })
}

fn special_conditions(data: &BuoyData) -> Vec<String> {
    let mut conditions = Vec::new();
    let Some(latest) = data.latest_observation() else {
        return conditions;
    };
    if latest.wave_height.is_some_and(|h| h > 4.0) {
        conditions.push("large_swell".to_string());
    }
    if latest.dominant_period.is_some_and(|p| p > 16.0) {
        conditions.push("long_period_swell".to_string());
    }
    if latest.wind_speed.is_some_and(|w| w > 15.0) && latest.wave_height.is_some_and(|h| h > 3.0) {
        conditions.push("storm_conditions".to_string());
    }
    conditions
}

/// Trend analysis for each buoy with at least two observations. Slopes are
/// computed over chronological values so an increasing category means
/// building seas.
pub fn analyze_trends(buoys: &[BuoyData]) -> Vec<BuoyTrend> {
    let mut trends = Vec::new();

    for buoy in buoys {
        if buoy.observations.len() < 2 {
            continue;
        }

        // Observations are newest-first; collect oldest-first for slopes.
        let chronological: Vec<&Observation> = buoy.observations.iter().rev().collect();
        let heights: Vec<f64> = chronological.iter().filter_map(|o| o.wave_height).collect();
        let periods: Vec<f64> = chronological
            .iter()
            .filter_map(|o| o.dominant_period)
            .collect();
        let directions: Vec<f64> = chronological
            .iter()
            .filter_map(|o| o.wave_direction)
            .collect();

        trends.push(BuoyTrend {
            buoy_id: buoy.station_id.clone(),
            buoy_name: buoy.display_name().to_string(),
            height: TrendSummary::of(&heights),
            height_current: heights.last().copied(),
            period: TrendSummary::of(&periods),
            period_current: periods.last().copied(),
            direction: TrendSummary::of(&directions),
            direction_current: directions.last().copied(),
            observations_count: buoy.observations.len(),
        });
    }

    trends
}

/// Z-score anomaly detection against the pooled height and period
/// populations across all buoys. Needs at least three distinct values per
/// quantity for a meaningful standard deviation.
pub fn detect_anomalies(buoys: &[BuoyData]) -> Vec<BuoyAnomaly> {
    let mut anomalies = Vec::new();

    let all_heights: Vec<f64> = buoys
        .iter()
        .flat_map(|b| b.observations.iter().filter_map(|o| o.wave_height))
        .collect();
    let all_periods: Vec<f64> = buoys
        .iter()
        .flat_map(|b| b.observations.iter().filter_map(|o| o.dominant_period))
        .collect();

    let height_stats = pooled_stats(&all_heights);
    let period_stats = pooled_stats(&all_periods);

    for buoy in buoys {
        let Some(latest) = buoy.latest_observation() else {
            continue;
        };

        if let (Some(height), Some((mean, std))) = (latest.wave_height, height_stats) {
            let z = ((height - mean) / std).abs();
            if z > ANOMALY_THRESHOLD {
                let severity = if z > ANOMALY_THRESHOLD_HIGH {
                    AnomalySeverity::High
                } else {
                    AnomalySeverity::Moderate
                };
                debug!(buoy = %buoy.station_id, z = format!("{z:.2}"), "Wave height anomaly");
                anomalies.push(BuoyAnomaly {
                    buoy_id: buoy.station_id.clone(),
                    buoy_name: buoy.display_name().to_string(),
                    kind: AnomalyKind::WaveHeight,
                    severity,
                    z_score: (z * 100.0).round() / 100.0,
                    details: format!(
                        "Height {height}m is {z:.1} std devs from mean {mean:.2}m"
                    ),
                });
            }
        }

        if let (Some(period), Some((mean, std))) = (latest.dominant_period, period_stats) {
            let z = ((period - mean) / std).abs();
            if z > ANOMALY_THRESHOLD {
                let severity = if z > ANOMALY_THRESHOLD_HIGH {
                    AnomalySeverity::High
                } else {
                    AnomalySeverity::Moderate
                };
                anomalies.push(BuoyAnomaly {
                    buoy_id: buoy.station_id.clone(),
                    buoy_name: buoy.display_name().to_string(),
                    kind: AnomalyKind::Period,
                    severity,
                    z_score: (z * 100.0).round() / 100.0,
                    details: format!(
                        "Period {period}s is {z:.1} std devs from mean {mean:.2}s"
                    ),
                });
            }
        }
    }

    anomalies
}

/// Mean and sample standard deviation, requiring ≥3 distinct values.
fn pooled_stats(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 3 {
        return None;
    }
    let distinct: BTreeSet<u64> = values.iter().map(|v| v.to_bits()).collect();
    if distinct.len() < 3 {
        return None;
    }
    let mean = values.iter().mean();
    let std = values.iter().std_dev();
    if std > 0.0 {
        Some((mean, std))
    } else {
        None
    }
}

/// Assess a buoy's reading quality from the measurement itself, without any
/// staleness rules.
///
/// Excluded: any high-severity anomaly; moderate anomaly on a strongly
/// declining trend; single-scan (≤2 observations) above 2.5 m; height above
/// 10 m.
///
/// Suspect: moderate anomaly otherwise; height >2 m with period <10 s;
/// south swell (135-225°) >2 m with period <13 s.
pub fn assess_reading_quality(
    buoy: &BuoyData,
    anomalies: &[BuoyAnomaly],
    trend: Option<&BuoyTrend>,
) -> QualityFlag {
    let Some(latest) = buoy.latest_observation() else {
        return QualityFlag::Excluded;
    };
    let height = latest.wave_height;
    let period = latest.dominant_period;

    let own_anomalies: Vec<&BuoyAnomaly> = anomalies
        .iter()
        .filter(|a| a.buoy_id == buoy.station_id)
        .collect();
    let has_high = own_anomalies
        .iter()
        .any(|a| a.severity == AnomalySeverity::High);
    let has_moderate = own_anomalies
        .iter()
        .any(|a| a.severity == AnomalySeverity::Moderate);
    let declining = trend.is_some_and(|t| t.height.category.is_fading());

    // Exclusion tier
    if has_high {
        warn!(buoy = %buoy.station_id, "EXCLUDED: high severity anomaly");
        return QualityFlag::Excluded;
    }
    if has_moderate && declining {
        warn!(buoy = %buoy.station_id, "EXCLUDED: moderate anomaly on strongly declining trend");
        return QualityFlag::Excluded;
    }
    if buoy.observations.len() <= 2 && height.is_some_and(|h| h > 2.5) {
        warn!(buoy = %buoy.station_id, "EXCLUDED: single-scan spike");
        return QualityFlag::Excluded;
    }
    if height.is_some_and(|h| h > 10.0) {
        warn!(buoy = %buoy.station_id, "EXCLUDED: unphysical wave height");
        return QualityFlag::Excluded;
    }

    // Suspect tier
    if has_moderate {
        info!(buoy = %buoy.station_id, "SUSPECT: moderate anomaly");
        return QualityFlag::Suspect;
    }
    if height.is_some_and(|h| h > 2.0) && period.is_some_and(|p| p < 10.0) {
        info!(buoy = %buoy.station_id, "SUSPECT: inconsistent period-height pair");
        return QualityFlag::Suspect;
    }
    if latest
        .wave_direction
        .is_some_and(|d| (135.0..=225.0).contains(&d))
        && height.is_some_and(|h| h > 2.0)
        && period.is_some_and(|p| p < 13.0)
    {
        info!(buoy = %buoy.station_id, "SUSPECT: unusual south swell");
        return QualityFlag::Suspect;
    }

    QualityFlag::Valid
}

/// Full quality decision including staleness: data older than 24 h is
/// excluded, older than 6 h suspect. This is the strict table the buoy
/// analyst applies; the fusion engine assesses the reading alone and
/// downgrades stale events to suspect instead, keeping their signal.
pub fn decide_quality_flag(
    buoy: &BuoyData,
    anomalies: &[BuoyAnomaly],
    trend: Option<&BuoyTrend>,
    now: DateTime<Utc>,
) -> QualityFlag {
    let base = assess_reading_quality(buoy, anomalies, trend);
    if base == QualityFlag::Excluded {
        return QualityFlag::Excluded;
    }

    let age_hours = buoy
        .latest_observation()
        .map(|obs| (now - obs.timestamp).num_seconds() as f64 / 3600.0)
        .unwrap_or(f64::INFINITY);
    if age_hours > 24.0 {
        warn!(buoy = %buoy.station_id, age_hours = format!("{age_hours:.1}"), "EXCLUDED: stale data");
        return QualityFlag::Excluded;
    }
    if base == QualityFlag::Suspect {
        return QualityFlag::Suspect;
    }
    if age_hours > 6.0 {
        info!(buoy = %buoy.station_id, age_hours = format!("{age_hours:.1}"), "SUSPECT: aging data");
        return QualityFlag::Suspect;
    }
    QualityFlag::Valid
}

/// Quality flags for all buoys in one pass.
pub fn assign_quality_flags(
    buoys: &[BuoyData],
    anomalies: &[BuoyAnomaly],
    trends: &[BuoyTrend],
    now: DateTime<Utc>,
) -> BTreeMap<String, QualityFlag> {
    buoys
        .iter()
        .map(|buoy| {
            let trend = trends.iter().find(|t| t.buoy_id == buoy.station_id);
            (
                buoy.station_id.clone(),
                decide_quality_flag(buoy, anomalies, trend, now),
            )
        })
        .collect()
}

/// Cross-buoy agreement on latest observations.
///
/// Per quantity: `1 − min(1, σ/μ)`; overall `0.6·height + 0.4·period`.
pub fn cross_validation(buoys: &[BuoyData]) -> CrossValidation {
    let heights: Vec<f64> = buoys
        .iter()
        .filter_map(|b| b.latest_observation().and_then(|o| o.wave_height))
        .collect();
    let periods: Vec<f64> = buoys
        .iter()
        .filter_map(|b| b.latest_observation().and_then(|o| o.dominant_period))
        .collect();

    let agreement = |values: &[f64]| -> f64 {
        if values.len() < 2 {
            return 0.0;
        }
        let mean = values.iter().mean();
        if mean == 0.0 {
            return 0.0;
        }
        let cv = values.iter().std_dev() / mean;
        (1.0 - cv.min(1.0)).max(0.0)
    };

    let height_agreement = agreement(&heights);
    let period_agreement = agreement(&periods);
    let overall = height_agreement * 0.6 + period_agreement * 0.4;

    CrossValidation {
        agreement_score: (overall * 1000.0).round() / 1000.0,
        height_agreement: (height_agreement * 1000.0).round() / 1000.0,
        period_agreement: (period_agreement * 1000.0).round() / 1000.0,
        num_buoys_compared: buoys.len(),
        interpretation: AgreementLevel::from_score(overall),
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

    /// A buoy with evenly spaced hourly observations ending at `now`,
    /// heights listed oldest-first.
    fn buoy_with_heights(id: &str, heights: &[f64]) -> BuoyData {
        let observations: Vec<serde_json::Value> = heights
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let age_hours = (heights.len() - 1 - i) as i64;
                let ts = now() - chrono::Duration::hours(age_hours);
                json!({
                    "timestamp": ts.to_rfc3339(),
                    "wave_height": h,
                    "dominant_period": 12.0,
                    "wave_direction": 315.0
                })
            })
            .collect();
        BuoyData::from_ndbc_json(
            &json!({ "station_id": id, "observations": observations }),
            now(),
        )
    }

    #[test]
    fn clean_drops_empty_observations() {
        let mut data = BuoyData::from_ndbc_json(
            &json!({
                "station_id": "51001",
                "observations": [
                    { "timestamp": "2025-10-07T10:00:00Z", "wave_height": 1.5, "dominant_period": 12.0 },
                    { "timestamp": "2025-10-07T09:00:00Z", "wind_speed": 5.0 }
                ]
            }),
            now(),
        );
        clean_observations(&mut data);
        assert_eq!(data.observations.len(), 1);
    }

    #[test]
    fn trend_detects_building_seas() {
        let buoy = buoy_with_heights("51001", &[1.0, 1.2, 1.4, 1.6]);
        let trend = &analyze_trends(std::slice::from_ref(&buoy))[0];
        assert!((trend.height.slope - 0.2).abs() < 1e-9);
        assert_eq!(trend.height.category, TrendCategory::IncreasingStrong);
        assert_eq!(trend.height_current, Some(1.6));
    }

    #[test]
    fn outlier_buoy_gets_high_z_and_exclusion() {
        let buoys = vec![
            buoy_with_heights("a", &[1.0, 1.0]),
            buoy_with_heights("b", &[1.1, 1.1]),
            buoy_with_heights("c", &[1.2, 1.2]),
            buoy_with_heights("d", &[1.0, 1.0]),
            buoy_with_heights("e", &[1.0, 8.0]),
        ];
        let anomalies = detect_anomalies(&buoys);
        let outlier: Vec<&BuoyAnomaly> = anomalies.iter().filter(|a| a.buoy_id == "e").collect();
        assert!(!outlier.is_empty(), "outlier must be flagged");
        assert!(outlier.iter().any(|a| a.severity == AnomalySeverity::High));

        let trends = analyze_trends(&buoys);
        let flags = assign_quality_flags(&buoys, &anomalies, &trends, now());
        assert_eq!(flags["e"], QualityFlag::Excluded);
        assert_eq!(flags["a"], QualityFlag::Valid);
    }

    #[test]
    fn stale_data_escalates_quality_flag() {
        let mut buoy = buoy_with_heights("51001", &[1.0, 1.1]);
        for obs in &mut buoy.observations {
            obs.timestamp = obs.timestamp - chrono::Duration::hours(8);
        }
        assert_eq!(
            decide_quality_flag(&buoy, &[], None, now()),
            QualityFlag::Suspect
        );

        for obs in &mut buoy.observations {
            obs.timestamp = obs.timestamp - chrono::Duration::hours(20);
        }
        assert_eq!(
            decide_quality_flag(&buoy, &[], None, now()),
            QualityFlag::Excluded
        );
    }

    #[test]
    fn short_period_large_height_is_suspect() {
        let buoy = BuoyData::from_ndbc_json(
            &json!({
                "station_id": "51001",
                "observations": [
                    { "timestamp": now().to_rfc3339(), "wave_height": 2.5, "dominant_period": 8.0, "wave_direction": 315.0 },
                    { "timestamp": (now() - chrono::Duration::hours(1)).to_rfc3339(), "wave_height": 2.4, "dominant_period": 8.0 },
                    { "timestamp": (now() - chrono::Duration::hours(2)).to_rfc3339(), "wave_height": 2.3, "dominant_period": 8.0 }
                ]
            }),
            now(),
        );
        assert_eq!(
            decide_quality_flag(&buoy, &[], None, now()),
            QualityFlag::Suspect
        );
    }

    #[test]
    fn south_swell_plausibility_check() {
        let buoy = BuoyData::from_ndbc_json(
            &json!({
                "station_id": "51002",
                "observations": [
                    { "timestamp": now().to_rfc3339(), "wave_height": 2.2, "dominant_period": 11.0, "wave_direction": 180.0 },
                    { "timestamp": (now() - chrono::Duration::hours(1)).to_rfc3339(), "wave_height": 2.1, "dominant_period": 11.0 },
                    { "timestamp": (now() - chrono::Duration::hours(2)).to_rfc3339(), "wave_height": 2.0, "dominant_period": 11.0 }
                ]
            }),
            now(),
        );
        assert_eq!(
            decide_quality_flag(&buoy, &[], None, now()),
            QualityFlag::Suspect
        );
    }

    #[test]
    fn agreement_bands() {
        // Identical buoys agree perfectly
        let identical = vec![
            buoy_with_heights("a", &[2.0, 2.0]),
            buoy_with_heights("b", &[2.0, 2.0]),
        ];
        let cv = cross_validation(&identical);
        assert!((cv.agreement_score - 1.0).abs() < 1e-9);
        assert_eq!(cv.interpretation, AgreementLevel::ExcellentAgreement);

        // Wildly different heights disagree
        let split = vec![
            buoy_with_heights("a", &[0.5, 0.5]),
            buoy_with_heights("b", &[6.0, 6.0]),
        ];
        let cv = cross_validation(&split);
        assert!(cv.agreement_score < 0.5);
    }

    #[test]
    fn processor_flags_staleness_and_gaps() {
        let data = BuoyData::from_ndbc_json(
            &json!({
                "station_id": "51001",
                "observations": [
                    { "timestamp": (now() - chrono::Duration::hours(7)).to_rfc3339(), "wave_height": 1.5, "dominant_period": 12.0 },
                    { "timestamp": (now() - chrono::Duration::hours(12)).to_rfc3339(), "wave_height": 1.4, "dominant_period": 12.0 }
                ]
            }),
            now(),
        );
        let processed = BuoyProcessor::new().process(data, now());
        assert!(processed.hours_since_update.unwrap() > 6.0);
        assert!(processed.has_gaps);
        assert!(processed.quality_score < 1.0);
        assert_eq!(processed.warnings.len(), 2);
    }

    #[test]
    fn large_long_period_swell_flagged_special() {
        let data = BuoyData::from_ndbc_json(
            &json!({
                "station_id": "51001",
                "observations": [
                    { "timestamp": now().to_rfc3339(), "wave_height": 4.5, "dominant_period": 17.0 }
                ]
            }),
            now(),
        );
        let processed = BuoyProcessor::new().process(data, now());
        assert!(processed.special_conditions.contains(&"large_swell".to_string()));
        assert!(processed
            .special_conditions
            .contains(&"long_period_swell".to_string()));
    }
}
