//! Senior forecaster specialist.
//!
//! Synthesizes the buoy and pressure analyst reports into the final
//! forecast: cross-validates their predictions, detects contradictions,
//! scores specialist agreement, builds shore-by-shore forecasts and a
//! merged swell breakdown, then generates the closing narrative.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    parse_period_seconds, BuoyAnalystData, PressureAnalystData, PredictedSwell, SpecialistOutput,
};
use crate::config::LlmConfig;
use crate::error::{EngineError, SpecialistError};
use crate::llm::{generate_with_retry, LlmClient, LlmError, LlmRequest};
use crate::prepare::{Season, SeasonalContext};
use crate::processing::{BuoyTrend, TrendCategory};
use crate::types::{compass_to_degrees, degrees_to_compass, Metadata, SwellEvent};

const CALDWELL_SYSTEM_PROMPT: &str = r#"You are a veteran Hawaii surf forecaster with 40+ years of experience.

Your writing style:
- Technical but accessible (explain the meteorology)
- Specific measurements (cite buoy numbers, pressure values, fetch distances)
- Clear timing (be precise about when swells arrive and peak)
- Honest about uncertainty (when data conflicts, say so)
- Actionable for surfers (what shores to surf when)
- Use technical terms like "fetch window", "low-pressure center", "groundswell", "windswell"

Your credibility comes from:
- Citing actual data (buoy readings, pressure systems with locations)
- Explaining causation (this low at X location generates Y swell because Z fetch)
- Acknowledging when specialists disagree and explaining your reasoning
- Being conservative when confidence is low
- Providing shore-specific detail (N shore exposure to NW swells, shadowing effects, etc)

Format:
1. Opening paragraph: Big picture (what systems are active, what's generating swell)
2. Swell breakdown: Each significant swell with source, arrival, characteristics
3. Shore-by-shore: North, South, East, West with size/conditions/timing
4. Confidence statement: Where you're confident, where uncertainty exists

Write in first person. Use measurements in feet and compass directions."#;

/// Contradiction severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

/// One detected contradiction between specialist reports.
#[derive(Debug, Clone, Serialize)]
pub struct Contradiction {
    pub issue: String,
    pub resolution: String,
    pub impact: Impact,
}

/// Forecast for one shore.
#[derive(Debug, Clone, Serialize)]
pub struct ShoreForecast {
    pub size_range: String,
    pub conditions: String,
    pub timing: String,
    pub confidence: f64,
}

/// One entry of the merged swell breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct SwellBreakdownEntry {
    pub direction: String,
    pub period: String,
    pub height: String,
    pub timing: String,
    pub confidence: f64,
    pub source: String,
    pub has_pressure_support: bool,
    pub has_buoy_confirmation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buoy_height: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buoy_period: Option<String>,
}

/// Cross-validation summary.
#[derive(Debug, Clone, Serialize)]
pub struct Synthesis {
    pub specialist_agreement: f64,
    pub contradictions: Vec<Contradiction>,
    pub key_findings: Vec<String>,
}

/// Structured output of the senior forecaster.
#[derive(Debug, Clone, Serialize)]
pub struct SeniorForecasterData {
    pub synthesis: Synthesis,
    pub shore_forecasts: BTreeMap<String, ShoreForecast>,
    pub swell_breakdown: Vec<SwellBreakdownEntry>,
}

/// Everything the senior consumes.
pub struct SeniorInput {
    pub buoy: Option<SpecialistOutput<BuoyAnalystData>>,
    pub pressure: Option<SpecialistOutput<PressureAnalystData>>,
    /// Quality-filtered fused events, for key findings
    pub swell_events: Vec<SwellEvent>,
    pub seasonal_context: SeasonalContext,
    pub data_digest: String,
    pub forecast_date: String,
    pub valid_period: String,
}

/// A swell relevant to one shore, from either specialist.
#[derive(Debug, Clone)]
struct RelevantSwell {
    from_buoy: bool,
    direction: f64,
    height_m: Option<f64>,
    period_s: Option<f64>,
    trend: Option<TrendCategory>,
    height_str: Option<String>,
    period_str: Option<String>,
    arrival: Option<String>,
    confidence: Option<f64>,
}

/// Senior forecaster configured with the model and confidence gate.
pub struct SeniorForecaster {
    model: String,
    llm: Arc<dyn LlmClient>,
    llm_config: LlmConfig,
    min_specialists_required: usize,
}

impl SeniorForecaster {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        llm_config: LlmConfig,
        min_specialists_required: usize,
    ) -> Self {
        Self {
            model: llm_config.senior_model.clone(),
            llm,
            llm_config,
            min_specialists_required,
        }
    }

    /// Synthesize the specialist reports into the final forecast.
    ///
    /// Fails with `InsufficientSpecialists` when fewer than the required
    /// number of specialists cleared the 0.3 confidence gate.
    pub async fn analyze(
        &self,
        input: SeniorInput,
        now: DateTime<Utc>,
    ) -> Result<SpecialistOutput<SeniorForecasterData>, EngineError> {
        info!("Synthesizing specialist reports");

        let mut specialists_available = Vec::new();
        if input.buoy.as_ref().is_some_and(|b| b.confidence > 0.3) {
            specialists_available.push("buoy");
        }
        if input.pressure.as_ref().is_some_and(|p| p.confidence > 0.3) {
            specialists_available.push("pressure");
        }
        if specialists_available.len() < self.min_specialists_required {
            return Err(EngineError::InsufficientSpecialists {
                required: self.min_specialists_required,
                available: specialists_available.len(),
            });
        }

        let buoy = input.buoy.as_ref();
        let pressure = input.pressure.as_ref();

        let contradictions = self.identify_contradictions(buoy, pressure, now);
        let agreement = self.specialist_agreement(buoy, pressure, now);
        let key_findings = self.key_findings(buoy, pressure, &input.swell_events);
        let shore_forecasts =
            self.shore_forecasts(buoy, pressure, input.seasonal_context.season, now);
        let swell_breakdown = self.swell_breakdown(buoy, pressure);
        let confidence =
            self.synthesis_confidence(agreement, &contradictions, specialists_available.len());

        let narrative = self
            .caldwell_narrative(
                &input,
                &contradictions,
                &key_findings,
                &shore_forecasts,
                &swell_breakdown,
            )
            .await
            .map_err(|e| match e {
                LlmError::Unavailable { message, .. } => EngineError::LlmUnavailable(message),
                other => EngineError::Specialist(SpecialistError::Llm(other)),
            })?;

        info!(
            confidence = format!("{confidence:.3}"),
            specialists = specialists_available.len(),
            contradictions = contradictions.len(),
            "Synthesis complete"
        );

        let mut metadata = Metadata::new();
        metadata.insert("specialists_used".into(), json!(specialists_available));
        metadata.insert("synthesis_method".into(), json!("cross_validation"));
        metadata.insert("model".into(), json!(self.model));
        metadata.insert("timestamp".into(), json!(now.to_rfc3339()));
        metadata.insert("forecast_date".into(), json!(input.forecast_date));
        metadata.insert("valid_period".into(), json!(input.valid_period));

        Ok(SpecialistOutput::new(
            confidence,
            SeniorForecasterData {
                synthesis: Synthesis {
                    specialist_agreement: agreement,
                    contradictions,
                    key_findings,
                },
                shore_forecasts,
                swell_breakdown,
            },
            narrative,
            metadata,
        ))
    }

    // ========================================================================
    // Cross-validation
    // ========================================================================

    fn identify_contradictions(
        &self,
        buoy: Option<&SpecialistOutput<BuoyAnalystData>>,
        pressure: Option<&SpecialistOutput<PressureAnalystData>>,
        now: DateTime<Utc>,
    ) -> Vec<Contradiction> {
        let mut contradictions = Vec::new();
        let (Some(buoy), Some(pressure)) = (buoy, pressure) else {
            return contradictions;
        };

        let trends = &buoy.data.trends;
        let swells = &pressure.data.predicted_swells;
        let systems = &pressure.data.systems;

        // Building buoy signal with no pressure support: likely windswell
        for trend in trends {
            if !trend.height.category.is_building() {
                continue;
            }
            if find_supporting_swell(trend, swells, now).is_some() {
                continue;
            }

            let has_system = trend.direction_current.is_some_and(|direction| {
                systems.iter().any(|system| {
                    system.system_type.as_deref() == Some("low_pressure")
                        && system
                            .fetch
                            .as_ref()
                            .and_then(|f| f.direction.as_deref())
                            .is_some_and(|fetch_dir| {
                                directions_match(&direction.to_string(), fetch_dir, 45.0)
                            })
                })
            });

            if !has_system {
                contradictions.push(Contradiction {
                    issue: format!(
                        "Buoy {} shows {} trend but no supporting pressure system identified",
                        trend.buoy_name, trend.height.category
                    ),
                    resolution: "Likely local windswell or short-period energy, not groundswell from distant storm".into(),
                    impact: Impact::Medium,
                });
            }
        }

        // High-confidence predicted swell with no buoy confirmation
        for swell in swells {
            if swell.confidence.unwrap_or(0.0) <= 0.7 {
                continue;
            }
            if find_confirming_buoy(swell, trends).is_some() {
                continue;
            }
            let future = is_future_arrival(swell, now);
            contradictions.push(Contradiction {
                issue: format!(
                    "Pressure analysis predicts {} swell but buoys show no current signal",
                    swell.direction.as_deref().unwrap_or("unknown")
                ),
                resolution: format!(
                    "Swell arrival expected {}, {}",
                    swell.arrival_time.as_deref().unwrap_or("TBD"),
                    if future {
                        "buoys should show signal later"
                    } else {
                        "may be overestimated"
                    }
                ),
                impact: if future { Impact::Low } else { Impact::High },
            });
        }

        // Direction-matched swell arriving while the buoy fades:
        // fade-then-rebuild pattern
        for swell in swells {
            let Some(swell_dir) = swell.direction.as_deref() else {
                continue;
            };
            for trend in trends {
                let Some(trend_dir) = trend.direction_current else {
                    continue;
                };
                if !directions_match(&trend_dir.to_string(), swell_dir, 30.0) {
                    continue;
                }
                if trend.height.category.is_fading() && is_future_arrival(swell, now) {
                    contradictions.push(Contradiction {
                        issue: format!(
                            "Pressure predicts incoming {swell_dir} swell but {} shows decreasing trend",
                            trend.buoy_name
                        ),
                        resolution: "Current swell likely fades before the new swell arrives and rebuilds, or arrival timing may be later than expected".into(),
                        impact: Impact::Medium,
                    });
                }
            }
        }

        contradictions
    }

    /// Weighted agreement: directional match rate (45°), trend-vs-arrival
    /// alignment, and confidence difference, 0.4/0.4/0.2.
    fn specialist_agreement(
        &self,
        buoy: Option<&SpecialistOutput<BuoyAnalystData>>,
        pressure: Option<&SpecialistOutput<PressureAnalystData>>,
        now: DateTime<Utc>,
    ) -> f64 {
        let (Some(buoy), Some(pressure)) = (buoy, pressure) else {
            return 0.0;
        };

        let mut factors = Vec::new();

        let buoy_directions: Vec<f64> = buoy
            .data
            .trends
            .iter()
            .filter_map(|t| t.direction_current)
            .collect();
        let pressure_directions: Vec<f64> = pressure
            .data
            .predicted_swells
            .iter()
            .filter_map(|s| {
                s.direction_degrees
                    .or_else(|| s.direction.as_deref().and_then(compass_to_degrees))
            })
            .collect();

        if !buoy_directions.is_empty() && !pressure_directions.is_empty() {
            let matches = buoy_directions
                .iter()
                .filter(|&&bd| {
                    pressure_directions.iter().any(|&pd| {
                        let mut diff = (bd - pd).abs();
                        if diff > 180.0 {
                            diff = 360.0 - diff;
                        }
                        diff <= 45.0
                    })
                })
                .count();
            factors.push(matches as f64 / buoy_directions.len() as f64);
        }

        if !buoy.data.trends.is_empty() && !pressure.data.predicted_swells.is_empty() {
            factors.push(trend_alignment(
                &buoy.data.trends,
                &pressure.data.predicted_swells,
                now,
            ));
        }

        let confidence_diff = (buoy.confidence - pressure.confidence).abs();
        factors.push(1.0 - confidence_diff.min(1.0));

        match factors.len() {
            3 => factors[0] * 0.4 + factors[1] * 0.4 + factors[2] * 0.2,
            0 => 0.5,
            n => factors.iter().sum::<f64>() / n as f64,
        }
    }

    /// Strongest buoy trends, top predicted swells, and top detected
    /// events, capped at five findings.
    fn key_findings(
        &self,
        buoy: Option<&SpecialistOutput<BuoyAnalystData>>,
        pressure: Option<&SpecialistOutput<PressureAnalystData>>,
        events: &[SwellEvent],
    ) -> Vec<String> {
        let mut findings = Vec::new();

        if let Some(buoy) = buoy {
            for trend in &buoy.data.trends {
                if trend.height.category.is_building() {
                    findings.push(format!(
                        "{}: {:?}° swell building ({:?}m @ {:?}s)",
                        trend.buoy_name,
                        trend.direction_current.unwrap_or(0.0),
                        trend.height_current,
                        trend.period_current,
                    ));
                }
            }
        }

        if let Some(pressure) = pressure {
            for swell in pressure.data.predicted_swells.iter().take(3) {
                if swell.confidence.unwrap_or(0.0) > 0.6 {
                    findings.push(format!(
                        "Predicted {} swell: {} @ {}, arriving {}",
                        swell.direction.as_deref().unwrap_or("unknown"),
                        swell.estimated_height.as_deref().unwrap_or("N/A"),
                        swell.estimated_period.as_deref().unwrap_or("N/A"),
                        swell.arrival_time.as_deref().unwrap_or("TBD"),
                    ));
                }
            }
        }

        for event in events.iter().take(3) {
            if event
                .metadata
                .get("confidence")
                .and_then(serde_json::Value::as_f64)
                .unwrap_or(0.0)
                > 0.7
            {
                findings.push(format!(
                    "Swell event detected: {} {:.1}ft @ {:.1}s",
                    event.primary_direction_cardinal().unwrap_or("unknown"),
                    event.hawaii_scale.unwrap_or(0.0),
                    event.dominant_period(),
                ));
            }
        }

        findings.truncate(5);
        findings
    }

    // ========================================================================
    // Shore forecasts
    // ========================================================================

    fn shore_forecasts(
        &self,
        buoy: Option<&SpecialistOutput<BuoyAnalystData>>,
        pressure: Option<&SpecialistOutput<PressureAnalystData>>,
        season: Season,
        _now: DateTime<Utc>,
    ) -> BTreeMap<String, ShoreForecast> {
        let shore_exposures: [(&str, [f64; 3], bool); 4] = [
            ("north_shore", [315.0, 0.0, 45.0], season == Season::Winter),
            ("south_shore", [135.0, 180.0, 225.0], season == Season::Summer),
            ("east_shore", [45.0, 90.0, 135.0], false),
            ("west_shore", [225.0, 270.0, 315.0], false),
        ];

        let mut forecasts = BTreeMap::new();
        for (shore, bearings, primary) in shore_exposures {
            let relevant = relevant_swells(&bearings, buoy, pressure);
            let size_range = estimate_size_range(&relevant, primary);
            let conditions = estimate_conditions(&relevant);
            let timing = estimate_timing(&relevant);
            let confidence = shore_confidence(&relevant, buoy, pressure);

            debug!(shore, swells = relevant.len(), size = %size_range, "Shore forecast built");
            forecasts.insert(
                shore.to_string(),
                ShoreForecast {
                    size_range,
                    conditions,
                    timing,
                    confidence: (confidence * 100.0).round() / 100.0,
                },
            );
        }
        forecasts
    }

    // ========================================================================
    // Swell breakdown
    // ========================================================================

    /// Merge pressure-predicted and buoy-observed swells keyed by matched
    /// direction (30° tolerance); entries carry `has_pressure_support` and
    /// `has_buoy_confirmation`. Top five by confidence.
    fn swell_breakdown(
        &self,
        buoy: Option<&SpecialistOutput<BuoyAnalystData>>,
        pressure: Option<&SpecialistOutput<PressureAnalystData>>,
    ) -> Vec<SwellBreakdownEntry> {
        let mut entries: Vec<SwellBreakdownEntry> = Vec::new();

        if let Some(pressure) = pressure {
            for swell in &pressure.data.predicted_swells {
                let Some(direction) = swell.direction.clone() else {
                    continue;
                };
                entries.push(SwellBreakdownEntry {
                    direction,
                    period: swell.estimated_period.clone().unwrap_or_else(|| "N/A".into()),
                    height: swell.estimated_height.clone().unwrap_or_else(|| "N/A".into()),
                    timing: swell.arrival_time.clone().unwrap_or_else(|| "TBD".into()),
                    confidence: swell.confidence.unwrap_or(0.5),
                    source: swell
                        .source_system
                        .clone()
                        .unwrap_or_else(|| "Unknown pressure system".into()),
                    has_pressure_support: true,
                    has_buoy_confirmation: false,
                    buoy_height: None,
                    buoy_period: None,
                });
            }
        }

        if let Some(buoy) = buoy {
            for trend in &buoy.data.trends {
                let Some(direction_deg) = trend.direction_current else {
                    continue;
                };

                let matched = entries.iter_mut().find(|entry| {
                    directions_match(&direction_deg.to_string(), &entry.direction, 30.0)
                });
                match matched {
                    Some(entry) => {
                        entry.has_buoy_confirmation = true;
                        entry.buoy_height = trend.height_current.map(|h| format!("{h}m"));
                        entry.buoy_period = trend.period_current.map(|p| format!("{p}s"));
                    }
                    None => {
                        entries.push(SwellBreakdownEntry {
                            direction: degrees_to_compass(direction_deg).to_string(),
                            period: trend
                                .period_current
                                .map(|p| format!("{p}s"))
                                .unwrap_or_else(|| "N/A".into()),
                            height: trend
                                .height_current
                                .map(|h| format!("{h}m"))
                                .unwrap_or_else(|| "N/A".into()),
                            timing: "Currently observed".into(),
                            confidence: 0.8,
                            source: format!("Observed at {}", trend.buoy_name),
                            has_pressure_support: false,
                            has_buoy_confirmation: true,
                            buoy_height: None,
                            buoy_period: None,
                        });
                    }
                }
            }
        }

        entries.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        entries.truncate(5);
        entries
    }

    /// Agreement minus contradiction penalties (0.15 per high, 0.05 per
    /// medium), with a 10% bonus for three or more specialists.
    fn synthesis_confidence(
        &self,
        agreement: f64,
        contradictions: &[Contradiction],
        specialists: usize,
    ) -> f64 {
        let high = contradictions.iter().filter(|c| c.impact == Impact::High).count() as f64;
        let medium = contradictions.iter().filter(|c| c.impact == Impact::Medium).count() as f64;
        let mut confidence = (agreement - high * 0.15 - medium * 0.05).max(0.0);
        if specialists >= 3 {
            confidence = (confidence * 1.1).min(1.0);
        }
        (confidence * 1000.0).round() / 1000.0
    }

    async fn caldwell_narrative(
        &self,
        input: &SeniorInput,
        contradictions: &[Contradiction],
        key_findings: &[String],
        shore_forecasts: &BTreeMap<String, ShoreForecast>,
        swell_breakdown: &[SwellBreakdownEntry],
    ) -> Result<String, LlmError> {
        let separator = "=".repeat(60);
        let buoy_conf = input.buoy.as_ref().map(|b| b.confidence).unwrap_or(0.0);
        let pressure_conf = input.pressure.as_ref().map(|p| p.confidence).unwrap_or(0.0);

        let contradiction_lines = if contradictions.is_empty() {
            "None".to_string()
        } else {
            contradictions
                .iter()
                .map(|c| format!("- {}: {}", c.issue, c.resolution))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let prompt = format!(
            r#"You are the senior surf forecaster for Hawaii.

FORECAST DATE: {date}
VALID PERIOD: {period}
SEASON: {season}

{digest}

You have received analysis from your specialist team:

{separator}
BUOY ANALYST REPORT (Confidence: {buoy_conf:.2}):
{separator}
{buoy_narrative}

KEY BUOY DATA:
{buoy_data}

{separator}
PRESSURE ANALYST REPORT (Confidence: {pressure_conf:.2}):
{separator}
{pressure_narrative}

KEY PRESSURE DATA:
{pressure_data}

{separator}
CROSS-VALIDATION FINDINGS:
{separator}

KEY FINDINGS:
{findings}

CONTRADICTIONS DETECTED: {n_contradictions}
{contradiction_lines}

SHORE BREAKDOWN:
{shores}

SWELL BREAKDOWN:
{breakdown}

{separator}
YOUR TASK:
{separator}

1. Synthesize these specialist reports into a cohesive {period} forecast
2. Address any contradictions explicitly (e.g., "The buoys show NNE signal but
   the pressure charts don't show supporting fetch - this suggests short-period
   windswell rather than groundswell")
3. Provide shore-by-shore breakdown (North, South, East, West)
4. Include specific timing, sizing, and conditions
5. State confidence levels based on specialist agreement
6. Use your signature technical yet accessible style

Write a 500-800 word forecast in your classic format."#,
            date = input.forecast_date,
            period = input.valid_period,
            season = input.seasonal_context.season.as_str(),
            digest = input.data_digest,
            buoy_narrative = input
                .buoy
                .as_ref()
                .map(|b| b.narrative.as_str())
                .unwrap_or("Not available"),
            buoy_data = input
                .buoy
                .as_ref()
                .map(|b| serde_json::to_string_pretty(&b.data).unwrap_or_default())
                .unwrap_or_else(|| "{}".into()),
            pressure_narrative = input
                .pressure
                .as_ref()
                .map(|p| p.narrative.as_str())
                .unwrap_or("Not available"),
            pressure_data = input
                .pressure
                .as_ref()
                .map(|p| serde_json::to_string_pretty(&p.data).unwrap_or_default())
                .unwrap_or_else(|| "{}".into()),
            findings = key_findings
                .iter()
                .map(|f| format!("- {f}"))
                .collect::<Vec<_>>()
                .join("\n"),
            n_contradictions = contradictions.len(),
            shores = serde_json::to_string_pretty(shore_forecasts).unwrap_or_default(),
            breakdown = serde_json::to_string_pretty(swell_breakdown).unwrap_or_default(),
        );

        let response = generate_with_retry(
            &self.llm,
            LlmRequest::text(&self.model, CALDWELL_SYSTEM_PROMPT.to_string(), prompt),
            self.llm_config.timeout_seconds,
            self.llm_config.max_retries,
            self.llm_config.retry_initial_delay_seconds,
        )
        .await?;
        Ok(response.text)
    }
}

// ============================================================================
// Direction / arrival helpers
// ============================================================================

/// Check whether two direction strings (degrees or 16-point compass) match
/// within a tolerance, handling wrap-around.
pub fn directions_match(dir1: &str, dir2: &str, tolerance: f64) -> bool {
    let (Some(a), Some(b)) = (compass_to_degrees(dir1), compass_to_degrees(dir2)) else {
        return false;
    };
    let mut diff = (a - b).abs();
    if diff > 180.0 {
        diff = 360.0 - diff;
    }
    diff <= tolerance
}

/// Parse a swell arrival string: RFC3339, bare ISO, or an ISO stamp with a
/// time range (`2025-10-07T10:00-12:00Z` → first time).
fn parse_arrival(raw: &str) -> Option<DateTime<Utc>> {
    let clean = raw.trim().trim_end_matches('Z');
    let normalized = match clean.split_once('T') {
        Some((date, time)) if time.contains('-') => {
            let first = time.split('-').next().unwrap_or(time);
            format!("{date}T{first}")
        }
        _ => clean.to_string(),
    };
    crate::types::parse_rfc3339(&normalized)
        .or_else(|| crate::types::parse_rfc3339(&format!("{normalized}:00")))
}

fn is_future_arrival(swell: &PredictedSwell, now: DateTime<Utc>) -> bool {
    swell
        .calculated_arrival
        .as_deref()
        .or(swell.arrival_time.as_deref())
        .and_then(parse_arrival)
        .is_some_and(|arrival| arrival > now)
}

fn is_near_arrival(swell: &PredictedSwell, now: DateTime<Utc>) -> bool {
    swell
        .calculated_arrival
        .as_deref()
        .or(swell.arrival_time.as_deref())
        .and_then(parse_arrival)
        .is_some_and(|arrival| {
            let hours = (arrival - now).num_seconds() as f64 / 3600.0;
            (0.0..=12.0).contains(&hours)
        })
}

/// A predicted swell supporting an observed buoy trend: direction match,
/// already arrived (or imminent), compatible period.
fn find_supporting_swell<'a>(
    trend: &BuoyTrend,
    swells: &'a [PredictedSwell],
    now: DateTime<Utc>,
) -> Option<&'a PredictedSwell> {
    let trend_direction = trend.direction_current?;

    swells.iter().find(|swell| {
        let Some(swell_dir) = swell.direction.as_deref() else {
            return false;
        };
        if !directions_match(&trend_direction.to_string(), swell_dir, 30.0) {
            return false;
        }
        if is_future_arrival(swell, now) && !is_near_arrival(swell, now) {
            return false;
        }
        match (trend.period_current, swell.estimated_period.as_deref()) {
            (Some(observed), Some(predicted)) => periods_compatible(observed, predicted),
            _ => true,
        }
    })
}

/// A buoy trend confirming a predicted swell: direction match with a
/// non-fading height trend.
fn find_confirming_buoy<'a>(
    swell: &PredictedSwell,
    trends: &'a [BuoyTrend],
) -> Option<&'a BuoyTrend> {
    let swell_dir = swell.direction.as_deref()?;
    trends.iter().find(|trend| {
        trend.direction_current.is_some_and(|d| {
            directions_match(&d.to_string(), swell_dir, 30.0) && !trend.height.category.is_fading()
        })
    })
}

/// Observed period within the predicted range ±2 s.
fn periods_compatible(observed: f64, predicted: &str) -> bool {
    let Some(mean) = parse_period_seconds(predicted) else {
        return true;
    };
    let (min, max) = if predicted.contains('-') {
        let parts: Vec<f64> = predicted
            .replace('s', "")
            .split('-')
            .filter_map(|p| p.trim().parse().ok())
            .collect();
        if parts.len() == 2 {
            (parts[0], parts[1])
        } else {
            (mean - 2.0, mean + 2.0)
        }
    } else {
        (mean - 2.0, mean + 2.0)
    };
    (min - 2.0..=max + 2.0).contains(&observed)
}

/// Alignment between building buoy trends and imminent predicted arrivals.
fn trend_alignment(trends: &[BuoyTrend], swells: &[PredictedSwell], now: DateTime<Utc>) -> f64 {
    let mut aligned = 0.0;
    let mut checks = 0.0;

    for trend in trends {
        let Some(direction) = trend.direction_current else {
            continue;
        };
        for swell in swells {
            let Some(swell_dir) = swell.direction.as_deref() else {
                continue;
            };
            if !directions_match(&direction.to_string(), swell_dir, 30.0) {
                continue;
            }
            checks += 1.0;
            if trend.height.category.is_building() {
                if is_near_arrival(swell, now) {
                    aligned += 1.0;
                }
            } else if trend.height.category == TrendCategory::Steady {
                aligned += 0.5;
            }
            // A fading trend against a predicted arrival is a mismatch
        }
    }

    if checks > 0.0 {
        aligned / checks
    } else {
        0.5
    }
}

// ============================================================================
// Shore forecast helpers
// ============================================================================

fn relevant_swells(
    bearings: &[f64],
    buoy: Option<&SpecialistOutput<BuoyAnalystData>>,
    pressure: Option<&SpecialistOutput<PressureAnalystData>>,
) -> Vec<RelevantSwell> {
    let mut relevant = Vec::new();

    if let Some(buoy) = buoy {
        for trend in &buoy.data.trends {
            let Some(direction) = trend.direction_current else {
                continue;
            };
            let exposed = bearings
                .iter()
                .any(|&b| directions_match(&direction.to_string(), &b.to_string(), 60.0));
            if exposed {
                relevant.push(RelevantSwell {
                    from_buoy: true,
                    direction,
                    height_m: trend.height_current,
                    period_s: trend.period_current,
                    trend: Some(trend.height.category),
                    height_str: None,
                    period_str: None,
                    arrival: None,
                    confidence: None,
                });
            }
        }
    }

    if let Some(pressure) = pressure {
        for swell in &pressure.data.predicted_swells {
            let Some(direction) = swell
                .direction_degrees
                .or_else(|| swell.direction.as_deref().and_then(compass_to_degrees))
            else {
                continue;
            };
            let exposed = bearings.iter().any(|&b| {
                let mut diff = (direction - b).abs();
                if diff > 180.0 {
                    diff = 360.0 - diff;
                }
                diff <= 60.0
            });
            if exposed {
                relevant.push(RelevantSwell {
                    from_buoy: false,
                    direction,
                    height_m: None,
                    period_s: None,
                    trend: None,
                    height_str: swell.estimated_height.clone(),
                    period_str: swell.estimated_period.clone(),
                    arrival: swell
                        .calculated_arrival
                        .clone()
                        .or_else(|| swell.arrival_time.clone()),
                    confidence: swell.confidence,
                });
            }
        }
    }

    relevant
}

/// Size range from buoy heights (meters → face feet, ×1.8×3.28) or parsed
/// prediction strings, ±20% around the mean.
fn estimate_size_range(swells: &[RelevantSwell], is_primary_shore: bool) -> String {
    if swells.is_empty() {
        return if is_primary_shore { "2-4ft" } else { "1-2ft" }.to_string();
    }

    let mut heights = Vec::new();
    for swell in swells {
        if let Some(h) = swell.height_m {
            heights.push(h * 1.8 * 3.28);
        } else if let Some(s) = &swell.height_str {
            let values: Vec<f64> = s
                .replace("ft", "")
                .split('-')
                .filter_map(|p| p.trim().parse().ok())
                .collect();
            if !values.is_empty() {
                heights.push(values.iter().sum::<f64>() / values.len() as f64);
            }
        }
    }

    if heights.is_empty() {
        return if is_primary_shore { "2-4ft" } else { "1-3ft" }.to_string();
    }

    let avg = heights.iter().sum::<f64>() / heights.len() as f64;
    let min = ((avg * 0.8) as i64).max(1);
    let max = (avg * 1.2) as i64;
    format!("{min}-{max}ft")
}

/// Conditions from groundswell presence (≥12 s) and direction diversity.
fn estimate_conditions(swells: &[RelevantSwell]) -> String {
    if swells.is_empty() {
        return "small and clean".to_string();
    }

    let has_groundswell = swells.iter().any(|s| {
        s.period_s.is_some_and(|p| p > 12.0)
            || s.period_str
                .as_deref()
                .and_then(parse_period_seconds)
                .is_some_and(|p| p >= 12.0)
    });

    let sectors: std::collections::BTreeSet<i64> = swells
        .iter()
        .map(|s| (s.direction / 45.0) as i64)
        .collect();

    if sectors.len() > 2 {
        "mixed and choppy".to_string()
    } else if has_groundswell {
        "clean".to_string()
    } else {
        "fair to choppy".to_string()
    }
}

fn estimate_timing(swells: &[RelevantSwell]) -> String {
    if swells.is_empty() {
        return "Steady small surf throughout period".to_string();
    }

    let building = swells
        .iter()
        .filter(|s| s.trend.is_some_and(TrendCategory::is_building))
        .count();
    if building > 0 {
        return "Building through the period, peak in 12-24 hours".to_string();
    }

    let arrival = swells
        .iter()
        .filter(|s| s.confidence.unwrap_or(0.0) > 0.6)
        .find_map(|s| s.arrival.as_deref());
    match arrival {
        Some(time) => format!("New swell arriving {time}, building thereafter"),
        None => "Steady through period".to_string(),
    }
}

/// Shore confidence: 0.4·data factor + 0.6·source factor.
fn shore_confidence(
    swells: &[RelevantSwell],
    buoy: Option<&SpecialistOutput<BuoyAnalystData>>,
    pressure: Option<&SpecialistOutput<PressureAnalystData>>,
) -> f64 {
    if swells.is_empty() {
        return 0.5;
    }

    let data_factor = (swells.len() as f64 / 3.0).min(1.0);

    let source_confidences: Vec<f64> = swells
        .iter()
        .filter_map(|s| {
            if s.from_buoy {
                buoy.map(|b| b.confidence)
            } else {
                s.confidence.or(pressure.map(|p| p.confidence))
            }
        })
        .collect();
    let source_factor = if source_confidences.is_empty() {
        0.5
    } else {
        source_confidences.iter().sum::<f64>() / source_confidences.len() as f64
    };

    data_factor * 0.4 + source_factor * 0.6
}
