//! Pressure chart analyst specialist.
//!
//! Feeds pressure-chart images to the vision LLM with a JSON-only prompt,
//! parses the identified systems/fetches/predicted swells, and enhances
//! each prediction with physics-based arrival timing from deep-water group
//! velocity. Malformed vision output degrades to empty structured data; the
//! narrative is still attempted.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{combine_confidence, SpecialistOutput};
use crate::config::LlmConfig;
use crate::error::SpecialistError;
use crate::llm::{generate_with_retry, ImageAttachment, ImageDetail, LlmClient, LlmRequest};
use crate::physics::SwellPropagationCalculator;
use crate::types::{parse_rfc3339, Metadata};

const VISION_SYSTEM_PROMPT: &str = "You are an expert surf forecaster and meteorologist analyzing pressure charts.

Your task: Analyze these pressure charts in temporal sequence and identify:
1. Low-pressure systems (storms) - location, intensity, movement
2. High-pressure systems (ridges) - blocking patterns, stability
3. Fetch windows - areas where winds blow consistently over long distances toward Hawaii
4. Swell generation potential - from each low-pressure system
5. Predicted swell arrival timing at the Hawaiian Islands (21.5N, 158W)

Focus on North Pacific systems that can generate surf for Hawaii.
Return structured data in JSON format with NO markdown formatting or code blocks.";

const NARRATIVE_SYSTEM_PROMPT: &str = "You are an expert surf forecaster analyzing pressure patterns.
Your task is to provide a comprehensive narrative analysis focusing on:
1. Current pressure systems and their characteristics
2. Fetch windows and swell generation potential
3. Predicted swell arrivals at Hawaii with timing and characteristics
4. Frontal boundaries and their impact on local conditions
5. Confidence levels and uncertainties

Write a 500-1000 word narrative that is:
- Technical but accessible to experienced surfers
- Specific about locations, timing, and measurements
- Clear about confidence and uncertainty
- Actionable for surf forecast decisions";

/// Fetch window of a weather system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchWindow {
    pub direction: Option<String>,
    pub distance_nm: Option<f64>,
    pub duration_hrs: Option<f64>,
    pub fetch_length_nm: Option<f64>,
    pub quality: Option<String>,
}

/// One pressure system identified on the charts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherSystem {
    #[serde(rename = "type")]
    pub system_type: Option<String>,
    pub location: Option<String>,
    pub location_lat: Option<f64>,
    pub location_lon: Option<f64>,
    pub pressure_mb: Option<f64>,
    pub wind_speed_kt: Option<f64>,
    pub movement: Option<String>,
    pub intensification: Option<String>,
    pub generation_time: Option<String>,
    pub fetch: Option<FetchWindow>,
}

/// One predicted swell, as reported by the vision model and enhanced with
/// physics-based propagation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictedSwell {
    pub source_system: Option<String>,
    pub source_lat: Option<f64>,
    pub source_lon: Option<f64>,
    pub direction: Option<String>,
    pub direction_degrees: Option<f64>,
    pub arrival_time: Option<String>,
    pub estimated_height: Option<String>,
    pub estimated_period: Option<String>,
    pub confidence: Option<f64>,

    // Physics enhancement (absent until computed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_arrival: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculated_arrival: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub travel_time_hrs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_nm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_velocity_knots: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_duration_hrs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_pressure_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_wind_speed_kt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_trend: Option<String>,
}

/// A frontal boundary noted on the charts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontalBoundary {
    #[serde(rename = "type")]
    pub front_type: Option<String>,
    pub location: Option<String>,
    pub timing: Option<String>,
}

/// Aggregate counts for the prompt and consumers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisSummary {
    pub num_low_pressure: usize,
    pub num_high_pressure: usize,
    pub num_predicted_swells: usize,
    pub region: String,
}

/// Structured output of the pressure analyst.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PressureAnalystData {
    pub systems: Vec<WeatherSystem>,
    pub predicted_swells: Vec<PredictedSwell>,
    pub frontal_boundaries: Vec<FrontalBoundary>,
    pub analysis_summary: AnalysisSummary,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VisionPayload {
    systems: Vec<WeatherSystem>,
    predicted_swells: Vec<PredictedSwell>,
    frontal_boundaries: Vec<FrontalBoundary>,
}

/// Input to one pressure-chart analysis.
#[derive(Debug, Clone)]
pub struct ChartInput {
    /// Image paths in temporal order
    pub images: Vec<PathBuf>,
    /// Chart valid times matching `images`
    pub chart_times: Vec<DateTime<Utc>>,
    pub region: String,
}

/// Specialist for analyzing pressure chart images.
pub struct PressureAnalyst {
    model: String,
    llm: Arc<dyn LlmClient>,
    llm_config: LlmConfig,
    propagation: SwellPropagationCalculator,
}

impl PressureAnalyst {
    pub fn new(llm: Arc<dyn LlmClient>, llm_config: LlmConfig) -> Self {
        Self {
            model: llm_config.pressure_model.clone(),
            llm,
            llm_config,
            propagation: SwellPropagationCalculator::new(),
        }
    }

    /// Analyze a temporal sequence of pressure charts as of `now`.
    pub async fn analyze(
        &self,
        input: ChartInput,
        now: DateTime<Utc>,
    ) -> Result<SpecialistOutput<PressureAnalystData>, SpecialistError> {
        if input.images.is_empty() {
            return Err(SpecialistError::InvalidInput(
                "images must be a non-empty list".into(),
            ));
        }

        info!(
            images = input.images.len(),
            region = %input.region,
            "Starting pressure chart analysis"
        );

        let valid_images = validate_image_paths(&input.images);
        if valid_images.is_empty() {
            return Err(SpecialistError::NoValidImages(input.images.len()));
        }

        let payload = self
            .analyze_with_vision(&valid_images, &input.chart_times, &input.region)
            .await?;

        let enhanced =
            self.enhance_swell_predictions(payload.predicted_swells, &payload.systems, now);

        let confidence = self.analysis_confidence(
            valid_images.len(),
            &payload.systems,
            &enhanced,
            &input.chart_times,
        );

        let data = PressureAnalystData {
            analysis_summary: AnalysisSummary {
                num_low_pressure: payload
                    .systems
                    .iter()
                    .filter(|s| s.system_type.as_deref() == Some("low_pressure"))
                    .count(),
                num_high_pressure: payload
                    .systems
                    .iter()
                    .filter(|s| s.system_type.as_deref() == Some("high_pressure"))
                    .count(),
                num_predicted_swells: enhanced.len(),
                region: input.region.clone(),
            },
            systems: payload.systems,
            predicted_swells: enhanced,
            frontal_boundaries: payload.frontal_boundaries,
        };

        let narrative_prompt = build_narrative_prompt(&data, &input.region);
        let narrative = generate_with_retry(
            &self.llm,
            LlmRequest::text(
                &self.model,
                NARRATIVE_SYSTEM_PROMPT.to_string(),
                narrative_prompt,
            ),
            self.llm_config.timeout_seconds,
            self.llm_config.max_retries,
            self.llm_config.retry_initial_delay_seconds,
        )
        .await?
        .text;

        info!(
            confidence = format!("{confidence:.2}"),
            images = valid_images.len(),
            "Pressure analysis complete"
        );

        let mut metadata = Metadata::new();
        metadata.insert("num_images".into(), json!(valid_images.len()));
        metadata.insert("analysis_method".into(), json!("vision_llm"));
        metadata.insert("model".into(), json!(self.model));
        metadata.insert("region".into(), json!(input.region));
        metadata.insert("timestamp".into(), json!(now.to_rfc3339()));
        metadata.insert(
            "chart_times".into(),
            json!(input
                .chart_times
                .iter()
                .map(|t| t.to_rfc3339())
                .collect::<Vec<_>>()),
        );

        Ok(SpecialistOutput::new(confidence, data, narrative, metadata))
    }

    async fn analyze_with_vision(
        &self,
        images: &[PathBuf],
        chart_times: &[DateTime<Utc>],
        region: &str,
    ) -> Result<VisionPayload, SpecialistError> {
        let user_prompt = build_vision_prompt(images.len(), chart_times, region);
        let attachments: Vec<ImageAttachment> = images
            .iter()
            .map(|path| ImageAttachment {
                path: path.clone(),
                detail: ImageDetail::High,
            })
            .collect();

        let response = generate_with_retry(
            &self.llm,
            LlmRequest {
                model: self.model.clone(),
                system_prompt: VISION_SYSTEM_PROMPT.to_string(),
                user_prompt,
                images: attachments,
            },
            self.llm_config.timeout_seconds,
            self.llm_config.max_retries,
            self.llm_config.retry_initial_delay_seconds,
        )
        .await?;

        let content = strip_markdown_fences(&response.text);
        match serde_json::from_str::<VisionPayload>(content) {
            Ok(payload) => {
                info!(
                    systems = payload.systems.len(),
                    swells = payload.predicted_swells.len(),
                    "Parsed vision response"
                );
                Ok(payload)
            }
            Err(e) => {
                // Malformed JSON is non-fatal: continue with empty
                // structured data, narrative still attempted.
                warn!(error = %e, "Failed to parse vision JSON, using empty structured data");
                Ok(VisionPayload::default())
            }
        }
    }

    /// Overwrite LLM arrival estimates with physics-based calculations when
    /// source coordinates and a period are available; the original estimate
    /// is preserved as `llm_arrival`.
    fn enhance_swell_predictions(
        &self,
        swells: Vec<PredictedSwell>,
        systems: &[WeatherSystem],
        now: DateTime<Utc>,
    ) -> Vec<PredictedSwell> {
        swells
            .into_iter()
            .map(|mut swell| {
                let source_system = find_source_system(&swell, systems);

                let source_lat = swell
                    .source_lat
                    .or_else(|| source_system.and_then(|s| s.location_lat));
                let source_lon = swell
                    .source_lon
                    .or_else(|| source_system.and_then(|s| s.location_lon));

                if let (Some(lat), Some(lon)) = (source_lat, source_lon) {
                    let period = swell
                        .estimated_period
                        .as_deref()
                        .and_then(parse_period_seconds)
                        .unwrap_or(14.0);

                    let generation_time = source_system
                        .and_then(|s| s.generation_time.as_deref())
                        .and_then(parse_rfc3339)
                        .unwrap_or(now);

                    let (arrival, details) =
                        self.propagation
                            .calculate_arrival(lat, lon, period, generation_time);

                    swell.llm_arrival = swell.arrival_time.clone();
                    swell.arrival_time = Some(arrival.to_rfc3339());
                    swell.calculated_arrival = Some(arrival.to_rfc3339());
                    swell.travel_time_hrs =
                        Some((details.travel_time_hours * 10.0).round() / 10.0);
                    swell.distance_nm = Some(details.distance_nm.round());
                    swell.group_velocity_knots =
                        Some((details.group_velocity_knots * 10.0).round() / 10.0);
                    swell.propagation_method = Some("physics_based".to_string());

                    info!(
                        lat,
                        lon,
                        period,
                        travel_hrs = format!("{:.1}", details.travel_time_hours),
                        "Calculated physics-based swell arrival"
                    );
                } else {
                    debug!("No source coordinates for swell; keeping LLM arrival estimate");
                }

                if let Some(system) = source_system {
                    if let Some(fetch) = &system.fetch {
                        swell.fetch_quality = fetch.quality.clone();
                        swell.fetch_duration_hrs = fetch.duration_hrs;
                    }
                    swell.source_pressure_mb = system.pressure_mb;
                    swell.source_wind_speed_kt = system.wind_speed_kt;
                    swell.source_trend = system.intensification.clone();
                }

                swell
            })
            .collect()
    }

    /// Confidence: completeness from image count (≥6 → 1.0, ≥4 → 0.8,
    /// ≥2 → 0.6, else 0.4); consistency from fetch quality; quality from
    /// swell confidences, with a 10% bonus when the chart span covers 24 h.
    fn analysis_confidence(
        &self,
        num_images: usize,
        systems: &[WeatherSystem],
        swells: &[PredictedSwell],
        chart_times: &[DateTime<Utc>],
    ) -> f64 {
        let completeness = if num_images >= 6 {
            1.0
        } else if num_images >= 4 {
            0.8
        } else if num_images >= 2 {
            0.6
        } else {
            0.4
        };

        let fetch_scores: Vec<f64> = systems
            .iter()
            .filter_map(|s| s.fetch.as_ref())
            .filter_map(|f| f.quality.as_deref())
            .map(|q| match q {
                "strong" => 1.0,
                "moderate" => 0.7,
                _ => 0.4,
            })
            .collect();
        let consistency = if systems.is_empty() {
            0.3
        } else if fetch_scores.is_empty() {
            0.5
        } else {
            fetch_scores.iter().sum::<f64>() / fetch_scores.len() as f64
        };

        let mut quality = if swells.is_empty() {
            0.4
        } else {
            swells
                .iter()
                .map(|s| s.confidence.unwrap_or(0.5))
                .sum::<f64>()
                / swells.len() as f64
        };

        if chart_times.len() >= 2 {
            let min = chart_times.iter().min().unwrap();
            let max = chart_times.iter().max().unwrap();
            let span_hrs = (*max - *min).num_seconds() as f64 / 3600.0;
            if span_hrs >= 24.0 {
                quality = (quality * 1.1).min(1.0);
            }
        }

        combine_confidence(completeness, consistency, quality)
    }
}

/// Keep only existing files with a known raster extension.
fn validate_image_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .filter(|path| {
            let ok_ext = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| {
                    matches!(
                        e.to_ascii_lowercase().as_str(),
                        "png" | "jpg" | "jpeg" | "gif" | "webp"
                    )
                });
            if !ok_ext {
                warn!(path = %path.display(), "Skipping non-image file");
                return false;
            }
            if !path.is_file() {
                warn!(path = %path.display(), "Image file not found");
                return false;
            }
            true
        })
        .cloned()
        .collect()
}

/// Strip ``` fences (with an optional `json` tag) from model output.
fn strip_markdown_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}

/// Parse an estimated-period string like `"13-15s"` or `"14s"` into the
/// mean period in seconds.
pub fn parse_period_seconds(raw: &str) -> Option<f64> {
    let re = Regex::new(r"(\d+(?:\.\d+)?)").ok()?;
    let values: Vec<f64> = re
        .find_iter(raw)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Match a predicted swell back to its source system by identifier or
/// location fragments.
fn find_source_system<'a>(
    swell: &PredictedSwell,
    systems: &'a [WeatherSystem],
) -> Option<&'a WeatherSystem> {
    let source_id = swell.source_system.as_deref()?.to_lowercase();
    systems.iter().find(|system| {
        let system_type = system.system_type.as_deref().unwrap_or("").to_lowercase();
        let system_loc = system
            .location
            .as_deref()
            .unwrap_or("")
            .to_lowercase()
            .replace(' ', "_");
        let system_id = format!("{system_type}_{system_loc}");
        source_id.contains(&system_id)
            || system_id.contains(&source_id)
            || (!system_loc.is_empty()
                && (source_id.contains(&system_loc) || system_loc.contains(&source_id)))
    })
}

fn build_vision_prompt(num_images: usize, chart_times: &[DateTime<Utc>], region: &str) -> String {
    let mut prompt = format!(
        r#"Analyze these {num_images} pressure charts from the {region} and provide:

1. SYSTEMS: List all significant low/high pressure systems
   Format for each system:
   {{
       "type": "low_pressure" or "high_pressure",
       "location": "45N 160W" (latitude/longitude as string),
       "location_lat": 45.0 (numeric latitude),
       "location_lon": -160.0 (numeric longitude - positive East, negative West),
       "pressure_mb": 990 (pressure in millibars),
       "wind_speed_kt": 50 (wind speed in knots if visible),
       "movement": "SE at 25kt" (direction and speed),
       "intensification": "strengthening", "weakening", or "steady",
       "generation_time": "2025-10-08T12:00:00Z" (when the storm generated swell - use chart timestamp as reference),
       "fetch": {{
           "direction": "NNE" (relative to Hawaii at 21.5N 158W),
           "distance_nm": 800 (nautical miles),
           "duration_hrs": 36 (hours of sustained winds),
           "fetch_length_nm": 500 (length of fetch in nautical miles),
           "quality": "strong", "moderate", or "weak"
       }}
   }}

2. SWELL PREDICTIONS: For each potential swell
   Format:
   {{
       "source_system": "low_45n_160w" (identifier),
       "source_lat": 45.0,
       "source_lon": -160.0,
       "direction": "NNE" (arrival direction at Hawaii),
       "direction_degrees": 22 (numeric direction in degrees, 0=N, 90=E, 180=S, 270=W),
       "arrival_time": "2025-10-09T18:00:00Z" (estimated arrival),
       "estimated_height": "7-9ft" (wave height range),
       "estimated_period": "13-15s" (period range),
       "confidence": 0.75 (0.0-1.0)
   }}

3. FRONTAL BOUNDARIES: Any significant fronts
   Format:
   {{
       "type": "cold_front" or "warm_front",
       "location": "approaching from NW",
       "timing": "2025-10-07T18:00:00Z"
   }}"#
    );

    if !chart_times.is_empty() {
        let times: Vec<String> = chart_times.iter().map(|t| t.to_rfc3339()).collect();
        prompt.push_str(&format!("\n\nChart timestamps: {}", times.join(", ")));
    }

    prompt.push_str(
        "\n\nReturn ONLY valid JSON with no markdown formatting. Use this exact structure:\n{\n  \"systems\": [...],\n  \"predicted_swells\": [...],\n  \"frontal_boundaries\": [...]\n}",
    );
    prompt
}

fn build_narrative_prompt(data: &PressureAnalystData, region: &str) -> String {
    let summary = &data.analysis_summary;
    let mut prompt = format!(
        "Provide a comprehensive narrative analysis of pressure patterns in the {region}.\n\n\
         SYSTEMS DETECTED: {} low pressure, {} high pressure\n\n",
        summary.num_low_pressure, summary.num_high_pressure
    );

    if !data.systems.is_empty() {
        prompt.push_str("DETAILED SYSTEMS:\n");
        for system in &data.systems {
            prompt.push_str(&format!(
                "\n{}:\n  - Location: {}\n  - Pressure: {} mb\n  - Movement: {}\n  - Trend: {}\n",
                system
                    .system_type
                    .as_deref()
                    .unwrap_or("unknown")
                    .replace('_', " "),
                system.location.as_deref().unwrap_or("unknown"),
                system
                    .pressure_mb
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "N/A".into()),
                system.movement.as_deref().unwrap_or("unknown"),
                system.intensification.as_deref().unwrap_or("unknown"),
            ));
            if let Some(fetch) = &system.fetch {
                prompt.push_str(&format!(
                    "  - Fetch: {} direction, {} nm, {} hrs, {} quality\n",
                    fetch.direction.as_deref().unwrap_or("unknown"),
                    fetch
                        .distance_nm
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "N/A".into()),
                    fetch
                        .duration_hrs
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "N/A".into()),
                    fetch.quality.as_deref().unwrap_or("unknown"),
                ));
            }
        }
    }

    prompt.push_str(&format!("\nPREDICTED SWELLS: {}\n", data.predicted_swells.len()));
    for swell in &data.predicted_swells {
        prompt.push_str(&format!(
            "\nFrom {}:\n  - Direction: {}\n  - Arrival: {}\n  - Height: {}\n  - Period: {}\n  - Confidence: {:?}\n",
            swell.source_system.as_deref().unwrap_or("unknown"),
            swell.direction.as_deref().unwrap_or("unknown"),
            swell.arrival_time.as_deref().unwrap_or("TBD"),
            swell.estimated_height.as_deref().unwrap_or("N/A"),
            swell.estimated_period.as_deref().unwrap_or("N/A"),
            swell.confidence,
        ));
        if let Some(travel) = swell.travel_time_hrs {
            prompt.push_str(&format!("  - Travel time: {travel} hours\n"));
        }
        if let Some(quality) = &swell.fetch_quality {
            prompt.push_str(&format!("  - Fetch quality: {quality}\n"));
        }
    }

    if !data.frontal_boundaries.is_empty() {
        prompt.push_str(&format!("\nFRONTAL BOUNDARIES: {}\n", data.frontal_boundaries.len()));
        for front in &data.frontal_boundaries {
            prompt.push_str(&format!(
                "  - {}: {}, timing: {}\n",
                front.front_type.as_deref().unwrap_or("unknown").replace('_', " "),
                front.location.as_deref().unwrap_or("unknown"),
                front.timing.as_deref().unwrap_or("TBD"),
            ));
        }
    }

    prompt.push_str("\nProvide a comprehensive analysis integrating all this information.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, LlmResponse, TokenUsage};
    use async_trait::async_trait;

    /// Vision client scripted to return a fixed payload for the JSON call
    /// and a plain narrative otherwise.
    struct ScriptedVision {
        payload: String,
    }

    #[async_trait]
    impl LlmClient for ScriptedVision {
        async fn generate_text(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
            let text = if request.user_prompt.contains("Return ONLY valid JSON") {
                self.payload.clone()
            } else {
                "Pressure narrative.".to_string()
            };
            Ok(LlmResponse {
                text,
                usage: TokenUsage::default(),
            })
        }
    }

    fn chart_input(dir: &tempfile::TempDir, count: usize) -> ChartInput {
        let images: Vec<PathBuf> = (0..count)
            .map(|i| {
                let path = dir.path().join(format!("chart_{i}.png"));
                std::fs::write(&path, b"png").unwrap();
                path
            })
            .collect();
        let base = parse_rfc3339("2025-10-07T00:00:00Z").unwrap();
        let chart_times = (0..count)
            .map(|i| base + chrono::Duration::hours(12 * i as i64))
            .collect();
        ChartInput {
            images,
            chart_times,
            region: "North Pacific".into(),
        }
    }

    fn storm_payload() -> String {
        json!({
            "systems": [{
                "type": "low_pressure",
                "location": "45N 160W",
                "location_lat": 45.0,
                "location_lon": -160.0,
                "pressure_mb": 985,
                "wind_speed_kt": 50,
                "movement": "E at 25kt",
                "intensification": "steady",
                "generation_time": "2025-10-07T00:00:00Z",
                "fetch": {
                    "direction": "NNE",
                    "distance_nm": 800,
                    "duration_hrs": 36,
                    "fetch_length_nm": 500,
                    "quality": "strong"
                }
            }],
            "predicted_swells": [{
                "source_system": "low_45n_160w",
                "source_lat": 45.0,
                "source_lon": -160.0,
                "direction": "NNE",
                "direction_degrees": 22,
                "arrival_time": "2025-10-09T12:00:00Z",
                "estimated_height": "7-9ft",
                "estimated_period": "13-15s",
                "confidence": 0.8
            }],
            "frontal_boundaries": []
        })
        .to_string()
    }

    fn analyst(payload: String) -> PressureAnalyst {
        PressureAnalyst::new(Arc::new(ScriptedVision { payload }), LlmConfig::default())
    }

    fn now() -> DateTime<Utc> {
        parse_rfc3339("2025-10-07T06:00:00Z").unwrap()
    }

    #[tokio::test]
    async fn storm_arrival_physics_enhancement() {
        let dir = tempfile::tempdir().unwrap();
        let output = analyst(storm_payload())
            .analyze(chart_input(&dir, 6), now())
            .await
            .unwrap();

        let swell = &output.data.predicted_swells[0];
        assert_eq!(swell.propagation_method.as_deref(), Some("physics_based"));
        assert_eq!(swell.llm_arrival.as_deref(), Some("2025-10-09T12:00:00Z"));

        // 14s swell from 45N 160W: ~1414 nm at Cg ≈ 21.2 kt → 66-67 h
        let travel = swell.travel_time_hrs.unwrap();
        assert!((60.0..=72.0).contains(&travel), "travel {travel}h");
        let cg = swell.group_velocity_knots.unwrap();
        assert!((cg - 21.5).abs() < 1.0, "Cg {cg} kt");

        let arrival = parse_rfc3339(swell.calculated_arrival.as_deref().unwrap()).unwrap();
        assert!(arrival >= parse_rfc3339("2025-10-09T12:00:00Z").unwrap());

        // Fetch characteristics flow from the matched system
        assert_eq!(swell.fetch_quality.as_deref(), Some("strong"));
        assert_eq!(swell.source_pressure_mb, Some(985.0));
    }

    #[tokio::test]
    async fn six_charts_with_strong_fetch_score_high() {
        let dir = tempfile::tempdir().unwrap();
        let output = analyst(storm_payload())
            .analyze(chart_input(&dir, 6), now())
            .await
            .unwrap();
        // completeness 1.0, consistency 1.0, quality 0.8*1.1 (24h span)
        assert!(output.confidence > 0.85, "got {}", output.confidence);
        assert_eq!(output.data.analysis_summary.num_low_pressure, 1);
    }

    #[tokio::test]
    async fn malformed_json_degrades_to_empty_data() {
        let dir = tempfile::tempdir().unwrap();
        let output = analyst("not valid json at all".into())
            .analyze(chart_input(&dir, 2), now())
            .await
            .unwrap();
        assert!(output.data.systems.is_empty());
        assert!(output.data.predicted_swells.is_empty());
        assert!(!output.narrative.is_empty(), "narrative still attempted");
        assert!(output.confidence < 0.5);
    }

    #[tokio::test]
    async fn fenced_json_is_unwrapped() {
        let dir = tempfile::tempdir().unwrap();
        let fenced = format!("```json\n{}\n```", storm_payload());
        let output = analyst(fenced)
            .analyze(chart_input(&dir, 4), now())
            .await
            .unwrap();
        assert_eq!(output.data.systems.len(), 1);
    }

    #[tokio::test]
    async fn missing_files_rejected() {
        let input = ChartInput {
            images: vec![PathBuf::from("/nonexistent/chart.png"), PathBuf::from("notes.txt")],
            chart_times: vec![],
            region: "North Pacific".into(),
        };
        let err = analyst(storm_payload()).analyze(input, now()).await.unwrap_err();
        assert!(matches!(err, SpecialistError::NoValidImages(2)));
    }

    #[test]
    fn period_range_parsing() {
        assert_eq!(parse_period_seconds("13-15s"), Some(14.0));
        assert_eq!(parse_period_seconds("14s"), Some(14.0));
        assert_eq!(parse_period_seconds("garbage"), None);
    }
}
