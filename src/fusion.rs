//! Data Fusion Engine.
//!
//! Combines processed buoy, weather, and wave-model feeds plus auxiliary
//! datasets (METAR, tides, tropical outlooks, charts, altimetry, nearshore
//! buoys, upper air, climatology) into a single `SwellForecast`:
//!
//! 1. Seed the forecast with the four Hawaii shores
//! 2. Attach per-source reliability scores
//! 3. Extract swell events (spectral multi-peak path, single-component
//!    fallback, model events)
//! 4. Merge near-duplicate model events
//! 5. Map events onto exposed shores
//! 6. Compute per-shore quality
//! 7. Integrate auxiliary feeds into forecast metadata
//! 8. Score confidence

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::FusionConfig;
use crate::error::FusionError;
use crate::geo::HawaiiContext;
use crate::physics::{hawaii_scale_ft, haversine_km, significance};
use crate::processing::{
    self, ProcessedBuoy, ProcessedModel, ProcessedWeather,
};
use crate::scoring::{ConfidenceInput, ConfidenceScorer, SourceScorer};
use crate::spectral::SpectralAnalyzer;
use crate::types::{
    parse_rfc3339, Metadata, QualityFlag, SwellComponent, SwellEvent, SwellForecast,
};

/// Raw auxiliary feeds passed through to forecast metadata.
#[derive(Debug, Clone, Default)]
pub struct AuxiliaryFeeds {
    pub metar: Vec<Value>,
    pub tides: Vec<Value>,
    pub tropical: Vec<Value>,
    pub charts: Vec<Value>,
    pub altimetry: Vec<Value>,
    pub nearshore: Vec<Value>,
    pub upper_air: Vec<Value>,
    pub climatology: Vec<Value>,
}

/// Everything the fusion stage consumes.
#[derive(Debug, Clone, Default)]
pub struct FusionInput {
    pub metadata: Metadata,
    pub buoys: Vec<ProcessedBuoy>,
    pub weather: Vec<ProcessedWeather>,
    pub models: Vec<ProcessedModel>,
    pub aux: AuxiliaryFeeds,
}

/// Fusion engine with constructor-injected collaborators.
pub struct FusionEngine {
    config: FusionConfig,
    hawaii: HawaiiContext,
    source_scorer: SourceScorer,
    confidence_scorer: ConfidenceScorer,
    spectral: SpectralAnalyzer,
}

impl FusionEngine {
    pub fn new(
        config: FusionConfig,
        source_scorer: SourceScorer,
        confidence_scorer: ConfidenceScorer,
        spectral: SpectralAnalyzer,
    ) -> Self {
        Self {
            config,
            hawaii: HawaiiContext::new(),
            source_scorer,
            confidence_scorer,
            spectral,
        }
    }

    /// Validate the input: at least one primary source must be present.
    pub fn validate(&self, input: &FusionInput) -> Result<(), FusionError> {
        if input.buoys.is_empty() && input.weather.is_empty() && input.models.is_empty() {
            return Err(FusionError::NoSources);
        }
        Ok(())
    }

    /// Fuse all sources into a `SwellForecast` as of `now`.
    pub fn fuse(
        &self,
        mut input: FusionInput,
        days_ahead: i64,
        recent_mae_ft: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<SwellForecast, FusionError> {
        self.validate(&input)?;

        let forecast_id = input
            .metadata
            .get("forecast_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("forecast_{}", now.format("%Y%m%d_%H%M%S")));

        let mut forecast = SwellForecast {
            forecast_id,
            generated_time: now,
            swell_events: Vec::new(),
            locations: Vec::new(),
            metadata: input.metadata.clone(),
        };

        // Step 1: the four Hawaii shores
        for shore in self.hawaii.all_shores() {
            if let Some(location) = self.hawaii.create_forecast_location(shore.key) {
                forecast.locations.push(location);
            }
        }

        // Step 2: source scoring
        info!("Scoring data sources for reliability weighting");
        let buoy_data: Vec<_> = input.buoys.iter().map(|b| b.data.clone()).collect();
        let weather_data: Vec<_> = input.weather.iter().map(|w| w.data.clone()).collect();
        let model_data: Vec<_> = input.models.iter().map(|m| m.data.clone()).collect();
        let scorer = self.source_scorer.clone().with_recent_mae(recent_mae_ft);
        let source_scores = scorer.score_sources(&buoy_data, &weather_data, &model_data, now);

        for buoy in &mut input.buoys {
            if let Some(score) = source_scores.get(&buoy.data.station_id) {
                buoy.data
                    .metadata
                    .insert("weight".into(), json!(score.overall_score));
                buoy.data
                    .metadata
                    .insert("source_tier".into(), json!(score.tier.name()));
            }
        }
        for model in &mut input.models {
            if let Some(score) = source_scores.get(&model.data.model_id) {
                model
                    .data
                    .metadata
                    .insert("weight".into(), json!(score.overall_score));
                model
                    .data
                    .metadata
                    .insert("source_tier".into(), json!(score.tier.name()));
            }
        }

        forecast.metadata.insert(
            "source_scores".into(),
            json!(source_scores
                .iter()
                .map(|(id, s)| {
                    (
                        id.clone(),
                        json!({
                            "overall_score": s.overall_score,
                            "tier": s.tier.name(),
                            "tier_score": s.tier_score,
                            "freshness_score": s.freshness_score,
                            "completeness_score": s.completeness_score,
                            "accuracy_score": s.accuracy_score,
                        }),
                    )
                })
                .collect::<serde_json::Map<_, _>>()),
        );

        // Step 3: event extraction
        let mut events = self.extract_buoy_events(&input.buoys, now);
        let model_events = self.merge_similar_events(self.extract_model_events(&input.models, now));
        events.extend(model_events);

        for event in &mut events {
            event.normalize_lifecycle();
        }

        // Step 5: shore mapping (before sorting changes nothing — indexes
        // are assigned after the final ordering)
        events.sort_by(|a, b| {
            b.significance
                .partial_cmp(&a.significance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.start_time.cmp(&b.start_time))
        });
        forecast.swell_events = events;
        self.map_events_to_shores(&mut forecast);

        // Step 6: per-shore quality
        self.calculate_shore_quality(&mut forecast, &input.weather, now);

        // Step 7: auxiliary integration
        self.integrate_auxiliary(&mut forecast, &input.aux);

        // Step 8: confidence
        let has_buoys = !input.buoys.is_empty()
            || forecast.swell_events.iter().any(|e| e.source.starts_with("buoy"));
        let has_models =
            !input.models.is_empty() || forecast.swell_events.iter().any(|e| e.source == "model");
        let has_charts = forecast.metadata.contains_key("charts");
        let has_satellite = forecast.metadata.contains_key("satellite");

        let confidence_input = ConfidenceInput {
            swell_events: &forecast.swell_events,
            source_scores: source_scores
                .iter()
                .map(|(id, s)| (id.clone(), s.overall_score))
                .collect(),
            has_buoys,
            has_models,
            has_charts,
            has_satellite,
            recent_mae_ft,
        };
        let report = self.confidence_scorer.calculate(&confidence_input, days_ahead);

        forecast.metadata.insert(
            "confidence".into(),
            json!({
                "overall_score": report.overall_score,
                "category": report.category.to_string(),
                "factors": report.factors,
                "breakdown": report.breakdown,
                "warnings": report.warnings,
            }),
        );
        forecast
            .metadata
            .insert("confidence_report".into(), json!(report));

        info!(
            events = forecast.swell_events.len(),
            locations = forecast.locations.len(),
            confidence = format!("{:.3}", report.overall_score),
            "Fusion complete"
        );

        Ok(forecast)
    }

    // ========================================================================
    // Event extraction
    // ========================================================================

    fn extract_buoy_events(&self, buoys: &[ProcessedBuoy], now: DateTime<Utc>) -> Vec<SwellEvent> {
        let mut events = Vec::new();

        let buoy_data: Vec<_> = buoys.iter().map(|b| b.data.clone()).collect();
        let anomalies = processing::detect_anomalies(&buoy_data);
        let trends = processing::analyze_trends(&buoy_data);

        for buoy in buoys {
            let Some(latest) = buoy.data.latest_observation() else {
                continue;
            };

            // Spectral path: ≥2 partitions become one event per peak
            if let Some(spec_path) = &buoy.data.spec_file_path {
                match self.spectral.analyze_file(std::path::Path::new(spec_path)) {
                    Ok(analysis) if analysis.peaks.len() >= 2 => {
                        info!(
                            buoy = %buoy.data.station_id,
                            components = analysis.peaks.len(),
                            "Spectral analysis separated swell components"
                        );
                        for (rank, peak) in analysis.peaks.iter().enumerate() {
                            let component_type = if rank == 0 { "primary" } else { "secondary" };
                            let mut metadata = Metadata::new();
                            metadata.insert("station_id".into(), json!(buoy.data.station_id));
                            metadata.insert("buoy_name".into(), json!(buoy.data.display_name()));
                            metadata.insert("component_rank".into(), json!(rank + 1));
                            metadata.insert("energy_density".into(), json!(peak.energy_density));
                            metadata.insert("confidence".into(), json!(peak.confidence));
                            metadata.insert("type".into(), json!("observed_spectral"));

                            events.push(SwellEvent {
                                event_id: format!(
                                    "buoy_{}_{}_{}",
                                    buoy.data.station_id,
                                    component_type,
                                    now.format("%Y%m%d")
                                ),
                                start_time: Some(latest.timestamp),
                                peak_time: Some(latest.timestamp),
                                end_time: None,
                                primary_direction: Some(peak.direction_degrees),
                                significance: significance(
                                    Some(peak.height_meters),
                                    Some(peak.period_seconds),
                                ),
                                hawaii_scale: Some(hawaii_scale_ft(peak.height_meters)),
                                source: "buoy_spectral".into(),
                                quality_flag: QualityFlag::Valid,
                                primary_components: vec![SwellComponent {
                                    height: peak.height_meters,
                                    period: peak.period_seconds,
                                    direction: peak.direction_degrees,
                                    confidence: peak.confidence,
                                    source: "buoy_spectral".into(),
                                    quality_flag: QualityFlag::Valid,
                                }],
                                secondary_components: vec![],
                                metadata,
                            });
                        }
                        continue;
                    }
                    Ok(_) => {
                        // 0-1 peaks: fall through to the single-component path
                    }
                    Err(e) => {
                        debug!(buoy = %buoy.data.station_id, error = %e, "Spectral analysis failed, using single-component path");
                    }
                }
            }

            // Single-component fallback
            let Some(height) = latest.wave_height else {
                continue;
            };
            let Some(period) = latest.dominant_period else {
                debug!(buoy = %buoy.data.station_id, "Skipping buoy: dominant period missing");
                continue;
            };
            if period < self.config.min_period {
                debug!(
                    buoy = %buoy.data.station_id,
                    period,
                    min = self.config.min_period,
                    "Skipping buoy: period below event threshold"
                );
                continue;
            }

            let trend = trends.iter().find(|t| t.buoy_id == buoy.data.station_id);
            let mut quality_flag =
                processing::assess_reading_quality(&buoy.data, &anomalies, trend);

            // Stale-data override: a >24 h old observation still carries
            // signal but cannot be trusted as current conditions.
            let age_hours = (now - latest.timestamp).num_seconds() as f64 / 3600.0;
            if age_hours > 24.0 && quality_flag != QualityFlag::Excluded {
                warn!(
                    buoy = %buoy.data.station_id,
                    age_hours = format!("{age_hours:.1}"),
                    "Stale buoy data - overriding quality to suspect"
                );
                quality_flag = QualityFlag::Suspect;
            }

            match quality_flag {
                QualityFlag::Excluded => {
                    warn!(
                        buoy = %buoy.data.station_id,
                        height = format!("{height:.1}"),
                        period = format!("{period:.1}"),
                        "Buoy data EXCLUDED - anomalous reading"
                    );
                    continue;
                }
                QualityFlag::Suspect => {
                    info!(
                        buoy = %buoy.data.station_id,
                        height = format!("{height:.1}"),
                        period = format!("{period:.1}"),
                        "Buoy data SUSPECT - use with caution"
                    );
                }
                QualityFlag::Valid => {}
            }

            let mut metadata = Metadata::new();
            metadata.insert("station_id".into(), json!(buoy.data.station_id));
            metadata.insert("buoy_name".into(), json!(buoy.data.display_name()));
            metadata.insert("confidence".into(), json!(0.9));
            metadata.insert("type".into(), json!("observed"));
            metadata.insert(
                "source_details".into(),
                json!({
                    "buoy_id": buoy.data.station_id,
                    "observation_time": latest.timestamp.to_rfc3339(),
                    "source_type": "NDBC realtime",
                }),
            );

            events.push(SwellEvent {
                event_id: format!("buoy_{}_{}", buoy.data.station_id, now.format("%Y%m%d")),
                start_time: Some(latest.timestamp),
                peak_time: Some(latest.timestamp),
                end_time: None,
                primary_direction: latest.wave_direction,
                significance: significance(Some(height), Some(period)),
                hawaii_scale: Some(hawaii_scale_ft(height)),
                source: "buoy".into(),
                quality_flag,
                primary_components: vec![SwellComponent {
                    height,
                    period,
                    direction: latest.wave_direction.unwrap_or(0.0),
                    confidence: 0.9,
                    source: "buoy".into(),
                    quality_flag,
                }],
                secondary_components: vec![],
                metadata,
            });
        }

        events
    }

    fn extract_model_events(&self, models: &[ProcessedModel], now: DateTime<Utc>) -> Vec<SwellEvent> {
        let mut events = Vec::new();

        for model in models {
            if model.data.forecasts.is_empty() {
                continue;
            }

            if !model.detected_events.is_empty() {
                // Pre-extracted events from the model processor
                for detected in &model.detected_events {
                    let mut metadata = Metadata::new();
                    metadata.insert("model_id".into(), json!(model.data.model_id));
                    metadata.insert("model_region".into(), json!(model.data.region));
                    metadata.insert("confidence".into(), json!(0.7));
                    metadata.insert("type".into(), json!("forecast"));
                    metadata.insert("peak_hour".into(), json!(detected.peak_hour));
                    if let Some(d) = detected.duration_hours {
                        metadata.insert("duration_hours".into(), json!(d));
                    }

                    events.push(SwellEvent {
                        event_id: detected.event_id.clone(),
                        start_time: detected.start_time,
                        peak_time: Some(detected.peak_time),
                        end_time: detected.end_time,
                        primary_direction: detected.peak_direction,
                        significance: detected.significance,
                        hawaii_scale: Some(detected.hawaii_scale),
                        source: "model".into(),
                        quality_flag: QualityFlag::Valid,
                        primary_components: vec![SwellComponent {
                            height: detected.peak_height,
                            period: detected.peak_period.unwrap_or(0.0),
                            direction: detected.peak_direction.unwrap_or(0.0),
                            confidence: 0.7,
                            source: "model".into(),
                            quality_flag: QualityFlag::Valid,
                        }],
                        secondary_components: vec![],
                        metadata,
                    });
                }
                continue;
            }

            // Fallback: the maximum-height point of the run
            let mut best: Option<(&crate::types::ModelForecast, &crate::types::ModelPoint, f64)> =
                None;
            for forecast in &model.data.forecasts {
                for point in &forecast.points {
                    if let Some(h) = point.wave_height {
                        if best.as_ref().map_or(true, |(_, _, max)| h > *max) {
                            best = Some((forecast, point, h));
                        }
                    }
                }
            }
            let Some((forecast, point, height)) = best else {
                continue;
            };
            if height <= 0.0 {
                continue;
            }

            let mut metadata = Metadata::new();
            metadata.insert("model_id".into(), json!(model.data.model_id));
            metadata.insert("model_region".into(), json!(model.data.region));
            metadata.insert("confidence".into(), json!(0.6));
            metadata.insert("type".into(), json!("forecast"));
            metadata.insert("forecast_hour".into(), json!(forecast.forecast_hour));

            events.push(SwellEvent {
                event_id: format!("model_{}_{}", model.data.model_id, now.format("%Y%m%d")),
                start_time: None,
                peak_time: Some(forecast.timestamp),
                end_time: None,
                primary_direction: point.wave_direction,
                significance: significance(Some(height), point.wave_period),
                hawaii_scale: Some(hawaii_scale_ft(height)),
                source: "model".into(),
                quality_flag: QualityFlag::Valid,
                primary_components: vec![SwellComponent {
                    height,
                    period: point.wave_period.unwrap_or(0.0),
                    direction: point.wave_direction.unwrap_or(0.0),
                    confidence: 0.6,
                    source: "model".into(),
                    quality_flag: QualityFlag::Valid,
                }],
                secondary_components: vec![],
                metadata,
            });
        }

        events
    }

    /// Collapse same-source events whose peaks lie within the merge window
    /// and whose directions differ by no more than the tolerance; the
    /// higher-significance event survives.
    fn merge_similar_events(&self, mut events: Vec<SwellEvent>) -> Vec<SwellEvent> {
        if events.len() <= 1 {
            return events;
        }
        events.sort_by(|a, b| a.peak_time.cmp(&b.peak_time));

        let mut merged: Vec<SwellEvent> = Vec::new();
        let mut current = events.remove(0);

        for next in events {
            let mergeable = current.source == next.source
                && match (current.peak_time, next.peak_time) {
                    (Some(a), Some(b)) => {
                        let hours = (b - a).num_seconds().abs() as f64 / 3600.0;
                        let dir_close = match (current.primary_direction, next.primary_direction) {
                            (Some(d1), Some(d2)) => {
                                let mut diff = (d1 - d2).abs();
                                if diff > 180.0 {
                                    diff = 360.0 - diff;
                                }
                                diff <= self.config.merge_direction_tolerance
                            }
                            _ => true,
                        };
                        hours <= self.config.merge_window_hours && dir_close
                    }
                    _ => false,
                };

            if mergeable {
                debug!(
                    kept = %if next.significance > current.significance { &next.event_id } else { &current.event_id },
                    dropped = %if next.significance > current.significance { &current.event_id } else { &next.event_id },
                    "Merged similar events"
                );
                if next.significance > current.significance {
                    current = next;
                }
            } else {
                merged.push(current);
                current = next;
            }
        }
        merged.push(current);
        merged
    }

    // ========================================================================
    // Shore mapping and quality
    // ========================================================================

    fn map_events_to_shores(&self, forecast: &mut SwellForecast) {
        let exposures: Vec<(usize, Vec<(String, f64)>)> = forecast
            .swell_events
            .iter()
            .enumerate()
            .filter_map(|(i, event)| {
                let direction = event.primary_direction?;
                let hits: Vec<(String, f64)> = forecast
                    .locations
                    .iter()
                    .filter_map(|location| {
                        let key = location.shore_key();
                        let factor = self.hawaii.exposure_factor(&key, direction);
                        (factor > 0.0).then_some((key, factor))
                    })
                    .collect();
                Some((i, hits))
            })
            .collect();

        for (event_idx, hits) in exposures {
            for (shore_key, factor) in hits {
                forecast.swell_events[event_idx]
                    .metadata
                    .insert(format!("exposure_{shore_key}"), json!(factor));
                if let Some(location) = forecast
                    .locations
                    .iter_mut()
                    .find(|l| l.shore_key() == shore_key)
                {
                    location.event_indexes.push(event_idx);
                }
            }
        }
    }

    fn calculate_shore_quality(
        &self,
        forecast: &mut SwellForecast,
        weather: &[ProcessedWeather],
        now: DateTime<Utc>,
    ) {
        // Collect per-location values first to avoid aliasing the event slice
        let mut updates: Vec<(usize, f64, f64, f64)> = Vec::new();

        for (loc_idx, location) in forecast.locations.iter().enumerate() {
            let shore_key = location.shore_key();
            let seasonal = self.hawaii.seasonal_factor(&shore_key, now);
            let wind_factor = self.wind_factor(&shore_key, location, weather);

            // Best event contribution: significance × exposure of the most
            // significant exposed event
            let swell_factor = location
                .event_indexes
                .iter()
                .filter_map(|&i| forecast.swell_events.get(i))
                .map(|e| {
                    let exposure = e
                        .metadata
                        .get(&format!("exposure_{shore_key}"))
                        .and_then(Value::as_f64)
                        .unwrap_or(0.5);
                    e.significance * exposure
                })
                .fold(0.0, f64::max);

            let quality =
                (seasonal * 0.3 + wind_factor * 0.4 + swell_factor * 0.3).clamp(0.0, 1.0);
            updates.push((loc_idx, seasonal, wind_factor, quality));
        }

        for (loc_idx, seasonal, wind_factor, quality) in updates {
            let location = &mut forecast.locations[loc_idx];
            location
                .metadata
                .insert("seasonal_factor".into(), json!(seasonal));
            location
                .metadata
                .insert("wind_factor".into(), json!(wind_factor));
            location
                .metadata
                .insert("overall_quality".into(), json!(quality));
        }
    }

    /// Wind factor for a shore: the overall wind rating of the
    /// haversine-nearest weather source, 0.5 when no weather exists.
    fn wind_factor(
        &self,
        shore_key: &str,
        location: &crate::types::ForecastLocation,
        weather: &[ProcessedWeather],
    ) -> f64 {
        let mut best: Option<(f64, &ProcessedWeather)> = None;
        for w in weather {
            let (Some(lat), Some(lon)) = (w.data.latitude, w.data.longitude) else {
                // Position-less feeds are usable but rank last
                if best.is_none() {
                    best = Some((f64::MAX, w));
                }
                continue;
            };
            let distance = haversine_km(location.latitude, location.longitude, lat, lon);
            if best.as_ref().map_or(true, |(d, _)| distance < *d) {
                best = Some((distance, w));
            }
        }

        best.map(|(_, w)| {
            w.shore_impacts
                .get(shore_key)
                .map(|i| i.overall_rating)
                .unwrap_or(0.5)
        })
        .unwrap_or(0.5)
    }

    // ========================================================================
    // Auxiliary feeds
    // ========================================================================

    fn integrate_auxiliary(&self, forecast: &mut SwellForecast, aux: &AuxiliaryFeeds) {
        self.integrate_metar(forecast, &aux.metar);
        self.integrate_tides(forecast, &aux.tides);
        self.integrate_tropical(forecast, &aux.tropical);
        self.integrate_charts(forecast, &aux.charts);
        self.integrate_altimetry(forecast, &aux.altimetry);
        self.integrate_nearshore(forecast, &aux.nearshore);
        self.integrate_upper_air(forecast, &aux.upper_air);
        self.integrate_climatology(forecast, &aux.climatology);
    }

    /// Latest METAR (by issue time) becomes `metadata.weather`.
    fn integrate_metar(&self, forecast: &mut SwellForecast, entries: &[Value]) {
        let latest = entries
            .iter()
            .filter_map(|e| {
                let issued = e.get("issued").and_then(Value::as_str).and_then(parse_rfc3339)?;
                Some((issued, e))
            })
            .max_by_key(|(issued, _)| *issued);

        let Some((_, latest)) = latest else { return };
        let mut weather = Metadata::new();
        weather.insert("metar_station".into(), latest.get("station").cloned().unwrap_or(Value::Null));
        weather.insert("metar_issued".into(), latest.get("issued").cloned().unwrap_or(Value::Null));
        for (src, dst) in [
            ("wind_direction_deg", "wind_direction"),
            ("wind_speed_ms", "wind_speed_ms"),
            ("wind_gust_ms", "wind_gust_ms"),
            ("temperature_c", "temperature"),
            ("pressure_hpa", "pressure_hpa"),
        ] {
            if let Some(v) = latest.get(src) {
                if !v.is_null() {
                    weather.insert(dst.into(), v.clone());
                }
            }
        }
        weather.insert("metar".into(), latest.clone());
        forecast.metadata.insert("weather".into(), Value::Object(weather));
    }

    /// Up to three upcoming highs/lows plus the latest water level, in feet.
    fn integrate_tides(&self, forecast: &mut SwellForecast, entries: &[Value]) {
        if entries.is_empty() {
            return;
        }
        let mut tides = Metadata::new();

        let predictions: Vec<&Value> = entries
            .iter()
            .filter(|e| e.get("product").and_then(Value::as_str) == Some("predictions"))
            .collect();
        let observations: Vec<&Value> = entries
            .iter()
            .filter(|e| e.get("product").and_then(Value::as_str) != Some("predictions"))
            .collect();

        if let Some(record) = predictions.first() {
            let units = record.get("units").and_then(Value::as_str).unwrap_or("metric");
            let mut points: Vec<(String, f64)> = record
                .get("records")
                .and_then(Value::as_array)
                .map(|rows| {
                    rows.iter()
                        .filter_map(|row| {
                            let height = tide_value(row)?;
                            let time = tide_time(row)?;
                            let height_ft = if units == "metric" {
                                (height * 3.28084 * 100.0).round() / 100.0
                            } else {
                                (height * 100.0).round() / 100.0
                            };
                            Some((time, height_ft))
                        })
                        .collect()
                })
                .unwrap_or_default();

            if !points.is_empty() {
                points.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                let highs: Vec<_> = points.iter().take(3).cloned().collect();
                let lows: Vec<_> = points.iter().rev().take(3).cloned().collect();
                tides.insert("high_tide".into(), json!(highs));
                tides.insert("low_tide".into(), json!(lows));
            }
            tides.insert("station".into(), record.get("station").cloned().unwrap_or(Value::Null));
        }

        if let Some(record) = observations.first() {
            let latest = record
                .get("records")
                .and_then(Value::as_array)
                .and_then(|rows| {
                    rows.iter()
                        .filter_map(|row| {
                            let height = tide_value(row)?;
                            let time = tide_time(row)?;
                            let parsed = parse_rfc3339(&time)?;
                            Some((parsed, time, height))
                        })
                        .max_by_key(|(parsed, _, _)| *parsed)
                });
            if let Some((_, time, height)) = latest {
                tides.insert(
                    "latest_water_level".into(),
                    json!({ "time": time, "height_ft": (height * 3.28084 * 100.0).round() / 100.0 }),
                );
            }
        }

        if !tides.is_empty() {
            forecast.metadata.insert("tides".into(), Value::Object(tides));
        }
    }

    fn integrate_tropical(&self, forecast: &mut SwellForecast, entries: &[Value]) {
        let Some(outlook) = entries.first() else { return };
        forecast.metadata.insert(
            "tropical".into(),
            json!({
                "headline": outlook.get("headline").cloned().unwrap_or(Value::Null),
                "entries": outlook.get("entries").cloned().unwrap_or(json!([])),
            }),
        );
    }

    fn integrate_charts(&self, forecast: &mut SwellForecast, entries: &[Value]) {
        let charts: Vec<Value> = entries
            .iter()
            .filter_map(|e| {
                let file_path = e
                    .get("file_path")
                    .or_else(|| e.get("manifest_path"))
                    .and_then(Value::as_str)?;
                Some(json!({
                    "type": e.get("chart_type").cloned().unwrap_or(Value::Null),
                    "file_path": file_path,
                    "source_url": e.get("source_url").cloned().unwrap_or(Value::Null),
                }))
            })
            .collect();
        if !charts.is_empty() {
            forecast.metadata.insert("charts".into(), json!(charts));
        }
    }

    fn integrate_altimetry(&self, forecast: &mut SwellForecast, entries: &[Value]) {
        let products: Vec<Value> = entries
            .iter()
            .filter_map(|e| {
                let file_path = e
                    .get("file_path")
                    .or_else(|| e.get("extracted_file"))
                    .and_then(Value::as_str)?;
                Some(json!({
                    "description": e.get("description").cloned().unwrap_or(Value::Null),
                    "file_path": file_path,
                    "type": e.get("type").cloned().unwrap_or(Value::Null),
                    "netcdf_summary": e.get("netcdf_summary").cloned().unwrap_or(Value::Null),
                }))
            })
            .collect();
        if !products.is_empty() {
            forecast.metadata.insert("altimetry".into(), json!(products));
        }
    }

    fn integrate_nearshore(&self, forecast: &mut SwellForecast, entries: &[Value]) {
        let stations: Vec<Value> = entries
            .iter()
            .filter_map(|e| {
                let station_id = e
                    .get("station_id")
                    .or_else(|| e.get("name"))
                    .and_then(Value::as_str)?;
                Some(json!({
                    "station_id": station_id,
                    "station_name": e.get("station_name").cloned().unwrap_or(Value::Null),
                    "significant_height_m": e.get("significant_height_m").cloned().unwrap_or(Value::Null),
                    "peak_period_s": e.get("peak_period_s").cloned().unwrap_or(Value::Null),
                    "peak_direction_deg": e.get("peak_direction_deg").cloned().unwrap_or(Value::Null),
                    "observation_timestamp": e.get("observation_timestamp").cloned().unwrap_or(Value::Null),
                }))
            })
            .collect();
        if !stations.is_empty() {
            forecast
                .metadata
                .insert("nearshore_buoys".into(), json!(stations));
        }
    }

    /// Group upper-air products by pressure level into one-line summaries
    /// such as "250 hPa: Jet Stream Analysis available."
    fn integrate_upper_air(&self, forecast: &mut SwellForecast, entries: &[Value]) {
        if entries.is_empty() {
            return;
        }
        forecast.metadata.insert("upper_air".into(), json!(entries));

        let mut grouped: std::collections::BTreeMap<String, Vec<String>> = Default::default();
        for entry in entries {
            let level = entry
                .get("analysis_level")
                .or_else(|| entry.get("level"))
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_else(|| "unknown".to_string());
            let descriptor = entry
                .get("product_type")
                .or_else(|| entry.get("source_id"))
                .and_then(Value::as_str)
                .unwrap_or("analysis")
                .replace('_', " ");
            grouped.entry(level).or_default().push(title_case(&descriptor));
        }

        let mut levels: Vec<(String, Vec<String>)> = grouped.into_iter().collect();
        levels.sort_by(|a, b| {
            let pa = a.0.parse::<f64>().unwrap_or(f64::INFINITY);
            let pb = b.0.parse::<f64>().unwrap_or(f64::INFINITY);
            pa.partial_cmp(&pb).unwrap_or(std::cmp::Ordering::Equal)
        });

        let summary: Vec<String> = levels
            .iter()
            .map(|(level, descriptors)| format!("{level} hPa: {} available.", descriptors.join(", ")))
            .collect();
        forecast
            .metadata
            .insert("upper_air_summary".into(), json!(summary));
    }

    fn integrate_climatology(&self, forecast: &mut SwellForecast, entries: &[Value]) {
        if entries.is_empty() {
            return;
        }
        forecast.metadata.insert("climatology".into(), json!(entries));
    }
}

fn tide_value(row: &Value) -> Option<f64> {
    for key in ["Prediction", "Water Level", "WaterLevel", "Observation", "v"] {
        if let Some(v) = row.get(key) {
            if let Some(f) = v.as_f64() {
                return Some(f);
            }
            if let Some(s) = v.as_str() {
                if let Ok(f) = s.trim().parse() {
                    return Some(f);
                }
            }
        }
    }
    None
}

fn tide_time(row: &Value) -> Option<String> {
    for key in ["Date Time", "Time", "Time (GMT)", "t"] {
        if let Some(s) = row.get(key).and_then(Value::as_str) {
            return Some(s.to_string());
        }
    }
    None
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
