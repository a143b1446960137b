//! Forecast Engine - end-to-end pipeline orchestration.
//!
//! One request runs: ingest → per-source processing (parallel over disjoint
//! inputs) → fusion → preparation → buoy and pressure specialists
//! (concurrent, individually timed out) → senior synthesis.
//!
//! The two subordinate specialists MUST run concurrently and the senior
//! always observes their completed outputs. A specialist that times out or
//! returns empty content is dropped; the request proceeds while enough
//! specialists clear the confidence gate. An LLM that stays unreachable
//! after retries fails the whole request.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::ForecastConfig;
use crate::error::{EngineError, FusionError, SpecialistError};
use crate::fusion::{AuxiliaryFeeds, FusionEngine, FusionInput};
use crate::llm::{LlmClient, LlmError};
use crate::performance::PerformanceStore;
use crate::prepare::{collect_bundle_images, ForecastDataPreparer, ImageType, PreparedForecast};
use crate::processing::{BuoyProcessor, WaveModelProcessor, WeatherProcessor};
use crate::scoring::{ConfidenceScorer, SourceScorer};
use crate::specialists::{
    BuoyAnalyst, BuoyAnalystData, ChartInput, PressureAnalyst, PressureAnalystData,
    SeniorForecaster, SeniorForecasterData, SeniorInput, SpecialistKind, SpecialistOutput,
};
use crate::spectral::SpectralAnalyzer;
use crate::types::{parse_rfc3339, BuoyData, BuoyInput, Metadata, ModelData, WeatherData};

/// Raw in-memory request, as delivered by the external crawlers.
#[derive(Debug, Clone, Default)]
pub struct ForecastRequest {
    pub bundle_id: Option<String>,
    pub metadata: Metadata,
    pub buoy_data: Vec<Value>,
    pub weather_data: Vec<Value>,
    pub model_data: Vec<Value>,
    pub aux: AuxiliaryFeeds,
}

impl ForecastRequest {
    /// Parse the crawler-delivered JSON document. The `metadata` section is
    /// required; everything else is optional.
    pub fn from_json(doc: &Value) -> Result<Self, FusionError> {
        let metadata = doc
            .get("metadata")
            .and_then(Value::as_object)
            .cloned()
            .ok_or(FusionError::MissingSection("metadata"))?;

        let list = |key: &str| -> Vec<Value> {
            doc.get(key)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
        };

        Ok(Self {
            bundle_id: metadata
                .get("bundle_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            metadata,
            buoy_data: list("buoy_data"),
            weather_data: list("weather_data"),
            model_data: list("model_data"),
            aux: AuxiliaryFeeds {
                metar: list("metar_data"),
                tides: list("tide_data"),
                tropical: list("tropical_data"),
                charts: list("chart_data"),
                altimetry: list("altimetry_data"),
                nearshore: list("nearshore_data"),
                upper_air: list("upper_air_data"),
                climatology: list("climatology_data"),
            },
        })
    }
}

/// The complete result of one forecast run.
#[derive(Debug)]
pub struct ForecastRun {
    pub forecast: crate::types::SwellForecast,
    pub buoy_analysis: Option<SpecialistOutput<BuoyAnalystData>>,
    pub pressure_analysis: Option<SpecialistOutput<PressureAnalystData>>,
    pub synthesis: SpecialistOutput<SeniorForecasterData>,
    pub estimated_tokens: usize,
}

impl ForecastRun {
    /// The final synthesized narrative.
    pub fn narrative(&self) -> &str {
        &self.synthesis.narrative
    }
}

/// End-to-end forecast engine with injected collaborators.
pub struct ForecastEngine {
    config: ForecastConfig,
    llm: Arc<dyn LlmClient>,
    performance: Option<Arc<dyn PerformanceStore>>,
    fusion: FusionEngine,
    preparer: ForecastDataPreparer,
}

impl ForecastEngine {
    pub fn new(
        config: ForecastConfig,
        llm: Arc<dyn LlmClient>,
        performance: Option<Arc<dyn PerformanceStore>>,
    ) -> Self {
        let fusion = FusionEngine::new(
            config.fusion.clone(),
            SourceScorer::new(),
            ConfidenceScorer::new(config.confidence.clone()),
            SpectralAnalyzer::new(config.spectral.neighborhood_bins),
        );
        let preparer = ForecastDataPreparer::new(config.images.clone(), config.paths.clone());
        Self {
            config,
            llm,
            performance,
            fusion,
            preparer,
        }
    }

    /// Run a full forecast request at the current time.
    pub async fn run(&self, request: ForecastRequest) -> Result<ForecastRun, EngineError> {
        self.run_at(request, Utc::now()).await
    }

    /// Run a full forecast request as of `now` (injectable for tests).
    pub async fn run_at(
        &self,
        request: ForecastRequest,
        now: DateTime<Utc>,
    ) -> Result<ForecastRun, EngineError> {
        let days_ahead = self.config.forecast.horizon_days;
        info!(
            bundle = request.bundle_id.as_deref().unwrap_or("none"),
            buoys = request.buoy_data.len(),
            weather = request.weather_data.len(),
            models = request.model_data.len(),
            "Forecast request received"
        );

        // Recent validation performance feeds accuracy scoring; a missing
        // or failing store falls back to defaults.
        let recent_mae = self.query_recent_mae();

        // Per-source processing over disjoint inputs; order-preserving and
        // shared-state free, so a simple parallel map.
        let buoy_processor = BuoyProcessor::new();
        let processed_buoys: Vec<_> = request
            .buoy_data
            .par_iter()
            .map(|doc| buoy_processor.process(BuoyData::from_ndbc_json(doc, now), now))
            .collect();

        let weather_processor = WeatherProcessor::new();
        let processed_weather: Vec<_> = request
            .weather_data
            .par_iter()
            .map(|doc| weather_processor.process(WeatherData::from_nws_json(doc, now), now))
            .collect();

        let model_processor = WaveModelProcessor::new();
        let processed_models: Vec<_> = request
            .model_data
            .par_iter()
            .filter_map(|doc| {
                let parsed = if doc.get("header").is_some() && doc.get("data").is_some() {
                    Some(ModelData::from_ww3_json(doc, now))
                } else if doc.get("metadata").is_some() && doc.get("forecasts").is_some() {
                    Some(ModelData::from_swan_json(doc, now))
                } else {
                    warn!("Unknown wave model format, skipping document");
                    None
                }?;
                Some(model_processor.process(parsed, now))
            })
            .collect();

        // Bundle inventory informs the completeness factor before fusion
        let mut metadata = request.metadata.clone();
        if let Some(mae) = recent_mae {
            metadata.insert("validation".into(), json!({ "recent_mae": mae }));
        }
        if let Some(bundle_id) = &request.bundle_id {
            let images = collect_bundle_images(&self.config.paths.data_dir, bundle_id);
            if !images.satellite.is_empty() {
                metadata.insert("satellite".into(), json!(true));
            }
        }

        // Keep the parsed buoy data for the buoy analyst before fusion
        // consumes the processed feeds.
        let analyst_buoys: Vec<BuoyInput> = processed_buoys
            .iter()
            .map(|b| BuoyInput::Parsed(b.data.clone()))
            .collect();

        let fusion_input = FusionInput {
            metadata,
            buoys: processed_buoys,
            weather: processed_weather,
            models: processed_models,
            aux: request.aux.clone(),
        };
        let mut forecast = self.fusion.fuse(fusion_input, days_ahead, recent_mae, now)?;

        let prepared = self
            .preparer
            .prepare(&forecast, request.bundle_id.as_deref(), now);
        let estimated_tokens = self.preparer.estimate_tokens(&prepared);
        info!(estimated_tokens, "Prepared forecast data for specialists");

        // Independent specialists, launched concurrently with per-call
        // timeouts; the senior joins both.
        let (buoy_analysis, pressure_analysis) = self
            .run_specialists(&prepared, analyst_buoys, now)
            .await?;

        let senior = SeniorForecaster::new(
            self.llm.clone(),
            self.config.llm.clone(),
            self.config.forecast.min_specialists_required,
        );
        let synthesis = senior
            .analyze(
                SeniorInput {
                    buoy: buoy_analysis.clone(),
                    pressure: pressure_analysis.clone(),
                    swell_events: prepared.swell_events.clone(),
                    seasonal_context: prepared.seasonal_context.clone(),
                    data_digest: prepared.data_digest.clone(),
                    forecast_date: prepared.start_date.clone(),
                    valid_period: "48hr".to_string(),
                },
                now,
            )
            .await?;

        forecast.metadata.insert(
            "shore_forecasts".into(),
            json!(synthesis.data.shore_forecasts),
        );
        forecast
            .metadata
            .insert("narrative".into(), json!(synthesis.narrative));

        info!(
            confidence = format!("{:.3}", synthesis.confidence),
            "Forecast run complete"
        );

        Ok(ForecastRun {
            forecast,
            buoy_analysis,
            pressure_analysis,
            synthesis,
            estimated_tokens,
        })
    }

    fn query_recent_mae(&self) -> Option<f64> {
        let store = self.performance.as_ref()?;
        match store.recent_performance(self.config.forecast.lookback_days, 10, 10.0) {
            Ok(report) => {
                info!(
                    mae = report.overall.mae,
                    window_days = report.metadata.window_days,
                    "Recent validation performance loaded"
                );
                Some(report.recent_mae())
            }
            Err(e) => {
                warn!(error = %e, "Validation store unavailable, using default accuracy");
                None
            }
        }
    }

    /// Launch the buoy and pressure analysts concurrently, each bounded by
    /// the configured per-call timeout. A timed-out or failed specialist is
    /// dropped (the senior's gate decides whether the request survives); an
    /// LLM that is unavailable after retries fails the request.
    async fn run_specialists(
        &self,
        prepared: &PreparedForecast,
        buoys: Vec<BuoyInput>,
        now: DateTime<Utc>,
    ) -> Result<
        (
            Option<SpecialistOutput<BuoyAnalystData>>,
            Option<SpecialistOutput<PressureAnalystData>>,
        ),
        EngineError,
    > {
        let timeout = Duration::from_secs(self.config.llm.timeout_seconds);

        let buoy_analyst = BuoyAnalyst::new(self.llm.clone(), self.config.llm.clone());
        let buoy_task = tokio::time::timeout(timeout, buoy_analyst.analyze(buoys, now));

        let pressure_analyst = PressureAnalyst::new(self.llm.clone(), self.config.llm.clone());
        let chart_images: Vec<PathBuf> = prepared
            .selected_images
            .iter()
            .filter(|img| img.image_type == ImageType::PressureChart)
            .map(|img| img.path.clone())
            .collect();
        let chart_times: Vec<DateTime<Utc>> = prepared
            .metadata
            .get("chart_times")
            .and_then(Value::as_array)
            .map(|ts| {
                ts.iter()
                    .filter_map(Value::as_str)
                    .filter_map(parse_rfc3339)
                    .collect()
            })
            .unwrap_or_default();
        let chart_input = ChartInput {
            images: chart_images,
            chart_times,
            region: "North Pacific".to_string(),
        };
        let pressure_task = tokio::time::timeout(timeout, pressure_analyst.analyze(chart_input, now));

        let (buoy_result, pressure_result) = futures::join!(buoy_task, pressure_task);

        let buoy_analysis = Self::settle_specialist(SpecialistKind::Buoy, buoy_result)?;
        let pressure_analysis = Self::settle_specialist(SpecialistKind::Pressure, pressure_result)?;
        Ok((buoy_analysis, pressure_analysis))
    }

    /// Fold one specialist result: success → Some, timeout or per-call
    /// failure → None, unreachable LLM → request-fatal.
    fn settle_specialist<T>(
        kind: SpecialistKind,
        result: Result<Result<SpecialistOutput<T>, SpecialistError>, tokio::time::error::Elapsed>,
    ) -> Result<Option<SpecialistOutput<T>>, EngineError> {
        match result {
            Ok(Ok(output)) => Ok(Some(output)),
            Ok(Err(SpecialistError::Llm(LlmError::Unavailable { attempts, message }))) => {
                Err(EngineError::LlmUnavailable(format!(
                    "{} analyst, {attempts} attempts: {message}",
                    kind.as_str()
                )))
            }
            Ok(Err(e)) => {
                warn!(specialist = kind.as_str(), error = %e, "Specialist failed, proceeding without it");
                Ok(None)
            }
            Err(_) => {
                warn!(specialist = kind.as_str(), "Specialist timed out, proceeding without it");
                Ok(None)
            }
        }
    }
}
