//! Swellcast: Hawaii surf forecast engine.
//!
//! Multi-source data fusion and specialist orchestration for swell
//! forecasting.
//!
//! ## Architecture
//!
//! - **Processing**: per-source cleaning, trend/anomaly analysis, quality
//!   flags (buoy, weather, wave model)
//! - **Fusion Engine**: swell-event identification, shore mapping,
//!   auxiliary-feed integration, confidence scoring
//! - **Specialists**: buoy analyst and pressure-chart analyst running
//!   concurrently, cross-validated by a senior forecaster
//! - **Physics**: deep-water group velocity, storm-to-Hawaii arrival times
//! - **LLM Module**: single `generate_text` contract with retry/backoff

pub mod config;
pub mod error;
pub mod types;
pub mod geo;
pub mod physics;
pub mod spectral;
pub mod processing;
pub mod scoring;
pub mod fusion;
pub mod prepare;
pub mod llm;
pub mod specialists;
pub mod engine;
pub mod performance;

// Re-export the request-level API
pub use config::ForecastConfig;
pub use engine::{ForecastEngine, ForecastRequest, ForecastRun};
pub use error::EngineError;

// Re-export commonly used types
pub use types::{
    BuoyData, BuoyInput, ConfidenceCategory, ConfidenceReport, ForecastLocation, ModelData,
    Observation, QualityFlag, SwellComponent, SwellEvent, SwellForecast, WeatherData,
};

// Re-export the LLM contract
pub use llm::{LlmClient, LlmError, LlmRequest, LlmResponse};

// Re-export the performance-store contract
pub use performance::{PerformanceReport, PerformanceStore};
