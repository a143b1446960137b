//! Forecast configuration - every tunable as a TOML field.
//!
//! Each struct implements `Default` with values matching the documented
//! pipeline constants, so an absent config file changes nothing.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
}

/// Root configuration for a forecast deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub fusion: FusionConfig,

    #[serde(default)]
    pub spectral: SpectralConfig,

    #[serde(default)]
    pub images: ImageConfig,

    #[serde(default)]
    pub confidence: ConfidenceWeights,

    #[serde(default)]
    pub forecast: ForecastSettings,

    #[serde(default)]
    pub paths: PathConfig,
}

impl ForecastConfig {
    /// Load configuration using the standard search order:
    /// 1. `$SWELLCAST_CONFIG` environment variable
    /// 2. `./swellcast.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("SWELLCAST_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from SWELLCAST_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from SWELLCAST_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "SWELLCAST_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("swellcast.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./swellcast.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./swellcast.toml, using defaults");
                }
            }
        }

        info!("No swellcast.toml found — using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }
}

/// LLM call behavior shared by all specialists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Per-call timeout (seconds)
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,

    /// Maximum attempts per call before LLMUnavailable
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,

    /// Initial retry backoff (seconds), doubling per attempt
    #[serde(default = "default_llm_backoff")]
    pub retry_initial_delay_seconds: u64,

    /// Model identifier for the buoy analyst
    #[serde(default = "default_buoy_model")]
    pub buoy_model: String,

    /// Model identifier for the pressure (vision) analyst
    #[serde(default = "default_pressure_model")]
    pub pressure_model: String,

    /// Model identifier for the senior forecaster
    #[serde(default = "default_senior_model")]
    pub senior_model: String,
}

fn default_llm_timeout() -> u64 {
    120
}
fn default_llm_retries() -> u32 {
    3
}
fn default_llm_backoff() -> u64 {
    2
}
fn default_buoy_model() -> String {
    "swell-analyst-small".to_string()
}
fn default_pressure_model() -> String {
    "swell-analyst-vision".to_string()
}
fn default_senior_model() -> String {
    "swell-forecaster-large".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_llm_timeout(),
            max_retries: default_llm_retries(),
            retry_initial_delay_seconds: default_llm_backoff(),
            buoy_model: default_buoy_model(),
            pressure_model: default_pressure_model(),
            senior_model: default_senior_model(),
        }
    }
}

/// Fusion-stage tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Minimum dominant period (seconds) for single-component buoy events
    #[serde(default = "default_min_period")]
    pub min_period: f64,

    /// Events of the same source within this window merge
    #[serde(default = "default_merge_window_hours")]
    pub merge_window_hours: f64,

    /// Directional tolerance (degrees) for event merging
    #[serde(default = "default_merge_direction_tolerance")]
    pub merge_direction_tolerance: f64,
}

fn default_min_period() -> f64 {
    8.0
}
fn default_merge_window_hours() -> f64 {
    24.0
}
fn default_merge_direction_tolerance() -> f64 {
    45.0
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            min_period: default_min_period(),
            merge_window_hours: default_merge_window_hours(),
            merge_direction_tolerance: default_merge_direction_tolerance(),
        }
    }
}

/// Spectral analyzer tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectralConfig {
    /// Half-width (bins) of the peak integration neighbourhood
    #[serde(default = "default_neighborhood_bins")]
    pub neighborhood_bins: usize,
}

fn default_neighborhood_bins() -> usize {
    2
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            neighborhood_bins: default_neighborhood_bins(),
        }
    }
}

/// Image selection for vision prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Upper bound on selected images. Clamped to the hard cap of 10.
    #[serde(default = "default_max_images")]
    pub max_images: usize,

    #[serde(default = "default_detail_pressure")]
    pub detail_pressure: String,

    #[serde(default = "default_detail_wave")]
    pub detail_wave: String,

    #[serde(default = "default_detail_satellite")]
    pub detail_satellite: String,

    #[serde(default = "default_detail_sst")]
    pub detail_sst: String,
}

fn default_max_images() -> usize {
    10
}
fn default_detail_pressure() -> String {
    "high".to_string()
}
fn default_detail_wave() -> String {
    "auto".to_string()
}
fn default_detail_satellite() -> String {
    "auto".to_string()
}
fn default_detail_sst() -> String {
    "low".to_string()
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_images: default_max_images(),
            detail_pressure: default_detail_pressure(),
            detail_wave: default_detail_wave(),
            detail_satellite: default_detail_satellite(),
            detail_sst: default_detail_sst(),
        }
    }
}

/// Weights of the five-factor confidence model. Must sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    #[serde(default = "default_w_consensus")]
    pub model_consensus: f64,
    #[serde(default = "default_w_reliability")]
    pub source_reliability: f64,
    #[serde(default = "default_w_completeness")]
    pub data_completeness: f64,
    #[serde(default = "default_w_horizon")]
    pub forecast_horizon: f64,
    #[serde(default = "default_w_accuracy")]
    pub historical_accuracy: f64,
}

fn default_w_consensus() -> f64 {
    0.30
}
fn default_w_reliability() -> f64 {
    0.25
}
fn default_w_completeness() -> f64 {
    0.20
}
fn default_w_horizon() -> f64 {
    0.15
}
fn default_w_accuracy() -> f64 {
    0.10
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            model_consensus: default_w_consensus(),
            source_reliability: default_w_reliability(),
            data_completeness: default_w_completeness(),
            forecast_horizon: default_w_horizon(),
            historical_accuracy: default_w_accuracy(),
        }
    }
}

/// Request-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastSettings {
    /// Specialists that must clear the confidence gate for synthesis
    #[serde(default = "default_min_specialists")]
    pub min_specialists_required: usize,

    /// Days ahead being forecast (horizon factor input)
    #[serde(default = "default_horizon_days")]
    pub horizon_days: i64,

    /// Validation lookback window (days) for the performance store
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
}

fn default_min_specialists() -> usize {
    2
}
fn default_horizon_days() -> i64 {
    2
}
fn default_lookback_days() -> i64 {
    7
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            min_specialists_required: default_min_specialists(),
            horizon_days: default_horizon_days(),
            lookback_days: default_lookback_days(),
        }
    }
}

/// Filesystem layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Root of bundle directories (`<data_dir>/<bundle-id>/charts/...`)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Goddard-Caldwell climatology lookup JSON
    #[serde(default = "default_climatology_path")]
    pub climatology_lookup: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_climatology_path() -> PathBuf {
    PathBuf::from("data/climatology_lookup.json")
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            climatology_lookup: default_climatology_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let cfg = ForecastConfig::default();
        assert_eq!(cfg.llm.timeout_seconds, 120);
        assert_eq!(cfg.llm.max_retries, 3);
        assert_eq!(cfg.fusion.min_period, 8.0);
        assert_eq!(cfg.images.max_images, 10);
        assert_eq!(cfg.forecast.min_specialists_required, 2);
        let w = &cfg.confidence;
        let sum = w.model_consensus
            + w.source_reliability
            + w.data_completeness
            + w.forecast_horizon
            + w.historical_accuracy;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: ForecastConfig = toml::from_str(
            r#"
            [fusion]
            min_period = 10.0

            [images]
            detail_pressure = "auto"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.fusion.min_period, 10.0);
        assert_eq!(cfg.fusion.merge_window_hours, 24.0);
        assert_eq!(cfg.images.detail_pressure, "auto");
        assert_eq!(cfg.images.detail_sst, "low");
    }
}
