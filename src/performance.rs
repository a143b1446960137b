//! Historical forecast-performance interface.
//!
//! The validation store itself (SQL, files) lives outside the core; the
//! pipeline consumes exactly one query: recent performance over a lookback
//! window. Implementations are expected to expand the window (doubling, up
//! to 30 days) when fewer than `min_samples` validations exist, and to keep
//! the query under 50 ms at 10k rows by indexing `validations.validated_at`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PerformanceError {
    #[error("Validation store unavailable: {0}")]
    Unavailable(String),

    #[error("Insufficient validation samples: have {have}, need {need}")]
    InsufficientSamples { have: usize, need: usize },
}

/// Aggregate accuracy metrics for one scope (overall or a single shore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    pub total: usize,
    /// Mean absolute error (feet)
    pub mae: f64,
    /// Root mean square error (feet)
    pub rmse: f64,
    /// Fraction of forecasts in the correct size category
    pub categorical: f64,
    /// Mean signed error (feet); positive = overprediction
    pub avg_bias: f64,
}

/// Systematic bias direction for a shore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BiasCategory {
    Overpredicting,
    Underpredicting,
}

/// One shore flagged for systematic bias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasAlert {
    pub shore: String,
    pub avg_bias: f64,
    pub sample_size: usize,
    pub bias_category: BiasCategory,
}

/// Report window metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceWindow {
    pub window_days: i64,
    /// True when the window was expanded from the requested span
    pub expanded: bool,
}

/// Complete answer to the recent-performance query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub overall: AccuracyMetrics,
    /// Per-shore metrics; `None` for shores without enough samples
    pub by_shore: BTreeMap<String, Option<AccuracyMetrics>>,
    pub bias_alerts: Vec<BiasAlert>,
    pub metadata: PerformanceWindow,
}

impl PerformanceReport {
    /// Recent MAE in feet, the single number the confidence scorer consumes.
    pub fn recent_mae(&self) -> f64 {
        self.overall.mae
    }
}

/// The performance-query interface consumed by the engine.
pub trait PerformanceStore: Send + Sync {
    fn recent_performance(
        &self,
        window_days: i64,
        min_samples: usize,
        outlier_ft: f64,
    ) -> Result<PerformanceReport, PerformanceError>;
}
