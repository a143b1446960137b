//! Forecast confidence report types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Confidence category derived from the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceCategory {
    High,
    Medium,
    Low,
}

impl ConfidenceCategory {
    /// Category boundaries: ≥0.7 high, ≥0.4 medium, else low.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            ConfidenceCategory::High
        } else if score >= 0.4 {
            ConfidenceCategory::Medium
        } else {
            ConfidenceCategory::Low
        }
    }
}

impl std::fmt::Display for ConfidenceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceCategory::High => write!(f, "high"),
            ConfidenceCategory::Medium => write!(f, "medium"),
            ConfidenceCategory::Low => write!(f, "low"),
        }
    }
}

/// Per-factor scores of the five-factor confidence model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceFactors {
    pub model_consensus: f64,
    pub source_reliability: f64,
    pub data_completeness: f64,
    pub forecast_horizon: f64,
    pub historical_accuracy: f64,
}

/// Complete confidence scoring result attached to every forecast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceReport {
    /// Weighted overall score, 0-1.
    pub overall_score: f64,
    pub category: ConfidenceCategory,
    pub factors: ConfidenceFactors,
    /// Per-source overall reliability scores.
    pub breakdown: BTreeMap<String, f64>,
    /// Every reason contributing to reduced confidence.
    pub warnings: Vec<String>,
}
