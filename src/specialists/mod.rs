//! Specialist analysts for the forecast engine.
//!
//! Three single-concern specialists, each consuming structured input plus
//! the shared LLM client and returning a typed output with a confidence
//! score and a narrative:
//!
//! 1. **BuoyAnalyst** - trends, anomalies, cross-buoy agreement
//! 2. **PressureAnalyst** - vision analysis of pressure charts, fetch
//!    windows, physics-enhanced swell arrivals
//! 3. **SeniorForecaster** - cross-validates the two subordinate reports,
//!    detects contradictions, and synthesizes the final narrative
//!
//! The buoy and pressure analysts are independent and run concurrently; the
//! senior always observes their completed outputs.

mod buoy_analyst;
mod pressure_analyst;
mod senior_forecaster;

pub use buoy_analyst::*;
pub use pressure_analyst::*;
pub use senior_forecaster::*;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::types::Metadata;

/// The closed set of specialist roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialistKind {
    Buoy,
    Pressure,
    Senior,
}

impl SpecialistKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SpecialistKind::Buoy => "buoy",
            SpecialistKind::Pressure => "pressure",
            SpecialistKind::Senior => "senior",
        }
    }
}

/// Standard output envelope for all specialists.
#[derive(Debug, Clone, Serialize)]
pub struct SpecialistOutput<T> {
    /// Confidence 0-1 in the analysis
    pub confidence: f64,
    /// Structured data specific to the specialist
    pub data: T,
    /// Natural-language narrative of findings
    pub narrative: String,
    /// Always carries a `timestamp`
    pub metadata: Metadata,
}

impl<T> SpecialistOutput<T> {
    pub fn new(confidence: f64, data: T, narrative: String, mut metadata: Metadata) -> Self {
        if !metadata.contains_key("timestamp") {
            metadata.insert("timestamp".into(), json!(Utc::now().to_rfc3339()));
        }
        Self {
            confidence: confidence.clamp(0.0, 1.0),
            data,
            narrative,
            metadata,
        }
    }
}

/// Shared confidence combiner: quality is weighted most, then consistency,
/// then completeness.
pub fn combine_confidence(completeness: f64, consistency: f64, quality: f64) -> f64 {
    (quality * 0.5 + consistency * 0.3 + completeness * 0.2).clamp(0.0, 1.0)
}
