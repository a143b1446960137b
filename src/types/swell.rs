//! Swell event model: components, events, forecast locations, and the
//! top-level `SwellForecast` produced by the fusion engine.
//!
//! Events and locations reference each other in the source data model; the
//! cycle is broken here with arena + index — the forecast owns the event
//! slice and each location carries indexes into it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::weather::degrees_to_compass;
use super::Metadata;

/// Tri-state data quality flag.
///
/// - `Valid`: passes all quality checks, use in forecast
/// - `Suspect`: looks unusual but not clearly wrong, use with caution
/// - `Excluded`: anomalous, must NOT reach forecast synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QualityFlag {
    #[default]
    Valid,
    Suspect,
    Excluded,
}

impl std::fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityFlag::Valid => write!(f, "valid"),
            QualityFlag::Suspect => write!(f, "suspect"),
            QualityFlag::Excluded => write!(f, "excluded"),
        }
    }
}

/// One component of a swell event (e.g. primary NW with secondary W energy).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwellComponent {
    /// Significant height (meters)
    pub height: f64,
    /// Period (seconds)
    pub period: f64,
    /// Direction (degrees)
    pub direction: f64,
    /// Confidence 0-1
    pub confidence: f64,
    /// Source label (buoy, buoy_spectral, model, ...)
    pub source: String,
    pub quality_flag: QualityFlag,
}

/// A distinct swell event with a lifecycle and one or more components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwellEvent {
    pub event_id: String,
    pub start_time: Option<DateTime<Utc>>,
    pub peak_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Primary direction (degrees)
    pub primary_direction: Option<f64>,
    /// Significance 0-1
    pub significance: f64,
    /// Hawaiian-scale face height (feet)
    pub hawaii_scale: Option<f64>,
    pub source: String,
    pub quality_flag: QualityFlag,
    pub primary_components: Vec<SwellComponent>,
    #[serde(default)]
    pub secondary_components: Vec<SwellComponent>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl SwellEvent {
    /// Normalize lifecycle invariants: an event always has an end time
    /// (defaulting to the peak) and start ≤ peak ≤ end when all are present.
    pub fn normalize_lifecycle(&mut self) {
        if self.end_time.is_none() {
            self.end_time = self.peak_time;
        }
        if let (Some(start), Some(peak)) = (self.start_time, self.peak_time) {
            if start > peak {
                self.start_time = Some(peak);
            }
        }
        if let (Some(peak), Some(end)) = (self.peak_time, self.end_time) {
            if end < peak {
                self.end_time = Some(peak);
            }
        }
    }

    /// 16-point compass rendering of the primary direction.
    pub fn primary_direction_cardinal(&self) -> Option<&'static str> {
        self.primary_direction.map(degrees_to_compass)
    }

    /// Dominant period: maximum over primary components, 0 when empty.
    pub fn dominant_period(&self) -> f64 {
        self.primary_components
            .iter()
            .map(|c| c.period)
            .fold(0.0, f64::max)
    }

    /// Whether at least one component survives quality filtering.
    pub fn has_valid_component(&self) -> bool {
        self.primary_components
            .iter()
            .chain(self.secondary_components.iter())
            .any(|c| c.quality_flag != QualityFlag::Excluded)
    }
}

/// A named shore for which forecasts are generated.
///
/// `event_indexes` refers into the owning forecast's `swell_events` slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastLocation {
    pub name: String,
    pub shore: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Direction the shore faces (degrees)
    pub facing_direction: f64,
    /// Indexes into `SwellForecast::swell_events` for events affecting this shore.
    #[serde(default)]
    pub event_indexes: Vec<usize>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ForecastLocation {
    /// Normalized shore key, e.g. "North Shore" → "north_shore".
    pub fn shore_key(&self) -> String {
        self.shore.to_lowercase().replace(' ', "_")
    }
}

/// A complete fused swell forecast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwellForecast {
    pub forecast_id: String,
    pub generated_time: DateTime<Utc>,
    /// Sorted by significance descending, then start time.
    pub swell_events: Vec<SwellEvent>,
    pub locations: Vec<ForecastLocation>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl SwellForecast {
    /// Events attached to a location, resolved through the index arena.
    pub fn events_for<'a>(&'a self, location: &ForecastLocation) -> Vec<&'a SwellEvent> {
        location
            .event_indexes
            .iter()
            .filter_map(|&i| self.swell_events.get(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::buoy::parse_rfc3339;

    fn event() -> SwellEvent {
        SwellEvent {
            event_id: "test".into(),
            start_time: parse_rfc3339("2025-10-08T00:00:00Z"),
            peak_time: parse_rfc3339("2025-10-08T12:00:00Z"),
            end_time: None,
            primary_direction: Some(315.0),
            significance: 0.8,
            hawaii_scale: Some(8.0),
            source: "buoy".into(),
            quality_flag: QualityFlag::Valid,
            primary_components: vec![
                SwellComponent {
                    height: 2.5,
                    period: 14.0,
                    direction: 315.0,
                    confidence: 0.9,
                    source: "buoy".into(),
                    quality_flag: QualityFlag::Valid,
                },
                SwellComponent {
                    height: 1.0,
                    period: 9.0,
                    direction: 60.0,
                    confidence: 0.6,
                    source: "buoy".into(),
                    quality_flag: QualityFlag::Valid,
                },
            ],
            secondary_components: vec![],
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn end_time_defaults_to_peak() {
        let mut e = event();
        e.normalize_lifecycle();
        assert_eq!(e.end_time, e.peak_time);
    }

    #[test]
    fn lifecycle_ordering_enforced() {
        let mut e = event();
        e.start_time = parse_rfc3339("2025-10-09T00:00:00Z"); // after peak
        e.normalize_lifecycle();
        assert!(e.start_time.unwrap() <= e.peak_time.unwrap());
    }

    #[test]
    fn cardinal_conversion_wraps() {
        let mut e = event();
        e.primary_direction = Some(315.0);
        assert_eq!(e.primary_direction_cardinal(), Some("NW"));
        e.primary_direction = Some(315.0 - 360.0);
        assert_eq!(e.primary_direction_cardinal(), Some("NW"));
        e.primary_direction = Some(315.0 + 360.0);
        assert_eq!(e.primary_direction_cardinal(), Some("NW"));
    }

    #[test]
    fn dominant_period_is_component_max() {
        assert_eq!(event().dominant_period(), 14.0);
    }
}
