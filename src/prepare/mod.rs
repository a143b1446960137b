//! Forecast-data preparation.
//!
//! Takes a fused `SwellForecast` and produces the prompt-ready structure the
//! specialists consume: quality-filtered events, per-shore digests, the
//! overall data digest, seasonal context, selected bundle images, and a
//! token estimate for budget guarding. This stage is the primary quality
//! gate — excluded data never reaches an LLM.

mod context;
mod images;

pub use context::*;
pub use images::*;

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::config::{ImageConfig, PathConfig};
use crate::types::{Metadata, QualityFlag, SwellForecast};

/// Surf season, by month: winter Nov-Mar, spring Apr-May, summer Jun-Aug,
/// fall Sep-Oct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub fn from_month(month: u32) -> Self {
        match month {
            11 | 12 | 1..=3 => Season::Winter,
            4 | 5 => Season::Spring,
            6..=8 => Season::Summer,
            _ => Season::Fall,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Fall => "fall",
        }
    }
}

/// Typical seasonal pattern for one shore.
#[derive(Debug, Clone, Serialize)]
pub struct ShoreSeasonalPattern {
    pub primary_swell_direction: &'static str,
    pub typical_size_range: &'static str,
    pub quality: &'static str,
    pub consistency: &'static str,
    pub typical_conditions: &'static str,
}

/// Seasonal context for prompt framing.
#[derive(Debug, Clone, Serialize)]
pub struct SeasonalContext {
    pub season: Season,
    pub month: u32,
    pub patterns: BTreeMap<String, ShoreSeasonalPattern>,
}

/// Seasonal context for a date: the North/South Shore patterns of the
/// current season.
pub fn seasonal_context(now: DateTime<Utc>) -> SeasonalContext {
    let month = now.month();
    let season = Season::from_month(month);

    let (north, south) = match season {
        Season::Winter => (
            ShoreSeasonalPattern {
                primary_swell_direction: "NW",
                typical_size_range: "4-12+ feet (Hawaiian)",
                quality: "High",
                consistency: "High",
                typical_conditions: "Consistent NW to N swells with varying wind conditions. Prime season for North Shore with frequent large swells.",
            },
            ShoreSeasonalPattern {
                primary_swell_direction: "Background S",
                typical_size_range: "0-2 feet (Hawaiian)",
                quality: "Low",
                consistency: "Low",
                typical_conditions: "Generally flat with occasional small background swells. Not prime season for South Shore.",
            },
        ),
        Season::Summer => (
            ShoreSeasonalPattern {
                primary_swell_direction: "Background NW",
                typical_size_range: "0-3 feet (Hawaiian)",
                quality: "Low",
                consistency: "Low",
                typical_conditions: "Generally flat with occasional small background swells. Not prime season for North Shore.",
            },
            ShoreSeasonalPattern {
                primary_swell_direction: "S to SW",
                typical_size_range: "2-5+ feet (Hawaiian)",
                quality: "High",
                consistency: "High",
                typical_conditions: "Consistent S to SW swells with generally favorable trade winds. Prime season for South Shore.",
            },
        ),
        Season::Spring => (
            ShoreSeasonalPattern {
                primary_swell_direction: "NW to N",
                typical_size_range: "3-8 feet (Hawaiian)",
                quality: "Medium-High",
                consistency: "Medium",
                typical_conditions: "Transition season with decreasing NW swells but generally good conditions with lighter winds.",
            },
            ShoreSeasonalPattern {
                primary_swell_direction: "S",
                typical_size_range: "1-3+ feet (Hawaiian)",
                quality: "Medium",
                consistency: "Medium",
                typical_conditions: "Beginning of south swell season with increasing activity and size.",
            },
        ),
        Season::Fall => (
            ShoreSeasonalPattern {
                primary_swell_direction: "NW to WNW",
                typical_size_range: "2-6+ feet (Hawaiian)",
                quality: "Medium",
                consistency: "Medium",
                typical_conditions: "Early season NW swells begin to arrive. Transition period with improving conditions as winter approaches.",
            },
            ShoreSeasonalPattern {
                primary_swell_direction: "S to SSW",
                typical_size_range: "1-3 feet (Hawaiian)",
                quality: "Medium-Low",
                consistency: "Medium-Low",
                typical_conditions: "End of south swell season with decreasing activity and size.",
            },
        ),
    };

    let mut patterns = BTreeMap::new();
    patterns.insert("north_shore".to_string(), north);
    patterns.insert("south_shore".to_string(), south);

    SeasonalContext {
        season,
        month,
        patterns,
    }
}

/// One shore's slice of the prepared forecast.
#[derive(Debug, Clone)]
pub struct PreparedShore {
    pub name: String,
    pub shore_key: String,
    pub latitude: f64,
    pub longitude: f64,
    pub facing_direction: f64,
    /// Quality-filtered events affecting this shore
    pub events: Vec<crate::types::SwellEvent>,
    pub metadata: Metadata,
}

/// Prompt-ready forecast data.
#[derive(Debug, Clone)]
pub struct PreparedForecast {
    pub forecast_id: String,
    pub start_date: String,
    pub end_date: String,
    /// Quality-filtered events, excluded data removed
    pub swell_events: Vec<crate::types::SwellEvent>,
    pub shores: BTreeMap<String, PreparedShore>,
    pub confidence: Option<Value>,
    pub metadata: Metadata,
    pub seasonal_context: SeasonalContext,
    pub images: BundleImages,
    pub selected_images: Vec<SelectedImage>,
    pub data_digest: String,
    pub shore_digests: BTreeMap<String, String>,
    pub excluded_events: usize,
    pub excluded_components: usize,
}

/// Prepares fused forecasts for specialist consumption.
pub struct ForecastDataPreparer {
    image_config: ImageConfig,
    paths: PathConfig,
    climatology: ClimatologyLookup,
}

impl ForecastDataPreparer {
    pub fn new(image_config: ImageConfig, paths: PathConfig) -> Self {
        let climatology = ClimatologyLookup::load(&paths.climatology_lookup);
        Self {
            image_config,
            paths,
            climatology,
        }
    }

    /// Prepare a fused forecast: filter excluded data, build digests,
    /// collect/select bundle images, and attach seasonal context.
    pub fn prepare(
        &self,
        forecast: &SwellForecast,
        bundle_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> PreparedForecast {
        let mut excluded_events = 0usize;
        let mut excluded_components = 0usize;

        // Quality gate: drop excluded events and excluded components inside
        // surviving events; an event with nothing left is dropped too.
        let mut events = Vec::new();
        for event in &forecast.swell_events {
            if event.quality_flag == QualityFlag::Excluded {
                excluded_events += 1;
                warn!(
                    event = %event.event_id,
                    direction = ?event.primary_direction_cardinal(),
                    "Excluding swell event from forecast (quality_flag=excluded)"
                );
                continue;
            }

            let mut filtered = event.clone();
            let before =
                filtered.primary_components.len() + filtered.secondary_components.len();
            filtered
                .primary_components
                .retain(|c| c.quality_flag != QualityFlag::Excluded);
            filtered
                .secondary_components
                .retain(|c| c.quality_flag != QualityFlag::Excluded);
            let dropped = before
                - filtered.primary_components.len()
                - filtered.secondary_components.len();
            if dropped > 0 {
                excluded_components += dropped;
                warn!(
                    event = %event.event_id,
                    dropped,
                    "Excluding components from event"
                );
            }

            if filtered.primary_components.is_empty() && filtered.secondary_components.is_empty() {
                excluded_events += 1;
                warn!(
                    event = %event.event_id,
                    "Excluding event - no valid components remaining after filtering"
                );
                continue;
            }
            events.push(filtered);
        }

        if excluded_events > 0 || excluded_components > 0 {
            info!(
                excluded_events,
                excluded_components, "Quality filtering removed data before prompt assembly"
            );
        }

        // Shore slices resolve event indexes against the ORIGINAL slice,
        // then re-filter so excluded data is unobservable downstream.
        let mut shores = BTreeMap::new();
        for location in &forecast.locations {
            let shore_events: Vec<crate::types::SwellEvent> = forecast
                .events_for(location)
                .into_iter()
                .filter(|e| e.quality_flag != QualityFlag::Excluded)
                .filter(|e| e.has_valid_component())
                .map(|e| {
                    let mut copy = e.clone();
                    copy.primary_components
                        .retain(|c| c.quality_flag != QualityFlag::Excluded);
                    copy.secondary_components
                        .retain(|c| c.quality_flag != QualityFlag::Excluded);
                    copy
                })
                .collect();

            shores.insert(
                location.shore_key(),
                PreparedShore {
                    name: location.shore.clone(),
                    shore_key: location.shore_key(),
                    latitude: location.latitude,
                    longitude: location.longitude,
                    facing_direction: location.facing_direction,
                    events: shore_events,
                    metadata: location.metadata.clone(),
                },
            );
        }

        // Bundle images
        let images = match bundle_id {
            Some(id) => collect_bundle_images(&self.paths.data_dir, id),
            None => BundleImages::default(),
        };
        let selected_images = select_critical_images(&images, &self.image_config);

        // Digests
        let confidence = forecast.metadata.get("confidence").cloned();
        let data_digest = build_data_digest(
            &forecast.metadata,
            confidence.as_ref(),
            &events,
            &self.climatology,
            now,
        );
        let shore_digests: BTreeMap<String, String> = shores
            .values()
            .map(|shore| {
                let view = ShoreView {
                    name: shore.name.clone(),
                    shore_key: shore.shore_key.clone(),
                    events: shore.events.clone(),
                    metadata: shore.metadata.clone(),
                };
                (shore.shore_key.clone(), build_shore_digest(&view))
            })
            .collect();

        PreparedForecast {
            forecast_id: forecast.forecast_id.clone(),
            start_date: now.format("%Y-%m-%d").to_string(),
            end_date: (now + Duration::days(2)).format("%Y-%m-%d").to_string(),
            swell_events: events,
            shores,
            confidence,
            metadata: forecast.metadata.clone(),
            seasonal_context: seasonal_context(now),
            images,
            selected_images,
            data_digest,
            shore_digests,
            excluded_events,
            excluded_components,
        }
    }

    /// Estimated token usage for the synthesis call:
    /// `text_chars/4 + base 5000 + output 10000 + Σ image tokens`.
    pub fn estimate_tokens(&self, prepared: &PreparedForecast) -> usize {
        let text_chars = prepared.data_digest.len()
            + prepared
                .shore_digests
                .values()
                .map(String::len)
                .sum::<usize>()
            + serde_json::to_string(&prepared.swell_events)
                .map(|s| s.len())
                .unwrap_or(0);

        let image_tokens: usize = prepared
            .selected_images
            .iter()
            .map(|img| img.detail.token_cost())
            .sum();

        text_chars / 4 + 5000 + 10_000 + image_tokens
    }
}
