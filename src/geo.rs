//! Hawaii-specific geographic context.
//!
//! Static shore metadata for the four Oahu shores plus the exposure and
//! seasonal lookup functions used throughout fusion and shore mapping.
//! Directions are degrees (0 = from North, clockwise); all ranges handle
//! the 0/360 wrap.

use chrono::{DateTime, Datelike, Utc};
use serde_json::json;

use crate::types::{ForecastLocation, Metadata};

/// Metadata for one Hawaiian shore.
#[derive(Debug, Clone)]
pub struct ShoreData {
    pub name: &'static str,
    pub key: &'static str,
    pub location: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    /// Direction the shore faces (degrees)
    pub facing_direction: f64,
    /// Swell direction ranges that reach this shore at all
    pub swell_exposure: &'static [(f64, f64)],
    /// Swell direction ranges that produce quality surf
    pub quality_directions: &'static [(f64, f64)],
    /// Seasonal quality rating indexed by month (Jan = index 0)
    pub seasonal_rating: [f64; 12],
    /// Well-known breaks, surfaced in shore digests
    pub popular_breaks: &'static [&'static str],
}

/// The four Oahu shores, in canonical order.
pub const SHORES: [ShoreData; 4] = [
    ShoreData {
        name: "North Shore",
        key: "north_shore",
        location: "Oahu",
        latitude: 21.6639,
        longitude: -158.0529,
        facing_direction: 0.0,
        swell_exposure: &[(270.0, 360.0), (0.0, 90.0)],
        quality_directions: &[(305.0, 340.0)],
        seasonal_rating: [0.9, 0.8, 0.7, 0.5, 0.3, 0.2, 0.1, 0.1, 0.2, 0.5, 0.7, 0.9],
        popular_breaks: &["Pipeline", "Sunset Beach", "Waimea Bay", "Haleiwa"],
    },
    ShoreData {
        name: "South Shore",
        key: "south_shore",
        location: "Oahu",
        latitude: 21.2749,
        longitude: -157.8238,
        facing_direction: 180.0,
        swell_exposure: &[(90.0, 270.0)],
        quality_directions: &[(170.0, 200.0)],
        seasonal_rating: [0.2, 0.3, 0.4, 0.6, 0.8, 0.9, 0.9, 0.9, 0.7, 0.5, 0.3, 0.2],
        popular_breaks: &["Ala Moana Bowls", "Queens", "Diamond Head"],
    },
    ShoreData {
        name: "West Shore",
        key: "west_shore",
        location: "Oahu",
        latitude: 21.4152,
        longitude: -158.1928,
        facing_direction: 270.0,
        swell_exposure: &[(210.0, 330.0)],
        quality_directions: &[(270.0, 310.0)],
        seasonal_rating: [0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7],
        popular_breaks: &["Makaha", "Yokohama Bay"],
    },
    ShoreData {
        name: "East Shore",
        key: "east_shore",
        location: "Oahu",
        latitude: 21.4813,
        longitude: -157.7040,
        facing_direction: 90.0,
        swell_exposure: &[(30.0, 150.0)],
        quality_directions: &[(60.0, 90.0)],
        seasonal_rating: [0.7, 0.8, 0.8, 0.7, 0.6, 0.5, 0.5, 0.5, 0.6, 0.6, 0.7, 0.7],
        popular_breaks: &["Makapuu", "Sandy Beach"],
    },
];

/// Hawaii-specific geographic context for surf forecasting.
#[derive(Debug, Clone, Default)]
pub struct HawaiiContext;

impl HawaiiContext {
    pub fn new() -> Self {
        Self
    }

    /// Look up a shore by name or key ("North Shore" and "north_shore" both work).
    pub fn shore(&self, shore_name: &str) -> Option<&'static ShoreData> {
        let key = shore_name.to_lowercase().replace(' ', "_");
        SHORES.iter().find(|s| s.key == key)
    }

    pub fn all_shores(&self) -> &'static [ShoreData] {
        &SHORES
    }

    /// Check whether a direction lies within a range, handling wrap at 0/360.
    pub fn is_in_range(&self, direction: f64, range: (f64, f64)) -> bool {
        let direction = direction.rem_euclid(360.0);
        let (start, end) = range;
        if start > end {
            direction >= start || direction <= end
        } else {
            (start..=end).contains(&direction)
        }
    }

    /// Whether a shore sees any energy from `direction`.
    pub fn is_exposed(&self, shore_name: &str, direction: f64) -> bool {
        self.shore(shore_name)
            .map(|s| s.swell_exposure.iter().any(|&r| self.is_in_range(direction, r)))
            .unwrap_or(false)
    }

    /// Exposure factor for a shore and swell direction.
    ///
    /// 1.0 at the midpoint of a quality range decaying linearly to 0.8 at its
    /// edges; 0.5 inside an exposure range but outside quality; 0 otherwise.
    pub fn exposure_factor(&self, shore_name: &str, direction: f64) -> f64 {
        let Some(shore) = self.shore(shore_name) else {
            return 0.0;
        };
        let direction = direction.rem_euclid(360.0);

        for &range in shore.quality_directions {
            if self.is_in_range(direction, range) {
                let (start, end) = range;
                let width = (end - start).rem_euclid(360.0);
                // Midpoint with wrap: rotate so the range starts at zero.
                let midpoint = (start + width / 2.0).rem_euclid(360.0);
                let mut distance = (direction - midpoint).abs();
                if distance > 180.0 {
                    distance = 360.0 - distance;
                }
                let normalized = if width > 0.0 { distance / (width / 2.0) } else { 0.0 };
                return (1.0 - normalized * 0.2).max(0.8);
            }
        }

        for &range in shore.swell_exposure {
            if self.is_in_range(direction, range) {
                return 0.5;
            }
        }

        0.0
    }

    /// Seasonal quality factor for a shore at a given date, 0-1.
    pub fn seasonal_factor(&self, shore_name: &str, date: DateTime<Utc>) -> f64 {
        self.shore(shore_name)
            .map(|s| s.seasonal_rating[(date.month0()) as usize])
            .unwrap_or(0.5)
    }

    /// Build a `ForecastLocation` for a shore, carrying the exposure tables
    /// and popular breaks in its metadata.
    pub fn create_forecast_location(&self, shore_name: &str) -> Option<ForecastLocation> {
        let shore = self.shore(shore_name)?;
        let mut metadata = Metadata::new();
        metadata.insert("swell_exposure".into(), json!(shore.swell_exposure));
        metadata.insert("quality_directions".into(), json!(shore.quality_directions));
        metadata.insert("seasonal_rating".into(), json!(shore.seasonal_rating));
        metadata.insert("popular_breaks".into(), json!(shore.popular_breaks));

        Some(ForecastLocation {
            name: format!("{} {}", shore.location, shore.name),
            shore: shore.name.to_string(),
            latitude: shore.latitude,
            longitude: shore.longitude,
            facing_direction: shore.facing_direction,
            event_indexes: Vec::new(),
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_rfc3339;

    #[test]
    fn north_shore_exposure_bands() {
        let ctx = HawaiiContext::new();
        // Quality midpoint (305-340 → 322.5) scores 1.0
        assert!((ctx.exposure_factor("north_shore", 322.5) - 1.0).abs() < 1e-9);
        // Quality edge decays to 0.8
        assert!((ctx.exposure_factor("north_shore", 305.0) - 0.8).abs() < 1e-9);
        // Exposed but not quality
        assert!((ctx.exposure_factor("north_shore", 45.0) - 0.5).abs() < 1e-9);
        // Shadowed
        assert_eq!(ctx.exposure_factor("north_shore", 180.0), 0.0);
    }

    #[test]
    fn exposure_zero_iff_outside_every_range() {
        let ctx = HawaiiContext::new();
        for deg in (0..360).step_by(5) {
            let d = deg as f64;
            let exposed = ctx.is_exposed("south_shore", d);
            let factor = ctx.exposure_factor("south_shore", d);
            assert_eq!(exposed, factor > 0.0, "direction {d}");
        }
    }

    #[test]
    fn wrapped_directions_are_equivalent() {
        let ctx = HawaiiContext::new();
        for d in [10.0, 322.5, 180.0] {
            let base = ctx.exposure_factor("north_shore", d);
            assert_eq!(base, ctx.exposure_factor("north_shore", d + 360.0));
            assert_eq!(base, ctx.exposure_factor("north_shore", d - 360.0));
        }
    }

    #[test]
    fn exposure_wraps_through_north() {
        let ctx = HawaiiContext::new();
        // 350° and 10° both reach the North Shore (270-360 and 0-90 bands)
        assert!(ctx.is_exposed("north_shore", 350.0));
        assert!(ctx.is_exposed("north_shore", 10.0));
    }

    #[test]
    fn seasonal_factor_reads_month() {
        let ctx = HawaiiContext::new();
        let january = parse_rfc3339("2025-01-15T00:00:00Z").unwrap();
        let july = parse_rfc3339("2025-07-15T00:00:00Z").unwrap();
        assert!((ctx.seasonal_factor("north_shore", january) - 0.9).abs() < 1e-9);
        assert!((ctx.seasonal_factor("north_shore", july) - 0.1).abs() < 1e-9);
        assert!((ctx.seasonal_factor("south_shore", july) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn forecast_location_carries_shore_metadata() {
        let ctx = HawaiiContext::new();
        let loc = ctx.create_forecast_location("north_shore").unwrap();
        assert_eq!(loc.name, "Oahu North Shore");
        assert_eq!(loc.shore_key(), "north_shore");
        assert!(loc.metadata.contains_key("popular_breaks"));
    }
}
