//! Deterministic wave physics for swell forecasting.
//!
//! All math here is pure physics - no model output, no LLM involvement:
//! - great-circle distances (haversine)
//! - deep-water group velocity and storm-to-Hawaii arrival times
//! - swell significance scoring
//! - Hawaiian-scale height conversion

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Standard gravity (m/s²)
pub const GRAVITY: f64 = 9.81;
/// Earth radius in nautical miles
pub const EARTH_RADIUS_NM: f64 = 3440.065;
/// Meters per nautical mile
pub const NAUTICAL_MILE_M: f64 = 1852.0;
/// m/s → knots
pub const MS_TO_KNOTS: f64 = 1.94384;
/// Meters → Hawaiian-scale face feet
pub const HAWAII_SCALE_FT_PER_M: f64 = 6.56168;

/// Reference point for swell arrivals (approximate center of the islands).
pub const HAWAII_LAT: f64 = 21.5;
pub const HAWAII_LON: f64 = -158.0;

/// Haversine great-circle distance in nautical miles.
pub fn haversine_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * a.sqrt().asin() * EARTH_RADIUS_NM
}

/// Haversine distance in kilometers (used for nearshore point filtering).
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    haversine_nm(lat1, lon1, lat2, lon2) * NAUTICAL_MILE_M / 1000.0
}

/// Deep-water group velocity `Cg = g·T/(4π)` in m/s.
pub fn group_velocity_ms(period_seconds: f64) -> f64 {
    GRAVITY * period_seconds / (4.0 * std::f64::consts::PI)
}

/// Details of one propagation calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagationDetails {
    pub distance_nm: f64,
    pub travel_time_hours: f64,
    pub group_velocity_ms: f64,
    pub group_velocity_knots: f64,
}

/// Deep-water swell propagation calculator targeting Hawaii.
#[derive(Debug, Clone, Default)]
pub struct SwellPropagationCalculator;

impl SwellPropagationCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Arrival time at Hawaii for swell generated at (`source_lat`,
    /// `source_lon`) with the given period, plus the propagation details.
    pub fn calculate_arrival(
        &self,
        source_lat: f64,
        source_lon: f64,
        period_seconds: f64,
        generation_time: DateTime<Utc>,
    ) -> (DateTime<Utc>, PropagationDetails) {
        let distance_nm = haversine_nm(source_lat, source_lon, HAWAII_LAT, HAWAII_LON);
        let cg_ms = group_velocity_ms(period_seconds);
        let travel_secs = distance_nm * NAUTICAL_MILE_M / cg_ms;
        let travel_hours = travel_secs / 3600.0;

        let arrival = generation_time + Duration::seconds(travel_secs as i64);
        (
            arrival,
            PropagationDetails {
                distance_nm,
                travel_time_hours: travel_hours,
                group_velocity_ms: cg_ms,
                group_velocity_knots: cg_ms * MS_TO_KNOTS,
            },
        )
    }
}

/// Significance score for a swell: `min(1, H/5)·min(1.5, T/10)` clipped to
/// [0,1]. H in meters, T in seconds.
pub fn significance(height_m: Option<f64>, period_s: Option<f64>) -> f64 {
    let Some(height) = height_m else { return 0.0 };
    let mut sig = (height / 5.0).min(1.0);
    if let Some(period) = period_s {
        sig *= (period / 10.0).min(1.5);
    }
    sig.min(1.0)
}

/// Hawaiian-scale conversion: face height in feet from significant meters.
pub fn hawaii_scale_ft(meters: f64) -> f64 {
    meters * HAWAII_SCALE_FT_PER_M
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_rfc3339;

    #[test]
    fn hawaii_scale_round_trips() {
        for m in [0.5, 1.0, 2.3, 5.0] {
            let ft = hawaii_scale_ft(m);
            assert!((ft / HAWAII_SCALE_FT_PER_M - m).abs() < 1e-6);
        }
    }

    #[test]
    fn group_velocity_for_14s_swell() {
        // Cg = 9.81 * 14 / (4π) ≈ 10.93 m/s ≈ 21.2 kt
        let cg = group_velocity_ms(14.0);
        assert!((cg - 10.928).abs() < 0.01, "got {cg}");
        let kt = cg * MS_TO_KNOTS;
        assert!((21.0..22.0).contains(&kt), "got {kt} kt");
    }

    #[test]
    fn storm_arrival_within_expected_window() {
        // 985 mb low at 45N 160W, 14 s swell, generated 2025-10-07T00:00Z.
        // ~1414 nm at Cg ≈ 21.2 kt → travel ≈ 66-67 h, arrival Oct 9 evening.
        let calc = SwellPropagationCalculator::new();
        let gen_time = parse_rfc3339("2025-10-07T00:00:00Z").unwrap();
        let (arrival, details) = calc.calculate_arrival(45.0, -160.0, 14.0, gen_time);

        assert!(
            (1380.0..=1450.0).contains(&details.distance_nm),
            "distance {:.0} nm",
            details.distance_nm
        );
        assert!(
            (60.0..=72.0).contains(&details.travel_time_hours),
            "travel {:.1} h outside window",
            details.travel_time_hours
        );
        assert!(
            (details.group_velocity_knots - 21.5).abs() < 1.0,
            "Cg {:.1} kt",
            details.group_velocity_knots
        );
        assert!(arrival >= parse_rfc3339("2025-10-09T12:00:00Z").unwrap());
        assert!(arrival < parse_rfc3339("2025-10-10T00:00:00Z").unwrap());
    }

    #[test]
    fn significance_scales_with_height_and_period() {
        assert_eq!(significance(None, Some(12.0)), 0.0);
        // 3m @ 14s: (3/5)*1.4 = 0.84
        assert!((significance(Some(3.0), Some(14.0)) - 0.84).abs() < 1e-9);
        // Clipped at 1.0
        assert_eq!(significance(Some(6.0), Some(20.0)), 1.0);
        // Short period damps significance
        assert!(significance(Some(3.0), Some(6.0)) < significance(Some(3.0), Some(14.0)));
    }

    #[test]
    fn haversine_symmetry_and_zero() {
        assert!(haversine_nm(21.5, -158.0, 21.5, -158.0).abs() < 1e-9);
        let d1 = haversine_nm(45.0, -160.0, 21.5, -158.0);
        let d2 = haversine_nm(21.5, -158.0, 45.0, -160.0);
        assert!((d1 - d2).abs() < 1e-9);
    }
}
