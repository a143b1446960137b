//! Per-source processors.
//!
//! Each processor takes one raw feed (buoy, weather, wave model), cleans it,
//! runs trend/anomaly/impact analysis, and emits a processed record the
//! fusion engine consumes. Processors share no mutable state and may run in
//! parallel over disjoint inputs.

mod buoy;
mod wave_model;
mod weather;

pub use buoy::*;
pub use wave_model::*;
pub use weather::*;

use serde::{Deserialize, Serialize};

/// Trend category from a simple linear slope (units per observation step).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendCategory {
    InsufficientData,
    Steady,
    IncreasingSlight,
    IncreasingModerate,
    IncreasingStrong,
    DecreasingSlight,
    DecreasingModerate,
    DecreasingStrong,
}

impl TrendCategory {
    /// Categorize a slope: |s|<0.01 steady; >0.1 strong; >0.05 moderate;
    /// >0 slight; negatives symmetric.
    pub fn from_slope(slope: f64) -> Self {
        if slope.abs() < 0.01 {
            TrendCategory::Steady
        } else if slope > 0.1 {
            TrendCategory::IncreasingStrong
        } else if slope > 0.05 {
            TrendCategory::IncreasingModerate
        } else if slope > 0.0 {
            TrendCategory::IncreasingSlight
        } else if slope < -0.1 {
            TrendCategory::DecreasingStrong
        } else if slope < -0.05 {
            TrendCategory::DecreasingModerate
        } else {
            TrendCategory::DecreasingSlight
        }
    }

    pub fn is_building(self) -> bool {
        matches!(
            self,
            TrendCategory::IncreasingStrong | TrendCategory::IncreasingModerate
        )
    }

    pub fn is_fading(self) -> bool {
        matches!(
            self,
            TrendCategory::DecreasingStrong | TrendCategory::DecreasingModerate
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrendCategory::InsufficientData => "insufficient_data",
            TrendCategory::Steady => "steady",
            TrendCategory::IncreasingSlight => "increasing_slight",
            TrendCategory::IncreasingModerate => "increasing_moderate",
            TrendCategory::IncreasingStrong => "increasing_strong",
            TrendCategory::DecreasingSlight => "decreasing_slight",
            TrendCategory::DecreasingModerate => "decreasing_moderate",
            TrendCategory::DecreasingStrong => "decreasing_strong",
        }
    }
}

impl std::fmt::Display for TrendCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Simple linear trend over chronological values:
/// `slope = (x_last − x_first)/(N−1)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrendSummary {
    pub slope: f64,
    pub category: TrendCategory,
}

impl TrendSummary {
    /// Compute the trend of chronological (oldest→newest) values.
    pub fn of(values: &[f64]) -> Self {
        if values.len() < 2 {
            return Self {
                slope: 0.0,
                category: TrendCategory::InsufficientData,
            };
        }
        let slope = (values[values.len() - 1] - values[0]) / (values.len() - 1) as f64;
        Self {
            slope,
            category: TrendCategory::from_slope(slope),
        }
    }
}

/// Circular mean of directions in degrees, `None` for empty input.
pub fn circular_mean_degrees(directions: &[f64]) -> Option<f64> {
    if directions.is_empty() {
        return None;
    }
    let (sin_sum, cos_sum) = directions.iter().fold((0.0, 0.0), |(s, c), d| {
        let r = d.to_radians();
        (s + r.sin(), c + r.cos())
    });
    Some((sin_sum.atan2(cos_sum).to_degrees() + 360.0) % 360.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slope_categories() {
        assert_eq!(TrendCategory::from_slope(0.005), TrendCategory::Steady);
        assert_eq!(TrendCategory::from_slope(0.02), TrendCategory::IncreasingSlight);
        assert_eq!(TrendCategory::from_slope(0.07), TrendCategory::IncreasingModerate);
        assert_eq!(TrendCategory::from_slope(0.2), TrendCategory::IncreasingStrong);
        assert_eq!(TrendCategory::from_slope(-0.07), TrendCategory::DecreasingModerate);
        assert_eq!(TrendCategory::from_slope(-0.2), TrendCategory::DecreasingStrong);
    }

    #[test]
    fn trend_slope_is_endpoint_difference() {
        let t = TrendSummary::of(&[1.0, 1.3, 1.6, 1.9]);
        assert!((t.slope - 0.3).abs() < 1e-9);
        assert_eq!(t.category, TrendCategory::IncreasingStrong);

        let t = TrendSummary::of(&[2.0]);
        assert_eq!(t.category, TrendCategory::InsufficientData);
    }

    #[test]
    fn circular_mean_handles_wrap() {
        let mean = circular_mean_degrees(&[350.0, 10.0]).unwrap();
        assert!(mean < 1.0 || mean > 359.0, "got {mean}");
        assert_eq!(circular_mean_degrees(&[]), None);
    }
}
