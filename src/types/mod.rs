//! Shared data structures for the swell forecast pipeline:
//! - bounds-validated buoy observations (NDBC ingest)
//! - weather periods (NWS ingest, units normalized)
//! - wave model runs (SWAN / WaveWatch III)
//! - swell components/events, forecast locations, fused forecasts
//! - confidence reports

pub mod bounds;
mod buoy;
mod confidence;
mod swell;
mod wave_model;
mod weather;

pub use buoy::*;
pub use confidence::*;
pub use swell::*;
pub use wave_model::*;
pub use weather::*;

/// Extensible metadata attached to records and forecasts.
pub type Metadata = serde_json::Map<String, serde_json::Value>;
