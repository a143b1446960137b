//! Reliability and confidence scoring.
//!
//! - `source`: per-source tiered reliability (tier × freshness ×
//!   completeness × accuracy), attached to inputs as fusion weights
//! - `confidence`: the five-factor forecast confidence model

mod confidence;
mod source;

pub use confidence::*;
pub use source::*;
