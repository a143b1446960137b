//! Forecast Configuration Module
//!
//! All pipeline tuning values as operator-editable TOML, replacing
//! hardcoded thresholds with configurable ones.
//!
//! ## Loading Order
//!
//! 1. `SWELLCAST_CONFIG` environment variable (path to TOML file)
//! 2. `swellcast.toml` in the current working directory
//! 3. Built-in defaults
//!
//! The loaded config is constructor-injected into the engines; there is no
//! process-global config state.

mod forecast_config;

pub use forecast_config::*;
