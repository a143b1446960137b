//! Crate-wide error taxonomy for the forecast pipeline.
//!
//! Non-fatal conditions (bounds rejections, stale data, spectrum parse
//! failures) are handled in place and never surface here; this module only
//! names the errors that abort a stage or the whole request.

use thiserror::Error;

use crate::llm::LlmError;

/// Errors raised by the fusion stage.
#[derive(Debug, Error)]
pub enum FusionError {
    #[error("Missing {0} section in input data")]
    MissingSection(&'static str),

    #[error("No data sources provided for fusion")]
    NoSources,
}

/// Errors raised by a single specialist call.
#[derive(Debug, Error)]
pub enum SpecialistError {
    #[error("Invalid specialist input: {0}")]
    InvalidInput(String),

    #[error("No valid image files found among {0} candidates")]
    NoValidImages(usize),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Errors that abort an entire forecast request.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Fusion(#[from] FusionError),

    #[error("Insufficient specialists: need {required}, have {available} with sufficient confidence")]
    InsufficientSpecialists { required: usize, available: usize },

    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    #[error("Specialist failure: {0}")]
    Specialist(#[from] SpecialistError),
}

impl EngineError {
    /// Process exit code for the CLI driver.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::InsufficientSpecialists { .. } => 2,
            EngineError::LlmUnavailable(_) => 3,
            _ => 1,
        }
    }
}
