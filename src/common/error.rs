//! Error types for footstep_planning

use thiserror::Error;

/// Main error type for the planner
///
/// Only configuration and request problems are errors. Rejected steps,
/// failed snaps and swing adjustment limits are ordinary outcomes and are
/// reported as values.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// A parameter bundle failed validation
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig { field: String, message: String },
    /// The goal cannot be planned to
    #[error("Invalid goal: {0}")]
    InvalidGoal(String),
    /// Path planning failed
    #[error("Planning error: {0}")]
    PlanningError(String),
    /// Numerical computation failed (singular system, etc.)
    #[error("Numerical error: {0}")]
    NumericalError(String),
    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlannerError {
    pub fn invalid_config(field: &str, message: impl Into<String>) -> Self {
        PlannerError::InvalidConfig {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;
