//! Error types for Bugloop

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while running the engine.
///
/// Lookups that find nothing are not errors: lifecycle and pattern mutations
/// treat a missing id as a no-op.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid weekly diagnostic: {0}")]
    InvalidDiagnostic(String),

    #[error("Weekly diagnostic already recorded for user {user_id} in week starting {week_starting}")]
    DuplicateWeek {
        user_id: Uuid,
        week_starting: NaiveDate,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, EngineError>;
