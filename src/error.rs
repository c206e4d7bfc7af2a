use thiserror::Error;

/// Errors surfaced by the study engine.
///
/// A missing record is never an error: it reads as the initial state.
/// An empty practice pool is reported as `None` by the selector.
#[derive(Debug, Error)]
pub enum StudyError {
    #[error("invalid review quality '{0}' (expected hard, good or easy)")]
    InvalidQuality(String),

    #[error("{name} must be a finite fraction in [0, 1], got {value}")]
    InvalidFraction { name: &'static str, value: f64 },

    #[error("malformed key: {0}")]
    MalformedKey(String),

    #[error("counters only move forward, got delta {0}")]
    NegativeDelta(i64),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("stored value at '{key}' is not a valid counter")]
    CorruptValue { key: String },

    #[error("storage medium unavailable: {0}")]
    MediumUnavailable(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StudyError {
    /// True for errors caused by the caller passing bad data, as opposed to
    /// the medium failing underneath us.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            StudyError::InvalidQuality(_)
                | StudyError::InvalidFraction { .. }
                | StudyError::MalformedKey(_)
                | StudyError::NegativeDelta(_)
                | StudyError::InvalidConfig(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StudyError>;
