use thiserror::Error;

/// Failures surfaced by the I/O-touching parts of the engine.
///
/// Classification and analytics are total and never produce one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// No location permission or no fix. The schedule simply stays unset.
    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    /// The ephemeris provider failed; any previously cached schedule is kept.
    #[error("Prayer time calculation failed: {0}")]
    EphemerisFailure(String),

    /// A durable read or write failed. In-memory state is not rolled back.
    #[error("Persistence error: {0}")]
    PersistenceFailure(String),

    /// The notification platform rejected a single reminder operation.
    #[error("Scheduling error: {0}")]
    SchedulingFailure(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl EngineError {
    /// Whether a retry affordance makes sense for this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::EphemerisFailure(_)
                | EngineError::PersistenceFailure(_)
                | EngineError::SchedulingFailure(_)
        )
    }

    /// Short text for a front-end status line.
    pub fn user_message(&self) -> &'static str {
        match self {
            EngineError::LocationUnavailable(_) => "Location unavailable; set it with `setup`",
            EngineError::EphemerisFailure(_) => "Could not compute prayer times; try again",
            EngineError::PersistenceFailure(_) => "Saved for this session only; storage failed",
            EngineError::SchedulingFailure(_) => "Some reminders could not be scheduled",
            EngineError::InvalidInput(_) => "Invalid input",
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::PersistenceFailure(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::PersistenceFailure(format!("Serialization: {}", e))
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
