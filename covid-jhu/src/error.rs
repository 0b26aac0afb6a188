/// Error types for the COVID pipeline
use thiserror::Error;

/// Main error type for loading, transforming and persisting case data
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CovidError {
    /// Raw file fetch failed or returned content that is not the expected table
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// A single row failed normalization; always recovered by dropping the row
    #[error("Invalid location data for {location}: {reason}")]
    LocationDataInvalid { location: String, reason: String },

    /// The artifact store could not read or write an artifact
    #[error("Persistence failure for artifact '{artifact}': {reason}")]
    PersistenceFailure { artifact: String, reason: String },
}

impl CovidError {
    pub fn invalid_location(location: impl Into<String>, reason: impl Into<String>) -> Self {
        CovidError::LocationDataInvalid {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub fn persistence(artifact: impl Into<String>, reason: impl ToString) -> Self {
        CovidError::PersistenceFailure {
            artifact: artifact.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<csv::Error> for CovidError {
    fn from(err: csv::Error) -> Self {
        CovidError::SourceUnavailable(format!("Failed to parse CSV: {}", err))
    }
}

/// Type alias for Results using CovidError
pub type Result<T> = std::result::Result<T, CovidError>;
