//! Calendar-specific error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: i64 },

    #[error("Series regeneration incomplete: {created} of {planned} instances created")]
    PartialRegeneration {
        created: usize,
        planned: usize,
        #[source]
        source: Box<CalendarError>,
    },

    #[error("API error: {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl CalendarError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a not found error for a record kind.
    pub fn not_found(kind: &'static str, id: i64) -> Self {
        Self::NotFound { kind, id }
    }

    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => format!("Invalid input: {}", msg),
            Self::NotFound { kind, .. } => format!("{} no longer exists. Please refresh.", kind),
            Self::PartialRegeneration { .. } => {
                "The series could not be fully rebuilt. Please refresh and try again.".to_string()
            }
            Self::Api { .. } => "Calendar request failed. Please try again.".to_string(),
            Self::Network(_) => "Network error. Check your connection.".to_string(),
        }
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_)) || matches!(self, Self::Api { status, .. } if *status >= 500)
    }
}
