//! Unified error types for teatime

use crate::types::ReservationStep;
use thiserror::Error;

/// Unified error type for all teatime operations
#[derive(Error, Debug)]
pub enum TeatimeError {
    // Browser errors
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    // Authentication errors
    #[error("Authentication failed: {0}")]
    Auth(String),

    // Classification errors
    #[error("Unknown page variant at {url}")]
    UnknownVariant { url: String },

    // Extraction errors
    #[error("Slot extraction failed: {0}")]
    Extraction(String),

    // Booking errors
    #[error("No available slot matches the target")]
    NoAvailableSlot,

    #[error("Reservation step {step} failed: {detail}")]
    Step {
        step: ReservationStep,
        detail: String,
    },

    // Run control
    #[error("Run deadline exceeded")]
    DeadlineExceeded,

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl TeatimeError {
    /// Whether the retry controller may retry the failed operation.
    ///
    /// Transient failures are the navigation/timeout/stale-element class where
    /// a second attempt can plausibly succeed. Classification failures, lack
    /// of availability, deadlines, and configuration errors are not in that
    /// class: retrying cannot change the outcome.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Browser(_)
                | Self::Navigation(_)
                | Self::ElementNotFound(_)
                | Self::Script(_)
                | Self::Auth(_)
                | Self::Extraction(_)
                | Self::Step { .. }
        )
    }

    /// The failing reservation step, if this error came out of the driver.
    pub fn failed_step(&self) -> Option<ReservationStep> {
        match self {
            Self::Step { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Result type alias using TeatimeError
pub type Result<T> = std::result::Result<T, TeatimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(TeatimeError::Navigation("timeout".into()).is_transient());
        assert!(TeatimeError::ElementNotFound(".slotTime".into()).is_transient());
        assert!(TeatimeError::Extraction("no grid cells".into()).is_transient());
        assert!(TeatimeError::Auth("login form still present".into()).is_transient());

        assert!(!TeatimeError::NoAvailableSlot.is_transient());
        assert!(!TeatimeError::UnknownVariant {
            url: "https://example.com".into()
        }
        .is_transient());
        assert!(!TeatimeError::DeadlineExceeded.is_transient());
        assert!(!TeatimeError::Config("bad offset".into()).is_transient());
    }

    #[test]
    fn step_errors_name_the_step() {
        let err = TeatimeError::Step {
            step: ReservationStep::Submit,
            detail: "submission rejected".into(),
        };
        assert_eq!(err.failed_step(), Some(ReservationStep::Submit));
        assert!(err.to_string().contains("submit"));
    }
}
