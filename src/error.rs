//! Crate-wide error taxonomy for AI orchestration.
//!
//! A deliberately small set: callers route on these categories, not on
//! backend-specific detail. "No results" is never an error — searches and
//! scorers return empty collections instead.

use thiserror::Error;

/// Errors produced by capability calls and the pipeline stages around them.
#[derive(Error, Debug, Clone)]
pub enum AiError {
    /// A deadline elapsed before the operation settled. The underlying call
    /// may still be running on the backend; its eventual result is discarded.
    #[error("'{label}' exceeded its deadline")]
    Timeout { label: String },

    /// The named capability is not present on this host.
    #[error("{0} capability is not available on this host")]
    CapabilityUnavailable(&'static str),

    /// The backend is present but the call failed.
    #[error("capability call failed: {0}")]
    CapabilityFailure(String),

    /// Structured output did not match the expected shape.
    #[error("structured output rejected: {0}")]
    ValidationFailure(String),
}

impl AiError {
    /// Timeouts and absent backends are expected degradation categories,
    /// not faults — enhancement paths swallow them silently.
    pub fn is_degradation(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::CapabilityUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_carries_label() {
        let err = AiError::Timeout {
            label: "chunk summary".to_string(),
        };
        assert_eq!(err.to_string(), "'chunk summary' exceeded its deadline");
    }

    #[test]
    fn unavailable_names_capability() {
        let err = AiError::CapabilityUnavailable("translation");
        assert!(err.to_string().contains("translation"));
    }

    #[test]
    fn degradation_classification() {
        assert!(AiError::Timeout { label: "x".into() }.is_degradation());
        assert!(AiError::CapabilityUnavailable("generative").is_degradation());
        assert!(!AiError::CapabilityFailure("boom".into()).is_degradation());
        assert!(!AiError::ValidationFailure("bad".into()).is_degradation());
    }
}
