//! services/learner/src/session/mod.rs
//!
//! The learning session orchestrator: identity resolution, content generation,
//! quiz evaluation and the lifecycle state machine that binds them.

pub mod identity;
pub mod lifecycle;
pub mod pipeline;
pub mod quiz;
pub mod state;

pub use identity::{IdentityResolver, Session};
pub use lifecycle::{RequestId, SessionController, SessionEvent};
pub use pipeline::ContentPipeline;
pub use quiz::{ProgressRecorder, QuizRound};
pub use state::{AppServices, ErrorOrigin, QuotaHint, SessionPhase};

use vocab_core::domain::DomainError;

/// Everything that can go wrong in a learning session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No token, or the backend refused the one we have.
    #[error("Not signed in")]
    Unauthenticated,
    /// The tier's generation quota is used up. Not retryable this session.
    #[error("Generation quota exceeded: {0}")]
    QuotaExceeded(String),
    /// A transient upstream failure. Resubmitting the word may succeed.
    #[error("Content generation failed: {0}")]
    GenerationFailed(String),
    /// Only ever logged.
    #[error("Progress write failed: {0}")]
    ProgressWriteFailed(String),
    #[error("Progress could not be loaded: {0}")]
    ProgressUnavailable(String),
    #[error("Incorrect email or password")]
    InvalidCredentials,
    #[error("Signup rejected: {0}")]
    SignupRejected(String),
    #[error("Identity service unavailable: {0}")]
    IdentityUnavailable(String),
    #[error("Invalid word: {0}")]
    InvalidWord(#[from] DomainError),
    #[error("'{0}' is not one of the quiz options")]
    InvalidChoice(String),
    #[error("Cannot {action} while {phase}")]
    InvalidState {
        action: &'static str,
        phase: &'static str,
    },
}

impl SessionError {
    /// The message shown to the learner. Each kind gets its own wording.
    pub fn user_message(&self) -> &'static str {
        match self {
            SessionError::Unauthenticated => "Please log in to keep learning.",
            SessionError::QuotaExceeded(_) => {
                "You've learned all your words for today! Come back tomorrow or ask a grown-up about upgrading."
            }
            SessionError::GenerationFailed(_) => {
                "Oops, we couldn't make your lesson. Try the same word again."
            }
            SessionError::ProgressWriteFailed(_) => "Your progress could not be saved.",
            SessionError::ProgressUnavailable(_) => "We couldn't load your progress right now.",
            SessionError::InvalidCredentials => "That email or password doesn't look right.",
            SessionError::SignupRejected(_) => "We couldn't create that account. Maybe it already exists?",
            SessionError::IdentityUnavailable(_) => {
                "We couldn't reach the learning server. Try again in a moment."
            }
            SessionError::InvalidWord(_) => "Type a word to learn first.",
            SessionError::InvalidChoice(_) => "Pick one of the answers shown.",
            SessionError::InvalidState { .. } => "That can't be done right now.",
        }
    }

    /// Whether the explicit retry action can recover from this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::GenerationFailed(_) | SessionError::IdentityUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_kind_has_a_distinct_message() {
        let errors = [
            SessionError::Unauthenticated,
            SessionError::QuotaExceeded(String::new()),
            SessionError::GenerationFailed(String::new()),
            SessionError::ProgressWriteFailed(String::new()),
            SessionError::ProgressUnavailable(String::new()),
            SessionError::InvalidCredentials,
            SessionError::SignupRejected(String::new()),
            SessionError::IdentityUnavailable(String::new()),
            SessionError::InvalidWord(DomainError::EmptyWord),
            SessionError::InvalidChoice(String::new()),
            SessionError::InvalidState {
                action: "learn",
                phase: "loading",
            },
        ];
        let messages: HashSet<_> = errors.iter().map(|e| e.user_message()).collect();
        assert_eq!(messages.len(), errors.len());
    }

    #[test]
    fn quota_is_not_retryable() {
        assert!(!SessionError::QuotaExceeded("cap".to_string()).is_retryable());
        assert!(SessionError::GenerationFailed("503".to_string()).is_retryable());
    }
}
