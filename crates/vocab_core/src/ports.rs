//! crates/vocab_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the learning client's core logic.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! session orchestrator independent of the concrete backend transport.

use async_trait::async_trait;
use crate::domain::{
    CredentialToken, Credentials, ProgressRecord, ProgressSummary, Quiz, Tier, UserProfile,
    Word,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from the transport (HTTP status codes,
/// connection failures, malformed bodies).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The credential was missing, expired or rejected (HTTP 401).
    #[error("Unauthorized")]
    Unauthorized,
    /// The caller is authenticated but not allowed to do this (HTTP 403).
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// The request itself was refused (HTTP 400/409/422).
    #[error("Request rejected: {0}")]
    Rejected(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// True for any authorization failure, 401 or 403.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, PortError::Unauthorized | PortError::Forbidden(_))
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Exchanges credentials for a bearer token.
    async fn login(&self, credentials: &Credentials) -> PortResult<CredentialToken>;

    /// Creates a new account. Does not log in.
    async fn signup(&self, credentials: &Credentials, tier: Tier) -> PortResult<UserProfile>;

    /// Reads the profile belonging to the token.
    async fn fetch_profile(&self, token: &CredentialToken) -> PortResult<UserProfile>;
}

#[async_trait]
pub trait ContentGenerationService: Send + Sync {
    /// Produces a kid-friendly sentence using the word.
    async fn generate_sentence(&self, token: &CredentialToken, word: &Word) -> PortResult<String>;

    /// Produces a quiz contextualized by a previously generated sentence.
    async fn generate_quiz(
        &self,
        token: &CredentialToken,
        word: &Word,
        sentence: &str,
    ) -> PortResult<Quiz>;

    /// Produces an illustration and returns where it can be fetched.
    async fn generate_image(&self, token: &CredentialToken, word: &Word) -> PortResult<String>;
}

#[async_trait]
pub trait ProgressService: Send + Sync {
    async fn append_progress(
        &self,
        token: &CredentialToken,
        record: &ProgressRecord,
    ) -> PortResult<()>;

    /// Reads the learner's progress. Backends may answer with dated records or
    /// with running totals only, so the port hands back the summary.
    async fn list_progress(
        &self,
        token: &CredentialToken,
        user_id: i64,
    ) -> PortResult<ProgressSummary>;
}
