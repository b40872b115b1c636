//! services/learner/src/session/identity.rs
//!
//! Resolves who the learner is. Owns the only copy of the credential token and
//! the profile snapshot; nothing else in the client reads the token directly.

use crate::session::SessionError;
use std::sync::Arc;
use tracing::{info, warn};
use vocab_core::domain::{CredentialToken, Credentials, Tier, UserProfile};
use vocab_core::ports::{IdentityService, PortError};

//=========================================================================================
// Session (token + profile)
//=========================================================================================

/// The authentication state of one client session.
#[derive(Debug, Default)]
pub struct Session {
    token: Option<CredentialToken>,
    profile: Option<UserProfile>,
}

impl Session {
    pub fn with_token(token: CredentialToken) -> Self {
        Self {
            token: Some(token),
            profile: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.profile.is_some()
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// The token to attach to an outbound call.
    pub(crate) fn bearer(&self) -> Result<&CredentialToken, SessionError> {
        self.token.as_ref().ok_or(SessionError::Unauthenticated)
    }

    /// Replaces any previous identity with a freshly issued token.
    pub(crate) fn install(&mut self, token: CredentialToken) {
        self.token = Some(token);
        self.profile = None;
    }

    pub(crate) fn set_profile(&mut self, profile: UserProfile) {
        self.profile = Some(profile);
    }

    pub(crate) fn clear(&mut self) {
        self.token = None;
        self.profile = None;
    }
}

//=========================================================================================
// IdentityResolver
//=========================================================================================

/// Wraps the identity port and turns its failures into session errors.
#[derive(Clone)]
pub struct IdentityResolver {
    identity: Arc<dyn IdentityService>,
}

impl IdentityResolver {
    pub fn new(identity: Arc<dyn IdentityService>) -> Self {
        Self { identity }
    }

    /// Fetches the profile for the given token.
    ///
    /// An absent token or one the backend refuses yields `Unauthenticated`.
    /// The token itself is never modified here.
    pub async fn resolve(
        &self,
        token: Option<&CredentialToken>,
    ) -> Result<UserProfile, SessionError> {
        let token = token.ok_or(SessionError::Unauthenticated)?;
        match self.identity.fetch_profile(token).await {
            Ok(profile) => {
                info!("Resolved profile {} ({} tier)", profile.id, profile.tier);
                Ok(profile)
            }
            Err(e) if e.is_auth_failure() => {
                info!("Stored token was rejected by the backend.");
                Err(SessionError::Unauthenticated)
            }
            Err(e) => {
                warn!("Profile fetch failed: {}", e);
                Err(SessionError::IdentityUnavailable(e.to_string()))
            }
        }
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<CredentialToken, SessionError> {
        self.identity
            .login(credentials)
            .await
            .map_err(|e| match e {
                PortError::Unauthorized | PortError::Rejected(_) | PortError::NotFound(_) => {
                    SessionError::InvalidCredentials
                }
                other => SessionError::IdentityUnavailable(other.to_string()),
            })
    }

    pub async fn signup(
        &self,
        credentials: &Credentials,
        tier: Tier,
    ) -> Result<UserProfile, SessionError> {
        self.identity
            .signup(credentials, tier)
            .await
            .map_err(|e| match e {
                PortError::Rejected(detail) | PortError::Forbidden(detail) => {
                    SessionError::SignupRejected(detail)
                }
                other => SessionError::IdentityUnavailable(other.to_string()),
            })
    }
}
