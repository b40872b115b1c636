//! services/learner/src/adapters/identity.rs
//!
//! This module contains the adapter for the backend's account endpoints.
//! It implements the `IdentityService` port from the `core` crate.

use crate::adapters::http::BackendClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vocab_core::domain::{CredentialToken, Credentials, Tier, UserProfile};
use vocab_core::ports::{IdentityService, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `IdentityService` port over HTTP.
#[derive(Clone)]
pub struct HttpIdentityAdapter {
    client: BackendClient,
}

impl HttpIdentityAdapter {
    /// Creates a new `HttpIdentityAdapter`.
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

//=========================================================================================
// Wire Records
//=========================================================================================

#[derive(Serialize)]
struct SignupPayload<'a> {
    email: &'a str,
    password: &'a str,
    tier: &'a str,
}

#[derive(Deserialize)]
struct TokenRecord {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
}
impl TokenRecord {
    fn to_domain(self) -> PortResult<CredentialToken> {
        if let Some(kind) = &self.token_type {
            if !kind.eq_ignore_ascii_case("bearer") {
                return Err(PortError::Unexpected(format!(
                    "Unsupported token type '{}'",
                    kind
                )));
            }
        }
        if self.access_token.trim().is_empty() {
            return Err(PortError::Unexpected("Backend issued an empty token".to_string()));
        }
        Ok(CredentialToken::new(self.access_token))
    }
}

#[derive(Deserialize)]
struct UserRecord {
    id: i64,
    email: String,
    tier: String,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<UserProfile> {
        let tier = self
            .tier
            .parse::<Tier>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(UserProfile {
            id: self.id,
            email: self.email,
            tier,
        })
    }
}

//=========================================================================================
// `IdentityService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityService for HttpIdentityAdapter {
    async fn login(&self, credentials: &Credentials) -> PortResult<CredentialToken> {
        let form = [
            ("username", credentials.email.as_str()),
            ("password", credentials.password.as_str()),
        ];
        let request = self.client.post("/token").form(&form);
        let record: TokenRecord = self.client.send_json(request).await?;
        record.to_domain()
    }

    async fn signup(&self, credentials: &Credentials, tier: Tier) -> PortResult<UserProfile> {
        let payload = SignupPayload {
            email: &credentials.email,
            password: &credentials.password,
            tier: tier.as_str(),
        };
        let request = self.client.post("/users/").json(&payload);
        let record: UserRecord = self.client.send_json(request).await?;
        record.to_domain()
    }

    async fn fetch_profile(&self, token: &CredentialToken) -> PortResult<UserProfile> {
        let request = BackendClient::authorized(self.client.get("/users/me/"), token);
        let record: UserRecord = self.client.send_json(request).await?;
        record.to_domain()
    }
}
