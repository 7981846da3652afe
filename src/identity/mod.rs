//! Identity provider gateway.
//!
//! Stateless wrapper over the provider's HTTP management API. Every
//! operation is a single attempt: no retry, no circuit breaker. Retry and
//! backoff policy belongs to the orchestrator or its operator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod keycloak;
pub mod mock;

pub use keycloak::KeycloakGateway;
pub use mock::MockIdentityGateway;

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors raised by identity provider calls.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider answered with a non-success status.
    #[error("Provider returned status {status}: {context}")]
    Status { status: u16, context: String },

    /// The request never completed (DNS, connect, timeout).
    #[error("Provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered 2xx but the body was not what we expect.
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

/// Account representation sent to the provider on create and update.
///
/// Two payload shapes share this type: with credentials (create, or update
/// with a password change) and without (plain update). `None` fields are
/// omitted from the serialized body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPayload {
    pub username: String,
    pub email: String,
    pub enabled: bool,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Vec<AccountCredentials>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_actions: Option<Vec<String>>,
}

/// A password credential entry.
#[derive(Debug, Clone, Serialize)]
pub struct AccountCredentials {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    pub temporary: bool,
}

impl AccountCredentials {
    /// A temporary password the user must change on first login.
    pub fn temporary_password(value: impl Into<String>) -> Self {
        Self {
            kind: "password".to_string(),
            value: value.into(),
            temporary: true,
        }
    }

    /// A permanent password.
    pub fn password(value: impl Into<String>) -> Self {
        Self {
            kind: "password".to_string(),
            value: value.into(),
            temporary: false,
        }
    }
}

/// Token endpoint response; only the access token is of interest.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: Option<String>,
}

/// Account record returned by the username lookup.
#[derive(Debug, Deserialize)]
pub(crate) struct AccountRecord {
    pub id: String,
}

/// One HTTP call per operation against the provider's management API.
///
/// The bearer token is supplied by the caller; token acquisition is itself
/// an operation (client-credential exchange).
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Exchange configured client credentials for a bearer token.
    async fn get_token(&self) -> Result<String>;

    /// Create an account; returns the raw response body.
    async fn create_account(&self, account: &AccountPayload, token: &str) -> Result<String>;

    /// Map a realm role onto an account.
    async fn assign_role(&self, account_id: &str, role: &str, token: &str) -> Result<()>;

    /// Overwrite the account representation.
    async fn update_account(
        &self,
        account: &AccountPayload,
        account_id: &str,
        token: &str,
    ) -> Result<()>;

    /// Disable (never delete) an account. Returns `true` on success.
    async fn disable_account(&self, account_id: &str, token: &str) -> Result<bool>;

    /// Resolve a provider account id by username. A 404 or an empty result
    /// array both resolve to `None`; only malformed responses or other HTTP
    /// failures are errors.
    async fn find_account_id(&self, username: &str, token: &str) -> Result<Option<String>>;

    /// Trigger asynchronous verification-email delivery on the provider side.
    async fn send_verification_email(&self, account_id: &str, token: &str) -> Result<()>;

    /// Trigger asynchronous password-reset-email delivery.
    async fn send_password_reset_email(&self, account_id: &str, token: &str) -> Result<()>;
}
