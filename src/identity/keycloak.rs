//! Keycloak implementation of the identity gateway.
//!
//! URLs follow the Keycloak admin REST layout: token exchange under
//! `/realms/{realm}/protocol/openid-connect/token`, account management
//! under `/admin/realms/{realm}/users`.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use tracing::debug;

use super::{
    AccountPayload, AccountRecord, IdentityGateway, ProviderError, Result, TokenResponse,
};
use crate::config::IdentityConfig;

/// Gateway over the Keycloak admin API.
pub struct KeycloakGateway {
    client: reqwest::Client,
    config: IdentityConfig,
}

impl KeycloakGateway {
    pub fn new(client: reqwest::Client, config: IdentityConfig) -> Self {
        Self { client, config }
    }

    fn admin_url(&self, suffix: &str) -> String {
        format!(
            "{}/admin/realms/{}/users{}",
            self.config.base_url, self.config.realm, suffix
        )
    }

    async fn check_status(response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(ProviderError::Status {
            status: status.as_u16(),
            context: context.to_string(),
        })
    }
}

#[async_trait]
impl IdentityGateway for KeycloakGateway {
    async fn get_token(&self) -> Result<String> {
        let url = format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.config.base_url, self.config.realm
        );

        let response = self
            .client
            .post(&url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let response = Self::check_status(response, "token exchange").await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("token body: {}", e)))?;

        token
            .access_token
            .ok_or_else(|| ProviderError::MalformedResponse("missing access_token".to_string()))
    }

    async fn create_account(&self, account: &AccountPayload, token: &str) -> Result<String> {
        let response = self
            .client
            .post(self.admin_url(""))
            .bearer_auth(token)
            .json(account)
            .send()
            .await?;

        let response = Self::check_status(response, "create account").await?;
        debug!(username = %account.username, "Created identity-provider account");
        Ok(response.text().await?)
    }

    async fn assign_role(&self, account_id: &str, role: &str, token: &str) -> Result<()> {
        let response = self
            .client
            .post(self.admin_url(&format!("/{}/role-mappings/realm", account_id)))
            .bearer_auth(token)
            .json(&json!([{ "name": role }]))
            .send()
            .await?;

        Self::check_status(response, "assign role").await?;
        Ok(())
    }

    async fn update_account(
        &self,
        account: &AccountPayload,
        account_id: &str,
        token: &str,
    ) -> Result<()> {
        let response = self
            .client
            .put(self.admin_url(&format!("/{}", account_id)))
            .bearer_auth(token)
            .json(account)
            .send()
            .await?;

        Self::check_status(response, "update account").await?;
        Ok(())
    }

    async fn disable_account(&self, account_id: &str, token: &str) -> Result<bool> {
        let response = self
            .client
            .put(self.admin_url(&format!("/{}", account_id)))
            .bearer_auth(token)
            .json(&json!({ "enabled": false }))
            .send()
            .await?;

        Self::check_status(response, "disable account").await?;
        Ok(true)
    }

    async fn find_account_id(&self, username: &str, token: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.admin_url(""))
            .bearer_auth(token)
            .query(&[("username", username), ("exact", "true")])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check_status(response, "account lookup").await?;

        let records: Vec<AccountRecord> = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("lookup body: {}", e)))?;

        Ok(records.into_iter().next().map(|r| r.id))
    }

    async fn send_verification_email(&self, account_id: &str, token: &str) -> Result<()> {
        let response = self
            .client
            .put(self.admin_url(&format!("/{}/send-verify-email", account_id)))
            .bearer_auth(token)
            .send()
            .await?;

        Self::check_status(response, "send verification email").await?;
        Ok(())
    }

    async fn send_password_reset_email(&self, account_id: &str, token: &str) -> Result<()> {
        let response = self
            .client
            .put(self.admin_url(&format!("/{}/execute-actions-email", account_id)))
            .bearer_auth(token)
            .json(&json!(["UPDATE_PASSWORD"]))
            .send()
            .await?;

        Self::check_status(response, "send password reset email").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> KeycloakGateway {
        KeycloakGateway::new(
            reqwest::Client::new(),
            IdentityConfig {
                base_url: "http://kc.local:8080".to_string(),
                realm: "auction".to_string(),
                client_id: "users-service".to_string(),
                client_secret: "secret".to_string(),
            },
        )
    }

    #[test]
    fn test_admin_url_layout() {
        let gw = gateway();
        assert_eq!(
            gw.admin_url(""),
            "http://kc.local:8080/admin/realms/auction/users"
        );
        assert_eq!(
            gw.admin_url("/abc/send-verify-email"),
            "http://kc.local:8080/admin/realms/auction/users/abc/send-verify-email"
        );
    }
}

/// Integration tests requiring a running Keycloak instance.
#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::identity::AccountCredentials;

    fn live_gateway() -> KeycloakGateway {
        KeycloakGateway::new(
            reqwest::Client::new(),
            IdentityConfig {
                base_url: std::env::var("KEYCLOAK_URL")
                    .unwrap_or_else(|_| "http://localhost:8080".to_string()),
                realm: std::env::var("KEYCLOAK_REALM").unwrap_or_else(|_| "auction".to_string()),
                client_id: std::env::var("KEYCLOAK_CLIENT_ID")
                    .unwrap_or_else(|_| "users-service".to_string()),
                client_secret: std::env::var("KEYCLOAK_CLIENT_SECRET").unwrap_or_default(),
            },
        )
    }

    #[tokio::test]
    #[ignore = "Requires Keycloak"]
    async fn test_token_then_lookup_unknown_user_resolves_to_none() {
        let gw = live_gateway();
        let token = gw.get_token().await.expect("token");
        let found = gw
            .find_account_id("no-such-user@example.invalid", &token)
            .await
            .expect("lookup");
        assert!(found.is_none());
    }

    #[tokio::test]
    #[ignore = "Requires Keycloak"]
    async fn test_create_then_disable_account() {
        let gw = live_gateway();
        let token = gw.get_token().await.expect("token");

        let email = format!("it-{}@example.com", uuid::Uuid::new_v4());
        let payload = AccountPayload {
            username: email.clone(),
            email: email.clone(),
            enabled: true,
            first_name: "It".to_string(),
            last_name: "Test".to_string(),
            credentials: Some(vec![AccountCredentials::temporary_password("changeme")]),
            required_actions: Some(vec!["VERIFY_EMAIL".to_string()]),
        };

        gw.create_account(&payload, &token).await.expect("create");
        let id = gw
            .find_account_id(&email, &token)
            .await
            .expect("lookup")
            .expect("account exists");
        assert!(gw.disable_account(&id, &token).await.expect("disable"));
    }
}
