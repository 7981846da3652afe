//! In-memory identity gateway mock for saga tests.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{AccountPayload, IdentityGateway, ProviderError, Result};

/// Records every operation and answers from configured state.
///
/// Defaults to the happy path: token exchange succeeds, lookups resolve to
/// a fixed account id, mutations succeed.
pub struct MockIdentityGateway {
    calls: Mutex<Vec<String>>,
    account_id: Mutex<Option<String>>,
    fail_create: Mutex<bool>,
    fail_update: Mutex<bool>,
    fail_verification_email: Mutex<bool>,
    refuse_disable: Mutex<bool>,
}

impl Default for MockIdentityGateway {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            account_id: Mutex::new(Some("kc-account-1".to_string())),
            fail_create: Mutex::new(false),
            fail_update: Mutex::new(false),
            fail_verification_email: Mutex::new(false),
            refuse_disable: Mutex::new(false),
        }
    }
}

impl MockIdentityGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `find_account_id` resolve to `None`, simulating a missing
    /// mirrored account.
    pub fn without_account(self) -> Self {
        *self.account_id.lock().unwrap() = None;
        self
    }

    /// Make `create_account` fail with a provider error.
    pub fn failing_create(self) -> Self {
        *self.fail_create.lock().unwrap() = true;
        self
    }

    /// Make `update_account` fail with a provider error.
    pub fn failing_update(self) -> Self {
        *self.fail_update.lock().unwrap() = true;
        self
    }

    /// Make `send_verification_email` fail with a provider error.
    pub fn failing_verification_email(self) -> Self {
        *self.fail_verification_email.lock().unwrap() = true;
        self
    }

    /// Make `disable_account` answer `false` without erroring.
    pub fn refusing_disable(self) -> Self {
        *self.refuse_disable.lock().unwrap() = true;
        self
    }

    /// Operations invoked so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn was_called(&self, op: &str) -> bool {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| c == op || c.starts_with(&format!("{}:", op)))
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn provider_error(context: &str) -> ProviderError {
        ProviderError::Status {
            status: 500,
            context: context.to_string(),
        }
    }
}

#[async_trait]
impl IdentityGateway for MockIdentityGateway {
    async fn get_token(&self) -> Result<String> {
        self.record("get_token".to_string());
        Ok("mock-token".to_string())
    }

    async fn create_account(&self, account: &AccountPayload, _token: &str) -> Result<String> {
        self.record(format!("create_account:{}", account.username));
        if *self.fail_create.lock().unwrap() {
            return Err(Self::provider_error("create account"));
        }
        Ok("{}".to_string())
    }

    async fn assign_role(&self, account_id: &str, role: &str, _token: &str) -> Result<()> {
        self.record(format!("assign_role:{}:{}", account_id, role));
        Ok(())
    }

    async fn update_account(
        &self,
        account: &AccountPayload,
        account_id: &str,
        _token: &str,
    ) -> Result<()> {
        let with_credentials = account.credentials.is_some();
        self.record(format!(
            "update_account:{}:credentials={}",
            account_id, with_credentials
        ));
        if *self.fail_update.lock().unwrap() {
            return Err(Self::provider_error("update account"));
        }
        Ok(())
    }

    async fn disable_account(&self, account_id: &str, _token: &str) -> Result<bool> {
        self.record(format!("disable_account:{}", account_id));
        Ok(!*self.refuse_disable.lock().unwrap())
    }

    async fn find_account_id(&self, username: &str, _token: &str) -> Result<Option<String>> {
        self.record(format!("find_account_id:{}", username));
        Ok(self.account_id.lock().unwrap().clone())
    }

    async fn send_verification_email(&self, account_id: &str, _token: &str) -> Result<()> {
        self.record(format!("send_verification_email:{}", account_id));
        if *self.fail_verification_email.lock().unwrap() {
            return Err(Self::provider_error("send verification email"));
        }
        Ok(())
    }

    async fn send_password_reset_email(&self, account_id: &str, _token: &str) -> Result<()> {
        self.record(format!("send_password_reset_email:{}", account_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls_in_order() {
        let gw = MockIdentityGateway::new();
        let token = gw.get_token().await.unwrap();
        gw.find_account_id("ana@x.com", &token).await.unwrap();

        assert_eq!(gw.calls(), vec!["get_token", "find_account_id:ana@x.com"]);
        assert!(gw.was_called("find_account_id"));
        assert!(!gw.was_called("disable_account"));
    }

    #[tokio::test]
    async fn test_without_account_resolves_lookup_to_none() {
        let gw = MockIdentityGateway::new().without_account();
        let found = gw.find_account_id("ana@x.com", "t").await.unwrap();
        assert!(found.is_none());
    }
}
