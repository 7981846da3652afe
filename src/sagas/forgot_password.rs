//! Password-reset saga.
//!
//! Touches only the identity provider: resolve the account by email and
//! trigger the provider's reset-email flow. The write store and the broker
//! are not involved.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::{ForgotPasswordRequest, Result, SagaError, SagaOutcome};
use crate::identity::IdentityGateway;

pub struct ForgotPasswordSaga {
    identity: Arc<dyn IdentityGateway>,
}

impl ForgotPasswordSaga {
    pub fn new(identity: Arc<dyn IdentityGateway>) -> Self {
        Self { identity }
    }

    pub async fn run(&self, request: ForgotPasswordRequest) -> Result<SagaOutcome> {
        request.validate()?;

        let token = self.identity.get_token().await?;
        let account_id = self
            .identity
            .find_account_id(&request.email, &token)
            .await?
            .ok_or_else(|| {
                SagaError::NotFound(format!("provider account for '{}'", request.email))
            })?;
        self.identity
            .send_password_reset_email(&account_id, &token)
            .await?;

        info!(email = %request.email, "Password reset email requested");
        Ok(SagaOutcome {
            user_id: Uuid::nil(),
            message: "Password reset email sent".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MockIdentityGateway;

    #[tokio::test]
    async fn test_reset_email_sent_for_known_account() {
        let identity = Arc::new(MockIdentityGateway::new());
        let saga = ForgotPasswordSaga::new(Arc::clone(&identity) as Arc<dyn IdentityGateway>);

        let outcome = saga
            .run(ForgotPasswordRequest {
                email: "ana@x.com".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(outcome.message, "Password reset email sent");
        assert!(identity.was_called("send_password_reset_email"));
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let identity = Arc::new(MockIdentityGateway::new().without_account());
        let saga = ForgotPasswordSaga::new(Arc::clone(&identity) as Arc<dyn IdentityGateway>);

        let err = saga
            .run(ForgotPasswordRequest {
                email: "ghost@x.com".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SagaError::NotFound(_)));
        assert!(!identity.was_called("send_password_reset_email"));
    }

    #[tokio::test]
    async fn test_malformed_email_fails_validation() {
        let identity = Arc::new(MockIdentityGateway::new());
        let saga = ForgotPasswordSaga::new(Arc::clone(&identity) as Arc<dyn IdentityGateway>);

        let err = saga
            .run(ForgotPasswordRequest {
                email: "not-an-email".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SagaError::Validation(_)));
        assert!(identity.calls().is_empty());
    }
}
