//! User update saga.
//!
//! Partial field updates over the stored aggregate, a full restatement of
//! the role, `UserUpdated` to the broker, then a provider-account overwrite.
//! The provider account is looked up under the email on record before the
//! update, since the update itself may change it.

use std::sync::Arc;

use tracing::{error, info};
use validator::Validate;

use super::{roll_back, Result, SagaError, SagaOutcome, UpdateUserRequest};
use crate::bus::EventPublisher;
use crate::domain::{RoleName, UserRole};
use crate::events::{UserEvent, UserUpdated};
use crate::identity::{AccountCredentials, AccountPayload, IdentityGateway};
use crate::storage::{UserStore, UserTx};

pub struct UpdateUserSaga {
    store: Arc<dyn UserStore>,
    identity: Arc<dyn IdentityGateway>,
    publisher: Arc<dyn EventPublisher>,
}

impl UpdateUserSaga {
    pub fn new(
        store: Arc<dyn UserStore>,
        identity: Arc<dyn IdentityGateway>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            identity,
            publisher,
        }
    }

    pub async fn run(&self, request: UpdateUserRequest) -> Result<SagaOutcome> {
        request.validate()?;
        let role_name: RoleName = request
            .role
            .parse()
            .map_err(|err: crate::domain::UnknownRole| SagaError::Validation(err.to_string()))?;

        let mut tx = self.store.begin().await?;
        match self.execute(&request, role_name, tx.as_mut()).await {
            Ok(()) => {
                tx.commit().await?;
                info!(user_id = %request.user_id, "User updated");
                Ok(SagaOutcome {
                    user_id: request.user_id,
                    message: "User updated".to_string(),
                })
            }
            Err(err) => {
                error!(user_id = %request.user_id, error = %err, "User update aborted");
                roll_back(tx).await;
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        request: &UpdateUserRequest,
        role_name: RoleName,
        tx: &mut dyn UserTx,
    ) -> Result<()> {
        let mut user = tx
            .find_user(request.user_id)
            .await?
            .ok_or_else(|| SagaError::NotFound(format!("user {}", request.user_id)))?;

        let previous_email = user.email.clone();
        user.apply_update(
            request.name.as_deref(),
            request.last_name.as_deref(),
            request.email.as_deref(),
            request.phone.as_deref(),
            request.address.as_deref(),
        );

        let affected = tx.update_user(&user).await?;
        if affected == 0 {
            return Err(SagaError::Persistence(format!(
                "update of user {} touched no rows",
                user.id
            )));
        }

        // Restate the role only when it actually changed; an unchanged role
        // keeps its assignment id.
        let role = match user.role.take() {
            Some(current) if current.name == role_name => current,
            current => {
                if let Some(old) = current {
                    tx.delete_role(old.id).await?;
                }
                let fresh = UserRole::new(role_name, user.id);
                tx.insert_role(&fresh).await?;
                fresh
            }
        };

        let event = UserEvent::Updated(UserUpdated::from_user(
            &user,
            role.id,
            &role.name.to_string(),
        ));
        self.publisher.publish(&event, event.queue()).await?;

        let token = self.identity.get_token().await?;
        let account_id = self
            .identity
            .find_account_id(&previous_email, &token)
            .await?
            .ok_or_else(|| {
                SagaError::NotFound(format!("provider account for '{}'", previous_email))
            })?;

        let payload = AccountPayload {
            username: user.email.clone(),
            email: user.email.clone(),
            enabled: true,
            first_name: user.name.clone(),
            last_name: user.last_name.clone(),
            credentials: request
                .password
                .as_ref()
                .map(|p| vec![AccountCredentials::password(p.clone())]),
            required_actions: None,
        };
        self.identity
            .update_account(&payload, &account_id, &token)
            .await?;
        Ok(())
    }
}
