//! User creation saga.
//!
//! Step order: validate, write the aggregate and its role inside one
//! transaction, publish `UserCreated`, mirror the account into the identity
//! provider (create, assign role, trigger verification email), commit. The
//! provider account is the only side effect that can escape the transaction,
//! so it gets a disable compensation the moment it becomes addressable;
//! published events are never retracted.

use std::sync::Arc;

use tracing::{error, info};
use validator::Validate;

use super::{roll_back, Compensations, CreateUserRequest, Result, SagaError, SagaOutcome};
use crate::bus::EventPublisher;
use crate::domain::{RoleName, User, UserRole};
use crate::events::{UserCreated, UserEvent};
use crate::identity::{AccountCredentials, AccountPayload, IdentityGateway};
use crate::storage::{UserStore, UserTx};

pub struct CreateUserSaga {
    store: Arc<dyn UserStore>,
    identity: Arc<dyn IdentityGateway>,
    publisher: Arc<dyn EventPublisher>,
}

impl CreateUserSaga {
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

    pub async fn run(&self, request: CreateUserRequest) -> Result<SagaOutcome> {
        request.validate()?;
        let role_name: RoleName = request
            .role
            .parse()
            .map_err(|err: crate::domain::UnknownRole| SagaError::Validation(err.to_string()))?;

        let user = User::new(
            request.name.clone(),
            request.last_name.clone(),
            request.email.clone(),
            request.phone.clone(),
            request.address.clone(),
        );
        let role = UserRole::new(role_name, user.id);

        let mut tx = self.store.begin().await?;
        let mut comps = Compensations::new();

        if let Err(err) = self
            .execute(&request, &user, &role, tx.as_mut(), &mut comps)
            .await
        {
            error!(user_id = %user.id, error = %err, "User creation aborted");
            comps.unwind().await;
            roll_back(tx).await;
            return Err(err);
        }

        if let Err(err) = tx.commit().await {
            comps.unwind().await;
            return Err(err.into());
        }

        info!(user_id = %user.id, role = %role.name, "User created");
        Ok(SagaOutcome {
            user_id: user.id,
            message: "User created".to_string(),
        })
    }

    async fn execute(
        &self,
        request: &CreateUserRequest,
        user: &User,
        role: &UserRole,
        tx: &mut dyn UserTx,
        comps: &mut Compensations,
    ) -> Result<()> {
        tx.insert_user(user).await?;
        tx.insert_role(role).await?;

        let event = UserEvent::Created(UserCreated::from_user(user, role.id, &request.role));
        self.publisher.publish(&event, event.queue()).await?;

        let token = self.identity.get_token().await?;
        let payload = AccountPayload {
            username: request.email.clone(),
            email: request.email.clone(),
            enabled: true,
            first_name: request.name.clone(),
            last_name: request.last_name.clone(),
            credentials: Some(vec![AccountCredentials::temporary_password(
                request.password.clone(),
            )]),
            required_actions: Some(vec!["VERIFY_EMAIL".to_string()]),
        };
        self.identity.create_account(&payload, &token).await?;

        // The provider does not return the new id; resolve it by username
        // so the account becomes addressable for role mapping and undo. An
        // account that cannot be resolved right after a successful create is
        // provider inconsistency, not a caller mistake.
        let account_id = self
            .identity
            .find_account_id(&request.email, &token)
            .await?
            .ok_or_else(|| {
                SagaError::Internal(format!(
                    "provider account for '{}' not visible after create",
                    request.email
                ))
            })?;

        {
            let identity = Arc::clone(&self.identity);
            let account_id = account_id.clone();
            let token = token.clone();
            comps.record("disable provider account", move || {
                Box::pin(async move {
                    identity
                        .disable_account(&account_id, &token)
                        .await
                        .map(|_| ())
                })
            });
        }

        self.identity
            .assign_role(&account_id, &request.role, &token)
            .await?;
        self.identity
            .send_verification_email(&account_id, &token)
            .await?;
        Ok(())
    }
}
