//! User deletion saga.
//!
//! The relational row goes first (roles cascade with it), then `UserDeleted`
//! is published, then the provider account is disabled rather than deleted,
//! and the transaction commits. A delete that touches no rows means the
//! aggregate vanished between lookup and flush; the saga aborts without
//! publishing or contacting the provider.

use std::sync::Arc;

use tracing::{error, info};

use super::{roll_back, DeleteUserRequest, Result, SagaError, SagaOutcome};
use crate::bus::EventPublisher;
use crate::events::{UserDeleted, UserEvent};
use crate::identity::IdentityGateway;
use crate::storage::{UserStore, UserTx};

pub struct DeleteUserSaga {
    store: Arc<dyn UserStore>,
    identity: Arc<dyn IdentityGateway>,
    publisher: Arc<dyn EventPublisher>,
}

impl DeleteUserSaga {
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

    pub async fn run(&self, request: DeleteUserRequest) -> Result<SagaOutcome> {
        let mut tx = self.store.begin().await?;
        match self.execute(&request, tx.as_mut()).await {
            Ok(()) => {
                tx.commit().await?;
                info!(user_id = %request.user_id, "User deleted");
                Ok(SagaOutcome {
                    user_id: request.user_id,
                    message: "User deleted".to_string(),
                })
            }
            Err(err) => {
                error!(user_id = %request.user_id, error = %err, "User deletion aborted");
                roll_back(tx).await;
                Err(err)
            }
        }
    }

    async fn execute(&self, request: &DeleteUserRequest, tx: &mut dyn UserTx) -> Result<()> {
        let user = tx
            .find_user(request.user_id)
            .await?
            .ok_or_else(|| SagaError::NotFound(format!("user {}", request.user_id)))?;

        let affected = tx.delete_user(user.id).await?;
        if affected == 0 {
            return Err(SagaError::Persistence(format!(
                "delete of user {} touched no rows",
                user.id
            )));
        }

        let event = UserEvent::Deleted(UserDeleted { user_id: user.id });
        self.publisher.publish(&event, event.queue()).await?;

        let token = self.identity.get_token().await?;
        let account_id = self
            .identity
            .find_account_id(&user.email, &token)
            .await?
            .ok_or_else(|| SagaError::NotFound(format!("provider account for '{}'", user.email)))?;
        let disabled = self.identity.disable_account(&account_id, &token).await?;
        if !disabled {
            return Err(SagaError::Internal(format!(
                "provider refused to disable account {}",
                account_id
            )));
        }
        Ok(())
    }
}
