//! Projection consumers keeping the read model in sync.
//!
//! One consumer per event queue, each on its own channel over the shared
//! connection. Deliveries are acknowledged only after the read model write
//! succeeds. A payload that cannot be deserialized is poison and is rejected
//! without requeue; a failed read-model write is redelivered. A consumer
//! whose stream ends stays down until the process is restarted.

use std::sync::Arc;

use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicRejectOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bus::{BusError, ChannelProvider, Result};
use crate::events::{
    UserCreated, UserDeleted, UserUpdated, USER_CREATED_QUEUE, USER_DELETED_QUEUE,
    USER_UPDATED_QUEUE,
};
use crate::readmodel::{ReadModel, RoleDocument, UserDocument};

/// Which event stream a consumer follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl EventKind {
    pub fn queue(self) -> &'static str {
        match self {
            EventKind::Created => USER_CREATED_QUEUE,
            EventKind::Updated => USER_UPDATED_QUEUE,
            EventKind::Deleted => USER_DELETED_QUEUE,
        }
    }
}

/// Resolution of one delivery.
#[derive(Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Applied to the read model; acknowledge.
    Applied,
    /// Undecodable payload; reject without requeue.
    Poison,
    /// Read-model write failed; requeue for redelivery.
    Failed,
}

fn user_document(
    id: uuid::Uuid,
    name: &str,
    last_name: &str,
    email: &str,
    phone: &str,
    address: &str,
) -> UserDocument {
    UserDocument {
        id: id.to_string(),
        name: name.to_string(),
        last_name: last_name.to_string(),
        email: email.to_string(),
        phone: phone.to_string(),
        address: address.to_string(),
    }
}

async fn apply_created(event: &UserCreated, read_model: &dyn ReadModel) -> crate::readmodel::Result<()> {
    read_model
        .upsert_user(&user_document(
            event.user_id,
            &event.user_name,
            &event.user_last_name,
            &event.user_email,
            &event.user_phone,
            &event.user_address,
        ))
        .await?;
    read_model
        .upsert_role(&RoleDocument {
            id: event.role_id.to_string(),
            role_name: event.role_name.clone(),
            user_id: event.user_id.to_string(),
        })
        .await
}

async fn apply_updated(event: &UserUpdated, read_model: &dyn ReadModel) -> crate::readmodel::Result<()> {
    read_model
        .upsert_user(&user_document(
            event.user_id,
            &event.user_name,
            &event.user_last_name,
            &event.user_email,
            &event.user_phone,
            &event.user_address,
        ))
        .await?;
    // The role assignment may have been replaced; clear stale rows first.
    read_model
        .remove_roles_for_user(&event.user_id.to_string())
        .await?;
    read_model
        .upsert_role(&RoleDocument {
            id: event.role_id.to_string(),
            role_name: event.role_name.clone(),
            user_id: event.user_id.to_string(),
        })
        .await
}

async fn apply_deleted(event: &UserDeleted, read_model: &dyn ReadModel) -> crate::readmodel::Result<()> {
    let user_id = event.user_id.to_string();
    read_model.remove_user(&user_id).await?;
    read_model.remove_roles_for_user(&user_id).await
}

/// Decode and apply one delivery. Decoding failures are terminal for the
/// message; apply failures are retryable.
pub async fn process_message(
    kind: EventKind,
    payload: &[u8],
    read_model: &dyn ReadModel,
) -> ApplyOutcome {
    let applied = match kind {
        EventKind::Created => match serde_json::from_slice::<UserCreated>(payload) {
            Ok(event) => apply_created(&event, read_model).await,
            Err(err) => {
                error!(queue = kind.queue(), error = %err, "Undecodable payload");
                return ApplyOutcome::Poison;
            }
        },
        EventKind::Updated => match serde_json::from_slice::<UserUpdated>(payload) {
            Ok(event) => apply_updated(&event, read_model).await,
            Err(err) => {
                error!(queue = kind.queue(), error = %err, "Undecodable payload");
                return ApplyOutcome::Poison;
            }
        },
        EventKind::Deleted => match serde_json::from_slice::<UserDeleted>(payload) {
            Ok(event) => apply_deleted(&event, read_model).await,
            Err(err) => {
                error!(queue = kind.queue(), error = %err, "Undecodable payload");
                return ApplyOutcome::Poison;
            }
        },
    };

    match applied {
        Ok(()) => {
            debug!(queue = kind.queue(), "Applied event to read model");
            ApplyOutcome::Applied
        }
        Err(err) => {
            error!(queue = kind.queue(), error = %err, "Read model write failed");
            ApplyOutcome::Failed
        }
    }
}

/// Consume one queue until its stream ends. No automatic restart.
pub async fn run_consumer(
    provider: Arc<dyn ChannelProvider>,
    read_model: Arc<dyn ReadModel>,
    kind: EventKind,
) -> Result<()> {
    let queue = kind.queue();
    let channel = provider.create_channel().await?;

    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                exclusive: false,
                auto_delete: false,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| BusError::Subscribe(format!("Failed to declare queue: {}", e)))?;

    let mut consumer = channel
        .basic_consume(
            queue,
            &format!("users-projector-{}", queue),
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| BusError::Subscribe(format!("Failed to start consumer: {}", e)))?;

    info!(queue = %queue, "Projection consumer started");

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(err) => {
                error!(queue = %queue, error = %err, "Consumer stream error");
                break;
            }
        };

        let outcome = process_message(kind, &delivery.data, read_model.as_ref()).await;
        let acked = match outcome {
            ApplyOutcome::Applied => delivery.ack(BasicAckOptions::default()).await,
            ApplyOutcome::Poison => delivery.reject(BasicRejectOptions { requeue: false }).await,
            ApplyOutcome::Failed => {
                delivery
                    .nack(BasicNackOptions {
                        requeue: true,
                        ..Default::default()
                    })
                    .await
            }
        };
        if let Err(err) = acked {
            error!(queue = %queue, error = %err, "Failed to settle delivery");
            break;
        }
    }

    warn!(queue = %queue, "Projection consumer stopped; restart the process to resume");
    Ok(())
}

/// Spawn one consumer task per event queue.
pub fn start_consumers(
    provider: Arc<dyn ChannelProvider>,
    read_model: Arc<dyn ReadModel>,
) -> Vec<JoinHandle<()>> {
    [EventKind::Created, EventKind::Updated, EventKind::Deleted]
        .into_iter()
        .map(|kind| {
            let provider = Arc::clone(&provider);
            let read_model = Arc::clone(&read_model);
            tokio::spawn(async move {
                if let Err(err) = run_consumer(provider, read_model, kind).await {
                    error!(queue = kind.queue(), error = %err, "Projection consumer failed");
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::User;
    use crate::events::UserEvent;
    use crate::readmodel::MemoryReadModel;
    use uuid::Uuid;

    fn created_payload(user: &User, role_id: Uuid, role_name: &str) -> Vec<u8> {
        UserEvent::Created(UserCreated::from_user(user, role_id, role_name))
            .to_payload()
            .unwrap()
    }

    #[tokio::test]
    async fn test_created_event_materializes_user_and_role() {
        let rm = MemoryReadModel::new();
        let user = User::new("Ana", "Lopez", "ana@x.com", "04141234567", "Av. 5");
        let role_id = Uuid::new_v4();
        let payload = created_payload(&user, role_id, "Bidder");

        let outcome = process_message(EventKind::Created, &payload, &rm).await;

        assert_eq!(outcome, ApplyOutcome::Applied);
        let doc = rm
            .find_user(&user.id.to_string())
            .await
            .unwrap()
            .expect("user doc");
        assert_eq!(doc.email, "ana@x.com");
        let role = rm
            .find_role_for_user(&user.id.to_string())
            .await
            .unwrap()
            .expect("role doc");
        assert_eq!(role.role_name, "Bidder");
        assert_eq!(role.id, role_id.to_string());
    }

    #[tokio::test]
    async fn test_applying_the_same_event_twice_converges() {
        let rm = MemoryReadModel::new();
        let user = User::new("Ana", "Lopez", "ana@x.com", "04141234567", "Av. 5");
        let payload = created_payload(&user, Uuid::new_v4(), "Bidder");

        process_message(EventKind::Created, &payload, &rm).await;
        process_message(EventKind::Created, &payload, &rm).await;

        assert_eq!(rm.user_count(), 1);
        assert_eq!(rm.role_count(), 1);
    }

    #[tokio::test]
    async fn test_applying_the_same_update_twice_converges() {
        let rm = MemoryReadModel::new();
        let mut user = User::new("Ana", "Lopez", "ana@x.com", "04141234567", "Av. 5");
        process_message(
            EventKind::Created,
            &created_payload(&user, Uuid::new_v4(), "Bidder"),
            &rm,
        )
        .await;

        user.apply_update(None, None, None, Some("04249999999"), None);
        let payload = UserEvent::Updated(UserUpdated::from_user(&user, Uuid::new_v4(), "Auctioneer"))
            .to_payload()
            .unwrap();

        process_message(EventKind::Updated, &payload, &rm).await;
        let after_once = rm.find_user(&user.id.to_string()).await.unwrap().unwrap();
        let role_once = rm
            .find_role_for_user(&user.id.to_string())
            .await
            .unwrap()
            .unwrap();

        let outcome = process_message(EventKind::Updated, &payload, &rm).await;

        assert_eq!(outcome, ApplyOutcome::Applied);
        let after_twice = rm.find_user(&user.id.to_string()).await.unwrap().unwrap();
        let role_twice = rm
            .find_role_for_user(&user.id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after_twice, after_once);
        assert_eq!(role_twice, role_once);
        assert_eq!(rm.user_count(), 1);
        assert_eq!(rm.role_count(), 1);
    }

    #[tokio::test]
    async fn test_updated_event_replaces_the_role_assignment() {
        let rm = MemoryReadModel::new();
        let mut user = User::new("Ana", "Lopez", "ana@x.com", "04141234567", "Av. 5");
        let payload = created_payload(&user, Uuid::new_v4(), "Bidder");
        process_message(EventKind::Created, &payload, &rm).await;

        user.apply_update(None, None, None, Some("04249999999"), None);
        let new_role_id = Uuid::new_v4();
        let payload = UserEvent::Updated(UserUpdated::from_user(&user, new_role_id, "Auctioneer"))
            .to_payload()
            .unwrap();
        let outcome = process_message(EventKind::Updated, &payload, &rm).await;

        assert_eq!(outcome, ApplyOutcome::Applied);
        let doc = rm
            .find_user(&user.id.to_string())
            .await
            .unwrap()
            .expect("user doc");
        assert_eq!(doc.phone, "04249999999");
        let role = rm
            .find_role_for_user(&user.id.to_string())
            .await
            .unwrap()
            .expect("role doc");
        assert_eq!(role.role_name, "Auctioneer");
        assert_eq!(rm.role_count(), 1);
    }

    #[tokio::test]
    async fn test_deleted_event_clears_user_and_roles() {
        let rm = MemoryReadModel::new();
        let user = User::new("Ana", "Lopez", "ana@x.com", "04141234567", "Av. 5");
        let payload = created_payload(&user, Uuid::new_v4(), "Bidder");
        process_message(EventKind::Created, &payload, &rm).await;

        let payload = UserEvent::Deleted(UserDeleted { user_id: user.id })
            .to_payload()
            .unwrap();
        let outcome = process_message(EventKind::Deleted, &payload, &rm).await;

        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(rm.user_count(), 0);
        assert_eq!(rm.role_count(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_poison() {
        let rm = MemoryReadModel::new();
        let outcome = process_message(EventKind::Created, b"not json", &rm).await;
        assert_eq!(outcome, ApplyOutcome::Poison);
        assert_eq!(rm.user_count(), 0);
    }

    #[tokio::test]
    async fn test_deleting_an_absent_user_still_applies() {
        let rm = MemoryReadModel::new();
        let payload = UserEvent::Deleted(UserDeleted {
            user_id: Uuid::new_v4(),
        })
        .to_payload()
        .unwrap();
        let outcome = process_message(EventKind::Deleted, &payload, &rm).await;
        assert_eq!(outcome, ApplyOutcome::Applied);
    }
}
