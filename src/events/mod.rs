//! Domain events published to the broker.
//!
//! Events are the only channel through which the read model learns of
//! write-store changes. They are fire-and-forget JSON payloads: no outbox
//! table, no durable log on the producer side. Queue names double as
//! routing keys on the default exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::User;

/// Queue for `UserCreated` events.
pub const USER_CREATED_QUEUE: &str = "user.created";
/// Queue for `UserUpdated` events.
pub const USER_UPDATED_QUEUE: &str = "user.updated";
/// Queue for `UserDeleted` events.
pub const USER_DELETED_QUEUE: &str = "user.deleted";

/// Snapshot of a newly created aggregate plus its role at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreated {
    pub user_id: Uuid,
    pub user_name: String,
    pub user_last_name: String,
    pub user_email: String,
    pub user_phone: String,
    pub user_address: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    pub role_id: Uuid,
    pub role_name: String,
}

/// Full post-update snapshot of the aggregate plus its role at update time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdated {
    pub user_id: Uuid,
    pub user_name: String,
    pub user_last_name: String,
    pub user_email: String,
    pub user_phone: String,
    pub user_address: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    pub role_id: Uuid,
    pub role_name: String,
}

/// Logical removal of an aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDeleted {
    pub user_id: Uuid,
}

/// A domain event paired with its destination queue.
#[derive(Debug, Clone, PartialEq)]
pub enum UserEvent {
    Created(UserCreated),
    Updated(UserUpdated),
    Deleted(UserDeleted),
}

impl UserEvent {
    /// Destination queue (and routing key) for this event.
    pub fn queue(&self) -> &'static str {
        match self {
            UserEvent::Created(_) => USER_CREATED_QUEUE,
            UserEvent::Updated(_) => USER_UPDATED_QUEUE,
            UserEvent::Deleted(_) => USER_DELETED_QUEUE,
        }
    }

    /// Serialize the inner record to the wire payload.
    ///
    /// Only the record itself goes over the wire; the queue identifies the
    /// event type, so no envelope or tag is added.
    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            UserEvent::Created(e) => serde_json::to_vec(e),
            UserEvent::Updated(e) => serde_json::to_vec(e),
            UserEvent::Deleted(e) => serde_json::to_vec(e),
        }
    }
}

impl UserCreated {
    /// Build from a persisted aggregate with its role assignment.
    pub fn from_user(user: &User, role_id: Uuid, role_name: &str) -> Self {
        Self {
            user_id: user.id,
            user_name: user.name.clone(),
            user_last_name: user.last_name.clone(),
            user_email: user.email.clone(),
            user_phone: user.phone.clone(),
            user_address: user.address.clone(),
            created_at: user.created_at,
            created_by: user.created_by.clone(),
            updated_at: user.updated_at,
            updated_by: user.updated_by.clone(),
            role_id,
            role_name: role_name.to_string(),
        }
    }
}

impl UserUpdated {
    /// Build from the post-update aggregate with its current role.
    pub fn from_user(user: &User, role_id: Uuid, role_name: &str) -> Self {
        Self {
            user_id: user.id,
            user_name: user.name.clone(),
            user_last_name: user.last_name.clone(),
            user_email: user.email.clone(),
            user_phone: user.phone.clone(),
            user_address: user.address.clone(),
            created_at: user.created_at,
            created_by: user.created_by.clone(),
            updated_at: user.updated_at,
            updated_by: user.updated_by.clone(),
            role_id,
            role_name: role_name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_names_double_as_routing_keys() {
        let deleted = UserEvent::Deleted(UserDeleted {
            user_id: Uuid::new_v4(),
        });
        assert_eq!(deleted.queue(), "user.deleted");
        assert_eq!(USER_CREATED_QUEUE, "user.created");
        assert_eq!(USER_UPDATED_QUEUE, "user.updated");
    }

    #[test]
    fn test_payload_is_self_describing_json() {
        let user = User::new("Ana", "Lopez", "ana@x.com", "04141234567", "Av. 5");
        let role_id = Uuid::new_v4();
        let event = UserEvent::Created(UserCreated::from_user(&user, role_id, "Bidder"));

        let payload = event.to_payload().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();

        assert_eq!(value["userId"], user.id.to_string());
        assert_eq!(value["userEmail"], "ana@x.com");
        assert_eq!(value["roleName"], "Bidder");
        // No envelope: the record is the whole payload.
        assert!(value.get("type").is_none());
    }

    #[test]
    fn test_deleted_event_carries_only_the_id() {
        let id = Uuid::new_v4();
        let payload = UserEvent::Deleted(UserDeleted { user_id: id })
            .to_payload()
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "userId": id.to_string() })
        );
    }
}
