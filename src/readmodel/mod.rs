//! Denormalized read model kept in sync by the projection consumers.
//!
//! Documents carry the relational ids as plain strings so that applying the
//! same event twice converges on the same state. All writes are full-document
//! upserts keyed on id; there is no partial patching.
//!
//! Implementations:
//! - `MongoReadModel`: MongoDB-backed store
//! - `MemoryReadModel`: In-memory store for testing

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod memory;
pub mod mongodb;

pub use memory::MemoryReadModel;
pub use mongodb::MongoReadModel;

/// Result type for read-model operations.
pub type Result<T> = std::result::Result<T, ReadModelError>;

/// Errors raised by read-model writes and lookups.
#[derive(Debug, thiserror::Error)]
pub enum ReadModelError {
    #[error("Read model error: {0}")]
    Database(#[from] ::mongodb::error::Error),
}

/// Queryable user projection document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

/// Role assignment projection document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub role_name: String,
    pub user_id: String,
}

/// Idempotent write surface the projection appliers run against.
#[async_trait]
pub trait ReadModel: Send + Sync {
    /// Insert or fully replace a user document by id.
    async fn upsert_user(&self, user: &UserDocument) -> Result<()>;

    /// Remove the user document; absent documents are not an error.
    async fn remove_user(&self, user_id: &str) -> Result<()>;

    /// Insert or fully replace a role document by id.
    async fn upsert_role(&self, role: &RoleDocument) -> Result<()>;

    /// Remove every role document that points at the user.
    async fn remove_roles_for_user(&self, user_id: &str) -> Result<()>;

    async fn find_user(&self, user_id: &str) -> Result<Option<UserDocument>>;

    async fn find_role_for_user(&self, user_id: &str) -> Result<Option<RoleDocument>>;
}
