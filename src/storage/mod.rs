//! Relational write store.
//!
//! The sagas see the store as a transactional unit of work: `UserStore`
//! opens a transaction, `UserTx` mutates the aggregate and its role row
//! inside it, and `commit`/`rollback` resolve it. Mutation operations
//! return affected-row counts so callers can detect writes that silently
//! touched nothing.
//!
//! Implementations:
//! - `PostgresUserStore`: PostgreSQL via sqlx
//! - `MemoryUserStore`: In-memory store for testing

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{User, UserRole};

pub mod memory;
pub mod postgres;
pub mod schema;

pub use memory::MemoryUserStore;
pub use postgres::PostgresUserStore;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during write-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Opens transactions against the write store.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Begin a relational transaction.
    async fn begin(&self) -> Result<Box<dyn UserTx>>;
}

/// One open relational transaction.
///
/// All mutations are scoped to this transaction and invisible to other
/// callers until `commit`. Dropping without resolving behaves like a
/// rollback.
#[async_trait]
pub trait UserTx: Send {
    async fn insert_user(&mut self, user: &User) -> Result<()>;

    /// Load an aggregate with its role association.
    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>>;

    /// Overwrite the aggregate's scalar fields. Returns affected rows.
    async fn update_user(&mut self, user: &User) -> Result<u64>;

    /// Remove the aggregate. Returns affected rows; the role row goes with
    /// it via cascade.
    async fn delete_user(&mut self, id: Uuid) -> Result<u64>;

    async fn insert_role(&mut self, role: &UserRole) -> Result<()>;

    /// Remove a single role assignment by its own id. Returns affected rows.
    async fn delete_role(&mut self, role_id: Uuid) -> Result<u64>;

    /// The user's current role assignment, if any.
    async fn find_role_for_user(&mut self, user_id: Uuid) -> Result<Option<UserRole>>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
