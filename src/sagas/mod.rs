//! Command sagas spanning the write store, identity provider, and broker.
//!
//! Each saga is one command handler: it validates its request, mutates the
//! relational store inside a single transaction, mirrors the change into the
//! identity provider, publishes the domain event, and only then commits.
//! Side effects that escaped the transaction (provider mutations) are undone
//! through an explicit compensation list when a later step fails.

use futures::future::BoxFuture;
use tracing::error;
use uuid::Uuid;
use validator::Validate;

use crate::bus::BusError;
use crate::identity::ProviderError;
use crate::storage::{StoreError, UserTx};

pub mod create;
pub mod delete;
pub mod forgot_password;
pub mod update;

pub use create::CreateUserSaga;
pub use delete::DeleteUserSaga;
pub use forgot_password::ForgotPasswordSaga;
pub use update::UpdateUserSaga;

/// Result type for saga execution.
pub type Result<T> = std::result::Result<T, SagaError>;

/// Terminal outcomes of a saga run.
#[derive(Debug, thiserror::Error)]
pub enum SagaError {
    /// The request failed validation; nothing was attempted.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The targeted aggregate or its provider mirror does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The write store rejected or silently dropped a mutation.
    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// The identity provider refused or could not complete a call.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The broker was unreachable; the transaction was not committed.
    #[error("Broker unavailable: {0}")]
    Connectivity(String),

    /// Unexpected failure that fits no other variant.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<BusError> for SagaError {
    fn from(err: BusError) -> Self {
        SagaError::Connectivity(err.to_string())
    }
}

impl From<StoreError> for SagaError {
    fn from(err: StoreError) -> Self {
        SagaError::Persistence(err.to_string())
    }
}

impl From<validator::ValidationErrors> for SagaError {
    fn from(err: validator::ValidationErrors) -> Self {
        SagaError::Validation(err.to_string())
    }
}

/// Successful saga result.
#[derive(Debug, Clone, PartialEq)]
pub struct SagaOutcome {
    pub user_id: Uuid,
    pub message: String,
}

/// Request to create a user with its initial role.
#[derive(Debug, Clone, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 50))]
    pub name: String,
    #[validate(length(min = 3, max = 50))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(equal = 11))]
    pub phone: String,
    #[validate(length(min = 5, max = 100))]
    pub address: String,
    pub role: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Partial update request. `None` fields keep their stored value; the role
/// is always stated in full.
#[derive(Debug, Clone, Validate)]
pub struct UpdateUserRequest {
    pub user_id: Uuid,
    #[validate(length(min = 3, max = 50))]
    pub name: Option<String>,
    #[validate(length(min = 3, max = 50))]
    pub last_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(equal = 11))]
    pub phone: Option<String>,
    #[validate(length(min = 5, max = 100))]
    pub address: Option<String>,
    pub role: String,
    pub password: Option<String>,
}

/// Request to remove a user everywhere.
#[derive(Debug, Clone)]
pub struct DeleteUserRequest {
    pub user_id: Uuid,
}

/// Request to trigger a password-reset email.
#[derive(Debug, Clone, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

/// Roll back an abandoned transaction, logging instead of masking the
/// original saga error if the rollback itself fails.
pub(crate) async fn roll_back(tx: Box<dyn UserTx>) {
    if let Err(err) = tx.rollback().await {
        error!(error = %err, "Rollback failed");
    }
}

type CompensationFn = Box<dyn FnOnce() -> BoxFuture<'static, crate::identity::Result<()>> + Send>;

/// Undo list for side effects that escape the relational transaction.
///
/// Steps are recorded as they succeed and unwound in reverse order when the
/// saga aborts. A failing compensation is logged and skipped; the remaining
/// steps still run.
#[derive(Default)]
pub struct Compensations {
    steps: Vec<(&'static str, CompensationFn)>,
}

impl Compensations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<F>(&mut self, name: &'static str, undo: F)
    where
        F: FnOnce() -> BoxFuture<'static, crate::identity::Result<()>> + Send + 'static,
    {
        self.steps.push((name, Box::new(undo)));
    }

    /// Run all recorded undo steps, most recent first.
    pub async fn unwind(mut self) {
        while let Some((name, undo)) = self.steps.pop() {
            if let Err(err) = undo().await {
                error!(step = name, error = %err, "Compensation failed; continuing unwind");
            }
        }
    }
}
