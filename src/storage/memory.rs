//! In-memory write store for testing sagas without a database.
//!
//! Transactions work on a private copy of the maps and swap it in on
//! commit. Role insert/delete invocations and commit/rollback counts are
//! recorded eagerly so tests can assert which operations a saga attempted,
//! committed or not.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use super::{Result, UserStore, UserTx};
use crate::domain::{User, UserRole};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, UserRole>,
    commits: usize,
    rollbacks: usize,
    role_inserts: usize,
    role_deletes: usize,
}

/// In-memory store with instrumentation for saga tests.
#[derive(Default)]
pub struct MemoryUserStore {
    state: Arc<Mutex<MemoryState>>,
    zero_rows_on_delete: Arc<Mutex<bool>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user (and its role, if any) as committed state.
    pub fn seed(&self, user: User) {
        let mut state = self.state.lock().unwrap();
        if let Some(role) = &user.role {
            state.roles.insert(role.id, role.clone());
        }
        let mut stored = user;
        stored.role = None;
        state.users.insert(stored.id, stored);
    }

    /// Make `delete_user` report zero affected rows while leaving the row
    /// in place, simulating a concurrent removal between load and flush.
    pub fn report_zero_rows_on_delete(&self) {
        *self.zero_rows_on_delete.lock().unwrap() = true;
    }

    /// Committed aggregate with its role association, if present.
    pub fn user(&self, id: Uuid) -> Option<User> {
        let state = self.state.lock().unwrap();
        let mut user = state.users.get(&id).cloned()?;
        user.role = state.roles.values().find(|r| r.user_id == id).cloned();
        Some(user)
    }

    pub fn user_count(&self) -> usize {
        self.state.lock().unwrap().users.len()
    }

    pub fn role_count(&self) -> usize {
        self.state.lock().unwrap().roles.len()
    }

    pub fn commits(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.state.lock().unwrap().rollbacks
    }

    /// `insert_role` invocations, committed or not.
    pub fn role_inserts(&self) -> usize {
        self.state.lock().unwrap().role_inserts
    }

    /// `delete_role` invocations, committed or not.
    pub fn role_deletes(&self) -> usize {
        self.state.lock().unwrap().role_deletes
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn begin(&self) -> Result<Box<dyn UserTx>> {
        let state = self.state.lock().unwrap();
        Ok(Box::new(MemoryUserTx {
            users: state.users.clone(),
            roles: state.roles.clone(),
            shared: Arc::clone(&self.state),
            zero_rows_on_delete: *self.zero_rows_on_delete.lock().unwrap(),
        }))
    }
}

/// Working copy of the store; swapped in on commit, discarded on rollback.
pub struct MemoryUserTx {
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, UserRole>,
    shared: Arc<Mutex<MemoryState>>,
    zero_rows_on_delete: bool,
}

#[async_trait]
impl UserTx for MemoryUserTx {
    async fn insert_user(&mut self, user: &User) -> Result<()> {
        let mut stored = user.clone();
        stored.role = None;
        self.users.insert(stored.id, stored);
        Ok(())
    }

    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>> {
        let mut user = match self.users.get(&id) {
            Some(user) => user.clone(),
            None => return Ok(None),
        };
        user.role = self.roles.values().find(|r| r.user_id == id).cloned();
        Ok(Some(user))
    }

    async fn update_user(&mut self, user: &User) -> Result<u64> {
        if !self.users.contains_key(&user.id) {
            return Ok(0);
        }
        let mut stored = user.clone();
        stored.role = None;
        self.users.insert(stored.id, stored);
        Ok(1)
    }

    async fn delete_user(&mut self, id: Uuid) -> Result<u64> {
        if self.zero_rows_on_delete {
            return Ok(0);
        }
        if self.users.remove(&id).is_none() {
            return Ok(0);
        }
        self.roles.retain(|_, r| r.user_id != id);
        Ok(1)
    }

    async fn insert_role(&mut self, role: &UserRole) -> Result<()> {
        self.shared.lock().unwrap().role_inserts += 1;
        self.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn delete_role(&mut self, role_id: Uuid) -> Result<u64> {
        self.shared.lock().unwrap().role_deletes += 1;
        Ok(self.roles.remove(&role_id).map_or(0, |_| 1))
    }

    async fn find_role_for_user(&mut self, user_id: Uuid) -> Result<Option<UserRole>> {
        Ok(self.roles.values().find(|r| r.user_id == user_id).cloned())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut state = self.shared.lock().unwrap();
        state.users = self.users;
        state.roles = self.roles;
        state.commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.shared.lock().unwrap().rollbacks += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RoleName;

    #[tokio::test]
    async fn test_rollback_discards_mutations() {
        let store = MemoryUserStore::new();
        let mut tx = store.begin().await.unwrap();

        let user = User::new("Ana", "Lopez", "ana@x.com", "04141234567", "Av. 5");
        tx.insert_user(&user).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.user_count(), 0);
        assert_eq!(store.rollbacks(), 1);
    }

    #[tokio::test]
    async fn test_commit_applies_mutations() {
        let store = MemoryUserStore::new();
        let mut tx = store.begin().await.unwrap();

        let user = User::new("Ana", "Lopez", "ana@x.com", "04141234567", "Av. 5");
        let role = UserRole::new(RoleName::Bidder, user.id);
        tx.insert_user(&user).await.unwrap();
        tx.insert_role(&role).await.unwrap();
        tx.commit().await.unwrap();

        let stored = store.user(user.id).expect("user");
        assert_eq!(stored.role.unwrap().name, RoleName::Bidder);
        assert_eq!(store.commits(), 1);
    }

    #[tokio::test]
    async fn test_zero_rows_knob_leaves_row_in_place() {
        let store = MemoryUserStore::new();
        let user = User::new("Ana", "Lopez", "ana@x.com", "04141234567", "Av. 5");
        store.seed(user.clone());
        store.report_zero_rows_on_delete();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.delete_user(user.id).await.unwrap(), 0);
        tx.rollback().await.unwrap();
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_role_rows() {
        let store = MemoryUserStore::new();
        let mut user = User::new("Ana", "Lopez", "ana@x.com", "04141234567", "Av. 5");
        user.role = Some(UserRole::new(RoleName::Bidder, user.id));
        store.seed(user.clone());

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.delete_user(user.id).await.unwrap(), 1);
        tx.commit().await.unwrap();

        assert_eq!(store.user_count(), 0);
        assert_eq!(store.role_count(), 0);
    }
}
