//! In-memory read model for projection tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ReadModel, Result, RoleDocument, UserDocument};

/// HashMap-backed read model with the same upsert semantics as MongoDB.
#[derive(Default)]
pub struct MemoryReadModel {
    users: Mutex<HashMap<String, UserDocument>>,
    roles: Mutex<HashMap<String, RoleDocument>>,
}

impl MemoryReadModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn role_count(&self) -> usize {
        self.roles.lock().unwrap().len()
    }
}

#[async_trait]
impl ReadModel for MemoryReadModel {
    async fn upsert_user(&self, user: &UserDocument) -> Result<()> {
        self.users
            .lock()
            .unwrap()
            .insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn remove_user(&self, user_id: &str) -> Result<()> {
        self.users.lock().unwrap().remove(user_id);
        Ok(())
    }

    async fn upsert_role(&self, role: &RoleDocument) -> Result<()> {
        self.roles
            .lock()
            .unwrap()
            .insert(role.id.clone(), role.clone());
        Ok(())
    }

    async fn remove_roles_for_user(&self, user_id: &str) -> Result<()> {
        self.roles.lock().unwrap().retain(|_, r| r.user_id != user_id);
        Ok(())
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<UserDocument>> {
        Ok(self.users.lock().unwrap().get(user_id).cloned())
    }

    async fn find_role_for_user(&self, user_id: &str) -> Result<Option<RoleDocument>> {
        Ok(self
            .roles
            .lock()
            .unwrap()
            .values()
            .find(|r| r.user_id == user_id)
            .cloned())
    }
}
