//! MongoDB implementation of the read model.

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::ReplaceOptions;
use mongodb::{Client, Collection, Database};

use super::{ReadModel, Result, RoleDocument, UserDocument};

const USER_COLLECTION: &str = "User";
const ROLE_COLLECTION: &str = "Role";

/// MongoDB-backed read model.
pub struct MongoReadModel {
    users: Collection<UserDocument>,
    roles: Collection<RoleDocument>,
}

impl MongoReadModel {
    pub fn new(client: &Client, database: &str) -> Self {
        let db: Database = client.database(database);
        Self {
            users: db.collection(USER_COLLECTION),
            roles: db.collection(ROLE_COLLECTION),
        }
    }
}

#[async_trait]
impl ReadModel for MongoReadModel {
    async fn upsert_user(&self, user: &UserDocument) -> Result<()> {
        self.users
            .replace_one(doc! { "_id": &user.id }, user)
            .with_options(ReplaceOptions::builder().upsert(true).build())
            .await?;
        Ok(())
    }

    async fn remove_user(&self, user_id: &str) -> Result<()> {
        self.users.delete_one(doc! { "_id": user_id }).await?;
        Ok(())
    }

    async fn upsert_role(&self, role: &RoleDocument) -> Result<()> {
        self.roles
            .replace_one(doc! { "_id": &role.id }, role)
            .with_options(ReplaceOptions::builder().upsert(true).build())
            .await?;
        Ok(())
    }

    async fn remove_roles_for_user(&self, user_id: &str) -> Result<()> {
        self.roles.delete_many(doc! { "user_id": user_id }).await?;
        Ok(())
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<UserDocument>> {
        Ok(self.users.find_one(doc! { "_id": user_id }).await?)
    }

    async fn find_role_for_user(&self, user_id: &str) -> Result<Option<RoleDocument>> {
        Ok(self.roles.find_one(doc! { "user_id": user_id }).await?)
    }
}
