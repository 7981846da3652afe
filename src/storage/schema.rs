//! Write-store schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Users table schema.
#[derive(Iden)]
pub enum Users {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "name"]
    Name,
    #[iden = "last_name"]
    LastName,
    #[iden = "email"]
    Email,
    #[iden = "phone"]
    Phone,
    #[iden = "address"]
    Address,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "created_by"]
    CreatedBy,
    #[iden = "updated_at"]
    UpdatedAt,
    #[iden = "updated_by"]
    UpdatedBy,
}

/// Role association table schema. One active row per user.
#[derive(Iden)]
pub enum UserRoles {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "role_name"]
    RoleName,
    #[iden = "user_id"]
    UserId,
}

/// SQL for creating the users table.
pub const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    phone TEXT NOT NULL,
    address TEXT NOT NULL,
    created_at TEXT NOT NULL,
    created_by TEXT,
    updated_at TEXT,
    updated_by TEXT
);
"#;

/// SQL for creating the role association table.
pub const CREATE_USER_ROLES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS user_roles (
    id TEXT PRIMARY KEY,
    role_name TEXT NOT NULL,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_user_roles_user_id ON user_roles(user_id);
"#;
