//! Write-store aggregate types.
//!
//! The `User` aggregate is the authoritative record; every other store
//! (identity provider, read model) mirrors it. A user carries at most one
//! active role; role changes delete the old row and insert a new one so
//! every assignment keeps its own auditable id.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Fixed set of roles a user may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleName {
    Admin,
    Support,
    Bidder,
    Auctioneer,
}

impl FromStr for RoleName {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(RoleName::Admin),
            "Support" => Ok(RoleName::Support),
            "Bidder" => Ok(RoleName::Bidder),
            "Auctioneer" => Ok(RoleName::Auctioneer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoleName::Admin => "Admin",
            RoleName::Support => "Support",
            RoleName::Bidder => "Bidder",
            RoleName::Auctioneer => "Auctioneer",
        };
        f.write_str(s)
    }
}

/// Error for a role string outside the fixed enumeration.
#[derive(Debug, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

/// A single role assignment. Fresh id per assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRole {
    pub id: Uuid,
    pub name: RoleName,
    pub user_id: Uuid,
}

impl UserRole {
    pub fn new(name: RoleName, user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            user_id,
        }
    }
}

/// The user aggregate as stored in the relational write store.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    /// At most one active role.
    pub role: Option<UserRole>,
}

impl User {
    /// Create a fresh aggregate with a generated id and creation timestamp.
    pub fn new(
        name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            last_name: last_name.into(),
            email: email.into(),
            phone: phone.into(),
            address: address.into(),
            created_at: Utc::now(),
            created_by: None,
            updated_at: None,
            updated_by: None,
            role: None,
        }
    }

    /// Overwrite only the supplied fields and stamp `updated_at`.
    ///
    /// `None` fields keep their current value (partial update semantics).
    pub fn apply_update(
        &mut self,
        name: Option<&str>,
        last_name: Option<&str>,
        email: Option<&str>,
        phone: Option<&str>,
        address: Option<&str>,
    ) {
        if let Some(name) = name {
            self.name = name.to_string();
        }
        if let Some(last_name) = last_name {
            self.last_name = last_name.to_string();
        }
        if let Some(email) = email {
            self.email = email.to_string();
        }
        if let Some(phone) = phone {
            self.phone = phone.to_string();
        }
        if let Some(address) = address {
            self.address = address.to_string();
        }
        self.updated_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_name_parses_known_values() {
        assert_eq!("Bidder".parse::<RoleName>().unwrap(), RoleName::Bidder);
        assert_eq!(
            "Auctioneer".parse::<RoleName>().unwrap(),
            RoleName::Auctioneer
        );
        assert_eq!("Admin".parse::<RoleName>().unwrap(), RoleName::Admin);
        assert_eq!("Support".parse::<RoleName>().unwrap(), RoleName::Support);
    }

    #[test]
    fn test_role_name_rejects_unknown_value() {
        let err = "Janitor".parse::<RoleName>().unwrap_err();
        assert!(err.to_string().contains("Janitor"));
    }

    #[test]
    fn test_role_name_is_case_sensitive() {
        assert!("bidder".parse::<RoleName>().is_err());
    }

    #[test]
    fn test_apply_update_overwrites_only_supplied_fields() {
        let mut user = User::new("Ana", "Lopez", "ana@x.com", "04141234567", "Av. Principal 5");
        user.apply_update(None, None, None, Some("04249999999"), None);

        assert_eq!(user.phone, "04249999999");
        assert_eq!(user.name, "Ana");
        assert_eq!(user.last_name, "Lopez");
        assert_eq!(user.email, "ana@x.com");
        assert_eq!(user.address, "Av. Principal 5");
        assert!(user.updated_at.is_some());
    }

    #[test]
    fn test_fresh_role_assignment_gets_new_id() {
        let user_id = Uuid::new_v4();
        let a = UserRole::new(RoleName::Bidder, user_id);
        let b = UserRole::new(RoleName::Bidder, user_id);
        assert_ne!(a.id, b.id);
    }
}
