//! User model
//!
//! Accounts that authenticate against the API. The role decides which
//! routes a user may reach; ownership decides which records they may change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    /// Argon2 hash
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// SHA-256 hex digest of the emailed reset token
    #[serde(skip_serializing, default)]
    pub reset_password_token: Option<String>,
    #[serde(skip_serializing, default)]
    pub reset_password_expire: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Build an unsaved user; the password must already be hashed
    pub fn new(name: String, email: String, password_hash: String, role: UserRole) -> Self {
        Self {
            id: 0,
            name,
            email,
            role,
            password_hash,
            reset_password_token: None,
            reset_password_expire: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Admins may change anything; everyone else only what they own
    pub fn can_modify(&self, owner_id: i64) -> bool {
        self.is_admin() || self.id == owner_id
    }

    pub fn has_role(&self, allowed: &[UserRole]) -> bool {
        allowed.contains(&self.role)
    }
}

/// Account role
///
/// - User: may write reviews
/// - Publisher: may publish a bootcamp and its courses
/// - Admin: unrestricted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Publisher,
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::User => write!(f, "user"),
            UserRole::Publisher => write!(f, "publisher"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "publisher" => Ok(UserRole::Publisher),
            "admin" => Ok(UserRole::Admin),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Fields for a new account, password in plaintext
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<UserRole>,
}

/// Partial account update used by admins
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<UserRole>,
    /// Replaces the password; hashed before storage
    pub password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, role: UserRole) -> User {
        let mut user = User::new("Jane".into(), "jane@example.com".into(), "hash".into(), role);
        user.id = id;
        user
    }

    #[test]
    fn test_can_modify() {
        let admin = user(1, UserRole::Admin);
        let publisher = user(2, UserRole::Publisher);

        assert!(admin.can_modify(2));
        assert!(admin.can_modify(999));
        assert!(publisher.can_modify(2));
        assert!(!publisher.can_modify(1));
    }

    #[test]
    fn test_has_role() {
        let publisher = user(2, UserRole::Publisher);
        assert!(publisher.has_role(&[UserRole::Publisher, UserRole::Admin]));
        assert!(!publisher.has_role(&[UserRole::User]));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(UserRole::from_str("PUBLISHER").unwrap(), UserRole::Publisher);
        assert_eq!(UserRole::from_str("user").unwrap(), UserRole::User);
        assert!(UserRole::from_str("editor").is_err());
        assert_eq!(UserRole::default(), UserRole::User);
        assert_eq!(UserRole::Admin.to_string(), "admin");
    }

    #[test]
    fn test_secrets_not_serialized() {
        let mut user = user(3, UserRole::User);
        user.reset_password_token = Some("digest".into());
        let json = serde_json::to_value(&user).unwrap();

        assert_eq!(json["role"], "user");
        assert!(json.get("password_hash").is_none());
        assert!(json.get("reset_password_token").is_none());
        assert!(json.get("reset_password_expire").is_none());
    }
}
