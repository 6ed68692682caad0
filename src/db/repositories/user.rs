//! User repository
//!
//! Database operations for user accounts, including the reset-token columns
//! used by the forgot-password flow.

use crate::db::error::write_error;
use crate::db::{find_page, Database, FoundPage};
use crate::models::{User, UserRole};
use crate::query::{CollectionSchema, FieldDef, FieldKind, ListQuery, QueryError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

const USER_COLUMNS: &str =
    "id, name, email, role, password_hash, reset_password_token, reset_password_expire, created_at";

/// Queryable user fields; secrets are deliberately absent
const USER_FIELDS: &[FieldDef] = &[
    FieldDef::new("id", "id", FieldKind::Integer),
    FieldDef::new("name", "name", FieldKind::Text),
    FieldDef::new("email", "email", FieldKind::Text),
    FieldDef::new("role", "role", FieldKind::Text),
    FieldDef::new("created_at", "created_at", FieldKind::Timestamp),
];

pub const USERS: CollectionSchema = CollectionSchema {
    table: "users",
    columns: USER_COLUMNS,
    fields: USER_FIELDS,
};

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user, returning it with its id
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// User holding an unexpired reset token with this digest
    async fn get_by_reset_token(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<User>>;

    /// Write every mutable column, including the reset-token pair
    async fn update(&self, user: &User) -> Result<User>;

    /// Returns false when no such user existed
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Filtered, sorted, paginated listing
    async fn find(&self, query: &ListQuery) -> Result<FoundPage<User>, QueryError>;
}

/// SQLx-based user repository
pub struct SqlxUserRepository {
    db: Database,
}

impl SqlxUserRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(db: Database) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(db))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (name, email, role, password_hash, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.to_string())
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(self.db.pool())
        .await
        .map_err(|e| write_error(e, "users", "Failed to create user"))?;

        Ok(User {
            id: result.last_insert_rowid(),
            reset_password_token: None,
            reset_password_expire: None,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await
            .context("Failed to get user by ID")?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
            .bind(email)
            .fetch_optional(self.db.pool())
            .await
            .context("Failed to get user by email")?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_by_reset_token(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE reset_password_token = ? AND reset_password_expire > ?",
            USER_COLUMNS
        ))
        .bind(token_hash)
        .bind(now)
        .fetch_optional(self.db.pool())
        .await
        .context("Failed to get user by reset token")?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn update(&self, user: &User) -> Result<User> {
        sqlx::query(
            r#"
            UPDATE users
            SET name = ?, email = ?, role = ?, password_hash = ?,
                reset_password_token = ?, reset_password_expire = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.to_string())
        .bind(&user.password_hash)
        .bind(&user.reset_password_token)
        .bind(user.reset_password_expire)
        .bind(user.id)
        .execute(self.db.pool())
        .await
        .map_err(|e| write_error(e, "users", "Failed to update user"))?;

        self.get_by_id(user.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await
            .context("Failed to delete user")?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, query: &ListQuery) -> Result<FoundPage<User>, QueryError> {
        find_page(&self.db, &USERS, query, row_to_user).await
    }
}

pub(crate) fn row_to_user(row: &SqliteRow) -> Result<User> {
    let role_str: String = row.try_get("role")?;
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role,
        password_hash: row.try_get("password_hash")?,
        reset_password_token: row.try_get("reset_password_token")?,
        reset_password_expire: row.try_get("reset_password_expire")?,
        created_at: row.try_get("created_at")?,
    })
}
