//! Review repository

use crate::db::error::write_error;
use crate::db::repositories::bootcamp::store_averages;
use crate::db::{find_page, Database, FoundPage};
use crate::models::Review;
use crate::query::{CollectionSchema, FieldDef, FieldKind, ListQuery, QueryError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

const REVIEW_COLUMNS: &str = "id, title, text, rating, bootcamp_id, user_id, created_at";

const REVIEW_FIELDS: &[FieldDef] = &[
    FieldDef::new("id", "id", FieldKind::Integer),
    FieldDef::new("title", "title", FieldKind::Text),
    FieldDef::new("text", "text", FieldKind::Text),
    FieldDef::new("rating", "rating", FieldKind::Integer),
    FieldDef::new("bootcamp", "bootcamp_id", FieldKind::Integer),
    FieldDef::new("user", "user_id", FieldKind::Integer),
    FieldDef::new("created_at", "created_at", FieldKind::Timestamp),
];

pub const REVIEWS: CollectionSchema = CollectionSchema {
    table: "reviews",
    columns: REVIEW_COLUMNS,
    fields: REVIEW_FIELDS,
};

/// Review repository trait
///
/// Every write recomputes the bootcamp's averages in the same transaction;
/// a second review of one bootcamp by the same user fails with
/// [`crate::db::DuplicateRecord`].
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn create(&self, review: &Review) -> Result<Review>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Review>>;

    /// A user's review of a bootcamp, if written
    async fn get_by_author(&self, bootcamp_id: i64, user_id: i64) -> Result<Option<Review>>;

    async fn update(&self, review: &Review) -> Result<Review>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn find(&self, query: &ListQuery) -> Result<FoundPage<Review>, QueryError>;

    /// All reviews of a bootcamp, oldest first
    async fn list_by_bootcamp(&self, bootcamp_id: i64) -> Result<Vec<Review>>;
}

pub struct SqlxReviewRepository {
    db: Database,
}

impl SqlxReviewRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn boxed(db: Database) -> Arc<dyn ReviewRepository> {
        Arc::new(Self::new(db))
    }
}

#[async_trait]
impl ReviewRepository for SqlxReviewRepository {
    async fn create(&self, review: &Review) -> Result<Review> {
        let mut tx = self.db.pool().begin().await.context("Failed to begin transaction")?;
        let result = sqlx::query(
            r#"
            INSERT INTO reviews (title, text, rating, bootcamp_id, user_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&review.title)
        .bind(&review.text)
        .bind(review.rating)
        .bind(review.bootcamp)
        .bind(review.user)
        .bind(review.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, "reviews", "Failed to create review"))?;

        store_averages(&mut tx, review.bootcamp).await?;
        tx.commit().await.context("Failed to commit review")?;

        Ok(Review {
            id: result.last_insert_rowid(),
            ..review.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Review>> {
        let row = sqlx::query(&format!("SELECT {} FROM reviews WHERE id = ?", REVIEW_COLUMNS))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await
            .context("Failed to get review by ID")?;

        row.as_ref().map(row_to_review).transpose()
    }

    async fn get_by_author(&self, bootcamp_id: i64, user_id: i64) -> Result<Option<Review>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM reviews WHERE bootcamp_id = ? AND user_id = ?",
            REVIEW_COLUMNS
        ))
        .bind(bootcamp_id)
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await
        .context("Failed to get review by author")?;

        row.as_ref().map(row_to_review).transpose()
    }

    async fn update(&self, review: &Review) -> Result<Review> {
        let mut tx = self.db.pool().begin().await.context("Failed to begin transaction")?;
        sqlx::query("UPDATE reviews SET title = ?, text = ?, rating = ? WHERE id = ?")
            .bind(&review.title)
            .bind(&review.text)
            .bind(review.rating)
            .bind(review.id)
            .execute(&mut *tx)
            .await
            .context("Failed to update review")?;

        store_averages(&mut tx, review.bootcamp).await?;
        tx.commit().await.context("Failed to commit review")?;

        self.get_by_id(review.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Review not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut tx = self.db.pool().begin().await.context("Failed to begin transaction")?;
        let bootcamp_id: Option<i64> =
            sqlx::query_scalar("SELECT bootcamp_id FROM reviews WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to get review by ID")?;
        let Some(bootcamp_id) = bootcamp_id else {
            return Ok(false);
        };

        sqlx::query("DELETE FROM reviews WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete review")?;

        store_averages(&mut tx, bootcamp_id).await?;
        tx.commit().await.context("Failed to commit review")?;
        Ok(true)
    }

    async fn find(&self, query: &ListQuery) -> Result<FoundPage<Review>, QueryError> {
        find_page(&self.db, &REVIEWS, query, row_to_review).await
    }

    async fn list_by_bootcamp(&self, bootcamp_id: i64) -> Result<Vec<Review>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM reviews WHERE bootcamp_id = ? ORDER BY created_at, id",
            REVIEW_COLUMNS
        ))
        .bind(bootcamp_id)
        .fetch_all(self.db.pool())
        .await
        .context("Failed to list reviews by bootcamp")?;
        rows.iter().map(row_to_review).collect()
    }
}

fn row_to_review(row: &SqliteRow) -> Result<Review> {
    Ok(Review {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        text: row.try_get("text")?,
        rating: row.try_get("rating")?,
        bootcamp: row.try_get("bootcamp_id")?,
        user: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
    })
}
