//! Bootcamp repository
//!
//! Stores bootcamps with their geocoded location flattened into columns and
//! careers as a JSON array. Derived averages are recomputed by
//! [`store_averages`] inside the transaction of every course or review write.

use crate::db::error::write_error;
use crate::db::{find_page, Database, FoundPage};
use crate::models::{Bootcamp, Career, GeoLocation};
use crate::query::{CollectionSchema, FieldDef, FieldKind, ListQuery, QueryError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use std::sync::Arc;

const BOOTCAMP_COLUMNS: &str = "id, name, slug, description, website, phone, email, \
     latitude, longitude, formatted_address, street, city, state, zipcode, country, \
     careers, average_rating, average_cost, photo, housing, job_assistance, job_guarantee, \
     accept_gi, user_id, created_at";

const BOOTCAMP_FIELDS: &[FieldDef] = &[
    FieldDef::new("id", "id", FieldKind::Integer),
    FieldDef::new("name", "name", FieldKind::Text),
    FieldDef::new("slug", "slug", FieldKind::Text),
    FieldDef::new("description", "description", FieldKind::Text),
    FieldDef::new("website", "website", FieldKind::Text),
    FieldDef::new("phone", "phone", FieldKind::Text),
    FieldDef::new("email", "email", FieldKind::Text),
    FieldDef::new("latitude", "latitude", FieldKind::Real),
    FieldDef::new("longitude", "longitude", FieldKind::Real),
    FieldDef::new("formatted_address", "formatted_address", FieldKind::Text),
    FieldDef::new("street", "street", FieldKind::Text),
    FieldDef::new("city", "city", FieldKind::Text),
    FieldDef::new("state", "state", FieldKind::Text),
    FieldDef::new("zipcode", "zipcode", FieldKind::Text),
    FieldDef::new("country", "country", FieldKind::Text),
    FieldDef::new("careers", "careers", FieldKind::TextList),
    FieldDef::new("average_rating", "average_rating", FieldKind::Real),
    FieldDef::new("average_cost", "average_cost", FieldKind::Real),
    FieldDef::new("photo", "photo", FieldKind::Text),
    FieldDef::new("housing", "housing", FieldKind::Bool),
    FieldDef::new("job_assistance", "job_assistance", FieldKind::Bool),
    FieldDef::new("job_guarantee", "job_guarantee", FieldKind::Bool),
    FieldDef::new("accept_gi", "accept_gi", FieldKind::Bool),
    FieldDef::new("user", "user_id", FieldKind::Integer),
    FieldDef::new("created_at", "created_at", FieldKind::Timestamp),
];

pub const BOOTCAMPS: CollectionSchema = CollectionSchema {
    table: "bootcamps",
    columns: BOOTCAMP_COLUMNS,
    fields: BOOTCAMP_FIELDS,
};

/// Bootcamp repository trait
#[async_trait]
pub trait BootcampRepository: Send + Sync {
    async fn create(&self, bootcamp: &Bootcamp) -> Result<Bootcamp>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Bootcamp>>;

    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<Bootcamp>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Bootcamp>>;

    /// The bootcamp published by a user, if any
    async fn get_by_user(&self, user_id: i64) -> Result<Option<Bootcamp>>;

    /// Write every client-editable column and the location
    async fn update(&self, bootcamp: &Bootcamp) -> Result<Bootcamp>;

    async fn set_photo(&self, id: i64, photo: &str) -> Result<()>;

    /// Returns false when no such bootcamp existed
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn find(&self, query: &ListQuery) -> Result<FoundPage<Bootcamp>, QueryError>;

    /// Bootcamps whose coordinates fall inside a latitude/longitude box
    async fn within_box(
        &self,
        min_lat: f64,
        max_lat: f64,
        min_lng: f64,
        max_lng: f64,
    ) -> Result<Vec<Bootcamp>>;
}

pub struct SqlxBootcampRepository {
    db: Database,
}

impl SqlxBootcampRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn boxed(db: Database) -> Arc<dyn BootcampRepository> {
        Arc::new(Self::new(db))
    }

    async fn fetch_one_where(&self, clause: &str, bind: BindValue<'_>) -> Result<Option<Bootcamp>> {
        let sql = format!("SELECT {} FROM bootcamps WHERE {} LIMIT 1", BOOTCAMP_COLUMNS, clause);
        let query = sqlx::query(&sql);
        let query = match bind {
            BindValue::Id(id) => query.bind(id),
            BindValue::Text(text) => query.bind(text),
        };
        let row = query
            .fetch_optional(self.db.pool())
            .await
            .context("Failed to get bootcamp")?;
        row.as_ref().map(row_to_bootcamp).transpose()
    }
}

enum BindValue<'a> {
    Id(i64),
    Text(&'a str),
}

#[async_trait]
impl BootcampRepository for SqlxBootcampRepository {
    async fn create(&self, bootcamp: &Bootcamp) -> Result<Bootcamp> {
        let careers = serde_json::to_string(&bootcamp.careers).context("Failed to encode careers")?;
        let location = &bootcamp.location;

        let result = sqlx::query(
            r#"
            INSERT INTO bootcamps (
                name, slug, description, website, phone, email,
                latitude, longitude, formatted_address, street, city, state, zipcode, country,
                careers, photo, housing, job_assistance, job_guarantee, accept_gi,
                user_id, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&bootcamp.name)
        .bind(&bootcamp.slug)
        .bind(&bootcamp.description)
        .bind(&bootcamp.website)
        .bind(&bootcamp.phone)
        .bind(&bootcamp.email)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(&location.formatted_address)
        .bind(&location.street)
        .bind(&location.city)
        .bind(&location.state)
        .bind(&location.zipcode)
        .bind(&location.country)
        .bind(careers)
        .bind(&bootcamp.photo)
        .bind(bootcamp.housing)
        .bind(bootcamp.job_assistance)
        .bind(bootcamp.job_guarantee)
        .bind(bootcamp.accept_gi)
        .bind(bootcamp.user)
        .bind(bootcamp.created_at)
        .execute(self.db.pool())
        .await
        .map_err(|e| write_error(e, "bootcamps", "Failed to create bootcamp"))?;

        Ok(Bootcamp {
            id: result.last_insert_rowid(),
            ..bootcamp.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Bootcamp>> {
        self.fetch_one_where("id = ?", BindValue::Id(id)).await
    }

    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<Bootcamp>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM bootcamps WHERE id IN ({})",
            BOOTCAMP_COLUMNS, placeholders
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(*id);
        }
        let rows = query
            .fetch_all(self.db.pool())
            .await
            .context("Failed to get bootcamps by ID")?;
        rows.iter().map(row_to_bootcamp).collect()
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Bootcamp>> {
        self.fetch_one_where("name = ?", BindValue::Text(name)).await
    }

    async fn get_by_user(&self, user_id: i64) -> Result<Option<Bootcamp>> {
        self.fetch_one_where("user_id = ?", BindValue::Id(user_id)).await
    }

    async fn update(&self, bootcamp: &Bootcamp) -> Result<Bootcamp> {
        let careers = serde_json::to_string(&bootcamp.careers).context("Failed to encode careers")?;
        let location = &bootcamp.location;

        sqlx::query(
            r#"
            UPDATE bootcamps
            SET name = ?, slug = ?, description = ?, website = ?, phone = ?, email = ?,
                latitude = ?, longitude = ?, formatted_address = ?, street = ?, city = ?,
                state = ?, zipcode = ?, country = ?, careers = ?,
                housing = ?, job_assistance = ?, job_guarantee = ?, accept_gi = ?
            WHERE id = ?
            "#,
        )
        .bind(&bootcamp.name)
        .bind(&bootcamp.slug)
        .bind(&bootcamp.description)
        .bind(&bootcamp.website)
        .bind(&bootcamp.phone)
        .bind(&bootcamp.email)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(&location.formatted_address)
        .bind(&location.street)
        .bind(&location.city)
        .bind(&location.state)
        .bind(&location.zipcode)
        .bind(&location.country)
        .bind(careers)
        .bind(bootcamp.housing)
        .bind(bootcamp.job_assistance)
        .bind(bootcamp.job_guarantee)
        .bind(bootcamp.accept_gi)
        .bind(bootcamp.id)
        .execute(self.db.pool())
        .await
        .map_err(|e| write_error(e, "bootcamps", "Failed to update bootcamp"))?;

        self.get_by_id(bootcamp.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Bootcamp not found after update"))
    }

    async fn set_photo(&self, id: i64, photo: &str) -> Result<()> {
        sqlx::query("UPDATE bootcamps SET photo = ? WHERE id = ?")
            .bind(photo)
            .bind(id)
            .execute(self.db.pool())
            .await
            .context("Failed to set bootcamp photo")?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM bootcamps WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await
            .context("Failed to delete bootcamp")?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, query: &ListQuery) -> Result<FoundPage<Bootcamp>, QueryError> {
        find_page(&self.db, &BOOTCAMPS, query, row_to_bootcamp).await
    }

    async fn within_box(
        &self,
        min_lat: f64,
        max_lat: f64,
        min_lng: f64,
        max_lng: f64,
    ) -> Result<Vec<Bootcamp>> {
        let sql = format!(
            "SELECT {} FROM bootcamps \
             WHERE latitude BETWEEN ? AND ? AND longitude BETWEEN ? AND ? \
             ORDER BY id",
            BOOTCAMP_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(min_lat)
            .bind(max_lat)
            .bind(min_lng)
            .bind(max_lng)
            .fetch_all(self.db.pool())
            .await
            .context("Failed to query bootcamps by location")?;
        rows.iter().map(row_to_bootcamp).collect()
    }
}

/// Recompute `average_cost` and `average_rating` of one bootcamp from its
/// courses and reviews
pub(crate) async fn store_averages(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    let avg_tuition: Option<f64> =
        sqlx::query_scalar("SELECT AVG(tuition) FROM courses WHERE bootcamp_id = ?")
            .bind(id)
            .fetch_one(&mut *conn)
            .await
            .context("Failed to average course tuition")?;
    let avg_rating: Option<f64> =
        sqlx::query_scalar("SELECT AVG(rating) FROM reviews WHERE bootcamp_id = ?")
            .bind(id)
            .fetch_one(&mut *conn)
            .await
            .context("Failed to average review ratings")?;

    sqlx::query("UPDATE bootcamps SET average_cost = ?, average_rating = ? WHERE id = ?")
        .bind(avg_tuition.map(round_cost))
        .bind(avg_rating)
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to store bootcamp averages")?;
    Ok(())
}

/// Round up to the next multiple of 10
fn round_cost(mean: f64) -> f64 {
    (mean / 10.0).ceil() * 10.0
}

fn row_to_bootcamp(row: &SqliteRow) -> Result<Bootcamp> {
    let careers_json: String = row.try_get("careers")?;
    let careers: Vec<Career> = serde_json::from_str(&careers_json)
        .with_context(|| format!("Invalid careers in database: {}", careers_json))?;

    Ok(Bootcamp {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        website: row.try_get("website")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        location: GeoLocation {
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            formatted_address: row.try_get("formatted_address")?,
            street: row.try_get("street")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            zipcode: row.try_get("zipcode")?,
            country: row.try_get("country")?,
        },
        careers,
        average_rating: row.try_get("average_rating")?,
        average_cost: row.try_get("average_cost")?,
        photo: row.try_get("photo")?,
        housing: row.try_get("housing")?,
        job_assistance: row.try_get("job_assistance")?,
        job_guarantee: row.try_get("job_guarantee")?,
        accept_gi: row.try_get("accept_gi")?,
        user: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
    })
}
