//! Course repository

use crate::db::repositories::bootcamp::store_averages;
use crate::db::{find_page, Database, FoundPage};
use crate::models::{Course, SkillLevel};
use crate::query::{CollectionSchema, FieldDef, FieldKind, ListQuery, QueryError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

const COURSE_COLUMNS: &str = "id, title, description, weeks, tuition, minimum_skill, \
     scholarship_available, bootcamp_id, user_id, created_at";

const COURSE_FIELDS: &[FieldDef] = &[
    FieldDef::new("id", "id", FieldKind::Integer),
    FieldDef::new("title", "title", FieldKind::Text),
    FieldDef::new("description", "description", FieldKind::Text),
    FieldDef::new("weeks", "weeks", FieldKind::Integer),
    FieldDef::new("tuition", "tuition", FieldKind::Real),
    FieldDef::new("minimum_skill", "minimum_skill", FieldKind::Text),
    FieldDef::new("scholarship_available", "scholarship_available", FieldKind::Bool),
    FieldDef::new("bootcamp", "bootcamp_id", FieldKind::Integer),
    FieldDef::new("user", "user_id", FieldKind::Integer),
    FieldDef::new("created_at", "created_at", FieldKind::Timestamp),
];

pub const COURSES: CollectionSchema = CollectionSchema {
    table: "courses",
    columns: COURSE_COLUMNS,
    fields: COURSE_FIELDS,
};

/// Course repository trait
///
/// Every write recomputes the owning bootcamp's averages in the same
/// transaction.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn create(&self, course: &Course) -> Result<Course>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>>;

    async fn update(&self, course: &Course) -> Result<Course>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn find(&self, query: &ListQuery) -> Result<FoundPage<Course>, QueryError>;

    /// All courses of the given bootcamps, oldest first
    async fn list_by_bootcamps(&self, bootcamp_ids: &[i64]) -> Result<Vec<Course>>;
}

pub struct SqlxCourseRepository {
    db: Database,
}

impl SqlxCourseRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn boxed(db: Database) -> Arc<dyn CourseRepository> {
        Arc::new(Self::new(db))
    }
}

#[async_trait]
impl CourseRepository for SqlxCourseRepository {
    async fn create(&self, course: &Course) -> Result<Course> {
        let mut tx = self.db.pool().begin().await.context("Failed to begin transaction")?;
        let result = sqlx::query(
            r#"
            INSERT INTO courses (
                title, description, weeks, tuition, minimum_skill,
                scholarship_available, bootcamp_id, user_id, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&course.title)
        .bind(&course.description)
        .bind(course.weeks)
        .bind(course.tuition)
        .bind(course.minimum_skill.to_string())
        .bind(course.scholarship_available)
        .bind(course.bootcamp)
        .bind(course.user)
        .bind(course.created_at)
        .execute(&mut *tx)
        .await
        .context("Failed to create course")?;

        store_averages(&mut tx, course.bootcamp).await?;
        tx.commit().await.context("Failed to commit course")?;

        Ok(Course {
            id: result.last_insert_rowid(),
            ..course.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>> {
        let row = sqlx::query(&format!("SELECT {} FROM courses WHERE id = ?", COURSE_COLUMNS))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await
            .context("Failed to get course by ID")?;

        row.as_ref().map(row_to_course).transpose()
    }

    async fn update(&self, course: &Course) -> Result<Course> {
        let mut tx = self.db.pool().begin().await.context("Failed to begin transaction")?;
        sqlx::query(
            r#"
            UPDATE courses
            SET title = ?, description = ?, weeks = ?, tuition = ?,
                minimum_skill = ?, scholarship_available = ?
            WHERE id = ?
            "#,
        )
        .bind(&course.title)
        .bind(&course.description)
        .bind(course.weeks)
        .bind(course.tuition)
        .bind(course.minimum_skill.to_string())
        .bind(course.scholarship_available)
        .bind(course.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update course")?;

        store_averages(&mut tx, course.bootcamp).await?;
        tx.commit().await.context("Failed to commit course")?;

        self.get_by_id(course.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Course not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut tx = self.db.pool().begin().await.context("Failed to begin transaction")?;
        let bootcamp_id: Option<i64> =
            sqlx::query_scalar("SELECT bootcamp_id FROM courses WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to get course by ID")?;
        let Some(bootcamp_id) = bootcamp_id else {
            return Ok(false);
        };

        sqlx::query("DELETE FROM courses WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete course")?;

        store_averages(&mut tx, bootcamp_id).await?;
        tx.commit().await.context("Failed to commit course")?;
        Ok(true)
    }

    async fn find(&self, query: &ListQuery) -> Result<FoundPage<Course>, QueryError> {
        find_page(&self.db, &COURSES, query, row_to_course).await
    }

    async fn list_by_bootcamps(&self, bootcamp_ids: &[i64]) -> Result<Vec<Course>> {
        if bootcamp_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM courses WHERE bootcamp_id IN ({}) ORDER BY created_at, id",
            COURSE_COLUMNS,
            vec!["?"; bootcamp_ids.len()].join(", ")
        );
        let mut query = sqlx::query(&sql);
        for id in bootcamp_ids {
            query = query.bind(*id);
        }
        let rows = query
            .fetch_all(self.db.pool())
            .await
            .context("Failed to list courses by bootcamp")?;
        rows.iter().map(row_to_course).collect()
    }
}

fn row_to_course(row: &SqliteRow) -> Result<Course> {
    let skill: String = row.try_get("minimum_skill")?;
    let minimum_skill = SkillLevel::from_str(&skill)
        .with_context(|| format!("Invalid skill level in database: {}", skill))?;

    Ok(Course {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        weeks: row.try_get("weeks")?,
        tuition: row.try_get("tuition")?,
        minimum_skill,
        scholarship_available: row.try_get("scholarship_available")?,
        bootcamp: row.try_get("bootcamp_id")?,
        user: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaginationConfig;
    use crate::db::repositories::bootcamp::tests::sample_bootcamp;
    use crate::db::repositories::{
        BootcampRepository, SqlxBootcampRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};
    use chrono::Utc;

    struct Fixture {
        db: Database,
        courses: Arc<dyn CourseRepository>,
        bootcamps: Arc<dyn BootcampRepository>,
        user_id: i64,
        bootcamp_id: i64,
    }

    async fn setup() -> Fixture {
        let db = create_test_pool().await.unwrap();
        migrations::run_migrations(&db).await.unwrap();
        let user = SqlxUserRepository::new(db.clone())
            .create(&User::new("p".into(), "p@example.com".into(), "h".into(), UserRole::Publisher))
            .await
            .unwrap();
        let bootcamps = SqlxBootcampRepository::boxed(db.clone());
        let bootcamp = bootcamps
            .create(&sample_bootcamp("Devworks", user.id, 0.0, 0.0))
            .await
            .unwrap();
        Fixture {
            courses: SqlxCourseRepository::boxed(db.clone()),
            db,
            bootcamps,
            user_id: user.id,
            bootcamp_id: bootcamp.id,
        }
    }

    fn course(title: &str, weeks: i64, tuition: f64, f: &Fixture) -> Course {
        Course {
            id: 0,
            title: title.to_string(),
            description: "d".to_string(),
            weeks,
            tuition,
            minimum_skill: SkillLevel::Intermediate,
            scholarship_available: false,
            bootcamp: f.bootcamp_id,
            user: f.user_id,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_crud() {
        let f = setup().await;
        let mut created = f.courses.create(&course("Web", 8, 8000.0, &f)).await.unwrap();
        let fetched = f.courses.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Web");
        assert_eq!(fetched.minimum_skill, SkillLevel::Intermediate);

        created.tuition = 9000.0;
        created.scholarship_available = true;
        let updated = f.courses.update(&created).await.unwrap();
        assert_eq!(updated.tuition, 9000.0);
        assert!(updated.scholarship_available);

        assert!(f.courses.delete(created.id).await.unwrap());
        assert!(f.courses.get_by_id(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_and_list() {
        let f = setup().await;
        f.courses.create(&course("A", 4, 4000.0, &f)).await.unwrap();
        f.courses.create(&course("B", 12, 12000.0, &f)).await.unwrap();

        let query = ListQuery::from_pairs([("weeks[gt]", "6")], &PaginationConfig::default()).unwrap();
        let page = f.courses.find(&query).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.records[0].title, "B");

        let listed = f.courses.list_by_bootcamps(&[f.bootcamp_id]).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(f.courses.list_by_bootcamps(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bootcamp_delete_cascades() {
        let f = setup().await;
        let created = f.courses.create(&course("A", 4, 4000.0, &f)).await.unwrap();
        f.bootcamps.delete(f.bootcamp_id).await.unwrap();
        assert!(f.courses.get_by_id(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_writes_refresh_bootcamp_averages() {
        let f = setup().await;
        let average = |f: &Fixture| {
            let bootcamps = f.bootcamps.clone();
            let id = f.bootcamp_id;
            async move { bootcamps.get_by_id(id).await.unwrap().unwrap().average_cost }
        };

        let mut first = f.courses.create(&course("A", 4, 8000.0, &f)).await.unwrap();
        f.courses.create(&course("B", 8, 10001.0, &f)).await.unwrap();
        assert_eq!(average(&f).await, Some(9010.0));

        first.tuition = 10001.0;
        f.courses.update(&first).await.unwrap();
        assert_eq!(average(&f).await, Some(10010.0));

        f.courses.delete(first.id).await.unwrap();
        assert_eq!(average(&f).await, Some(10010.0));
        assert!(!f.courses.delete(first.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_average_rolls_back_write() {
        let f = setup().await;
        f.db.execute(
            "CREATE TRIGGER block_averages BEFORE UPDATE OF average_cost ON bootcamps \
             BEGIN SELECT RAISE(ABORT, 'averages locked'); END",
        )
        .await
        .unwrap();

        assert!(f.courses.create(&course("A", 4, 4000.0, &f)).await.is_err());
        assert!(f.courses.list_by_bootcamps(&[f.bootcamp_id]).await.unwrap().is_empty());
    }
}
