//! Course service
//!
//! Courses belong to a bootcamp and to the user who added them. Every change
//! recomputes the parent bootcamp's average cost.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use crate::db::repositories::{BootcampRepository, CourseRepository};
use crate::models::{Bootcamp, Course, CreateCourseInput, UpdateCourseInput, User};
use crate::query::{expand_reference, reference_ids, AdvancedResults, ListQuery};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::validate::require_text;

pub struct CourseService {
    course_repo: Arc<dyn CourseRepository>,
    bootcamp_repo: Arc<dyn BootcampRepository>,
}

impl CourseService {
    pub fn new(
        course_repo: Arc<dyn CourseRepository>,
        bootcamp_repo: Arc<dyn BootcampRepository>,
    ) -> Self {
        Self {
            course_repo,
            bootcamp_repo,
        }
    }

    /// One page of courses with `bootcamp` expanded to its name and description
    pub async fn list(&self, query: &ListQuery) -> ServiceResult<AdvancedResults> {
        let page = self.course_repo.find(query).await?;
        let mut results = AdvancedResults::build(&page.records, page.total, query)?;
        expand_bootcamps(self.bootcamp_repo.as_ref(), &mut results.data).await?;
        Ok(results)
    }

    pub async fn list_for_bootcamp(&self, bootcamp_id: i64) -> ServiceResult<Vec<Course>> {
        self.bootcamp_exists(bootcamp_id).await?;
        Ok(self.course_repo.list_by_bootcamps(&[bootcamp_id]).await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Course> {
        self.course_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("No course with the id of {}", id)))
    }

    /// Add a course to a bootcamp the user owns (admins: any bootcamp)
    pub async fn create(
        &self,
        user: &User,
        bootcamp_id: i64,
        input: CreateCourseInput,
    ) -> ServiceResult<Course> {
        let bootcamp = self.bootcamp_exists(bootcamp_id).await?;
        if !user.can_modify(bootcamp.user) {
            return Err(ServiceError::forbidden(format!(
                "User {} is not authorized to add a course to bootcamp {}",
                user.id, bootcamp_id
            )));
        }

        require_text("course title", &input.title, Some(100))?;
        require_text("description", &input.description, None)?;
        check_weeks(input.weeks)?;
        check_tuition(input.tuition)?;

        let course = Course {
            id: 0,
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            weeks: input.weeks,
            tuition: input.tuition,
            minimum_skill: input.minimum_skill,
            scholarship_available: input.scholarship_available,
            bootcamp: bootcamp_id,
            user: user.id,
            created_at: Utc::now(),
        };
        Ok(self.course_repo.create(&course).await?)
    }

    pub async fn update(&self, user: &User, id: i64, input: UpdateCourseInput) -> ServiceResult<Course> {
        let mut course = self.get(id).await?;
        if !user.can_modify(course.user) {
            return Err(ServiceError::forbidden(format!(
                "User {} is not authorized to update course {}",
                user.id, id
            )));
        }

        if let Some(title) = input.title {
            require_text("course title", &title, Some(100))?;
            course.title = title.trim().to_string();
        }
        if let Some(description) = input.description {
            require_text("description", &description, None)?;
            course.description = description.trim().to_string();
        }
        if let Some(weeks) = input.weeks {
            check_weeks(weeks)?;
            course.weeks = weeks;
        }
        if let Some(tuition) = input.tuition {
            check_tuition(tuition)?;
            course.tuition = tuition;
        }
        course.minimum_skill = input.minimum_skill.unwrap_or(course.minimum_skill);
        course.scholarship_available = input
            .scholarship_available
            .unwrap_or(course.scholarship_available);

        Ok(self.course_repo.update(&course).await?)
    }

    pub async fn delete(&self, user: &User, id: i64) -> ServiceResult<()> {
        let course = self.get(id).await?;
        if !user.can_modify(course.user) {
            return Err(ServiceError::forbidden(format!(
                "User {} is not authorized to delete course {}",
                user.id, id
            )));
        }
        self.course_repo.delete(id).await?;
        Ok(())
    }

    async fn bootcamp_exists(&self, id: i64) -> ServiceResult<Bootcamp> {
        self.bootcamp_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("No bootcamp with the id of {}", id)))
    }
}

fn check_weeks(weeks: i64) -> ServiceResult<()> {
    if weeks < 1 {
        return Err(ServiceError::validation("Please add number of weeks"));
    }
    Ok(())
}

fn check_tuition(tuition: f64) -> ServiceResult<()> {
    if !tuition.is_finite() || tuition < 0.0 {
        return Err(ServiceError::validation("Please add a tuition cost"));
    }
    Ok(())
}

/// Replace `bootcamp` ids in list documents with `{id, name, description}`
pub(crate) async fn expand_bootcamps(
    bootcamps: &dyn BootcampRepository,
    docs: &mut [Value],
) -> ServiceResult<()> {
    let ids = reference_ids(docs, "bootcamp");
    if ids.is_empty() {
        return Ok(());
    }
    let related: HashMap<i64, Value> = bootcamps
        .get_by_ids(&ids)
        .await?
        .into_iter()
        .map(|b| {
            (
                b.id,
                json!({"id": b.id, "name": b.name, "description": b.description}),
            )
        })
        .collect();
    expand_reference(docs, "bootcamp", &related);
    Ok(())
}
