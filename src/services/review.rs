//! Review service
//!
//! One review per user per bootcamp, rated 1 to 10. Every change recomputes
//! the bootcamp's average rating.

use std::sync::Arc;

use chrono::Utc;

use crate::db::repositories::{BootcampRepository, ReviewRepository};
use crate::models::{CreateReviewInput, Review, UpdateReviewInput, User};
use crate::query::{AdvancedResults, ListQuery};
use crate::services::course::expand_bootcamps;
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::validate::require_text;

const TITLE_MAX: usize = 100;

pub struct ReviewService {
    review_repo: Arc<dyn ReviewRepository>,
    bootcamp_repo: Arc<dyn BootcampRepository>,
}

impl ReviewService {
    pub fn new(
        review_repo: Arc<dyn ReviewRepository>,
        bootcamp_repo: Arc<dyn BootcampRepository>,
    ) -> Self {
        Self {
            review_repo,
            bootcamp_repo,
        }
    }

    pub async fn list(&self, query: &ListQuery) -> ServiceResult<AdvancedResults> {
        let page = self.review_repo.find(query).await?;
        let mut results = AdvancedResults::build(&page.records, page.total, query)?;
        expand_bootcamps(self.bootcamp_repo.as_ref(), &mut results.data).await?;
        Ok(results)
    }

    pub async fn list_for_bootcamp(&self, bootcamp_id: i64) -> ServiceResult<Vec<Review>> {
        self.require_bootcamp(bootcamp_id).await?;
        Ok(self.review_repo.list_by_bootcamp(bootcamp_id).await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Review> {
        self.review_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("No review found with the id of {}", id)))
    }

    pub async fn create(
        &self,
        user: &User,
        bootcamp_id: i64,
        input: CreateReviewInput,
    ) -> ServiceResult<Review> {
        self.require_bootcamp(bootcamp_id).await?;
        if self
            .review_repo
            .get_by_author(bootcamp_id, user.id)
            .await?
            .is_some()
        {
            return Err(ServiceError::validation(format!(
                "User {} has already reviewed bootcamp {}",
                user.id, bootcamp_id
            )));
        }

        require_text("title for the review", &input.title, Some(TITLE_MAX))?;
        require_text("text", &input.text, None)?;
        check_rating(input.rating)?;

        let review = Review {
            id: 0,
            title: input.title.trim().to_string(),
            text: input.text.trim().to_string(),
            rating: input.rating,
            bootcamp: bootcamp_id,
            user: user.id,
            created_at: Utc::now(),
        };
        Ok(self.review_repo.create(&review).await?)
    }

    pub async fn update(&self, user: &User, id: i64, input: UpdateReviewInput) -> ServiceResult<Review> {
        let mut review = self.get(id).await?;
        if !user.can_modify(review.user) {
            return Err(ServiceError::forbidden("Not authorized to update review"));
        }

        if let Some(title) = input.title {
            require_text("title for the review", &title, Some(TITLE_MAX))?;
            review.title = title.trim().to_string();
        }
        if let Some(text) = input.text {
            require_text("text", &text, None)?;
            review.text = text.trim().to_string();
        }
        if let Some(rating) = input.rating {
            check_rating(rating)?;
            review.rating = rating;
        }

        Ok(self.review_repo.update(&review).await?)
    }

    pub async fn delete(&self, user: &User, id: i64) -> ServiceResult<()> {
        let review = self.get(id).await?;
        if !user.can_modify(review.user) {
            return Err(ServiceError::forbidden("Not authorized to delete review"));
        }
        self.review_repo.delete(id).await?;
        Ok(())
    }

    async fn require_bootcamp(&self, id: i64) -> ServiceResult<()> {
        match self.bootcamp_repo.get_by_id(id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::not_found(format!("No bootcamp with the id of {}", id))),
        }
    }
}

fn check_rating(rating: i64) -> ServiceResult<()> {
    if !(1..=10).contains(&rating) {
        return Err(ServiceError::validation("Please add a rating between 1 and 10"));
    }
    Ok(())
}
