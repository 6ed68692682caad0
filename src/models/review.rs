//! Review model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's rating of a bootcamp; one per user per bootcamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub title: String,
    pub text: String,
    /// 1 to 10
    pub rating: i64,
    pub bootcamp: i64,
    /// Author id
    pub user: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewInput {
    pub title: String,
    pub text: String,
    pub rating: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateReviewInput {
    pub title: Option<String>,
    pub text: Option<String>,
    pub rating: Option<i64>,
}
