//! Data models
//!
//! Entities stored by the API and the typed request bodies that create and
//! update them:
//! - `User`, `Session`: accounts and login tokens
//! - `Bootcamp`: published bootcamps with geocoded location
//! - `Course`, `Review`: records owned by a bootcamp

mod bootcamp;
mod course;
mod review;
mod session;
mod user;

pub use bootcamp::{
    Bootcamp, Career, CreateBootcampInput, GeoLocation, UpdateBootcampInput, DEFAULT_PHOTO,
};
pub use course::{Course, CreateCourseInput, SkillLevel, UpdateCourseInput};
pub use review::{CreateReviewInput, Review, UpdateReviewInput};
pub use session::Session;
pub use user::{CreateUserInput, UpdateUserInput, User, UserRole};
