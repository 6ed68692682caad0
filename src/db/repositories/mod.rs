//! Database repositories
//!
//! One repository per entity. Each exposes a trait used by the services and
//! an SQLx implementation over the shared `Database` handle.

pub mod bootcamp;
pub mod course;
pub mod review;
pub mod session;
pub mod user;

pub use bootcamp::{BootcampRepository, SqlxBootcampRepository, BOOTCAMPS};
pub use course::{CourseRepository, SqlxCourseRepository, COURSES};
pub use review::{ReviewRepository, SqlxReviewRepository, REVIEWS};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository, USERS};
