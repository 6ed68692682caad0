//! Services layer - Business logic
//!
//! Each service owns the rules for one resource:
//! - validation of request bodies
//! - role and ownership checks that depend on stored records
//! - coordination between repositories, the geocoder and the mailer
//!
//! Every operation returns [`ServiceError`], which the API layer maps to a
//! status code.

pub mod bootcamp;
pub mod course;
pub mod email;
pub mod error;
pub mod geocoder;
pub mod password;
pub mod review;
pub mod user;
pub mod validate;

pub use bootcamp::{generate_slug, BootcampService, PhotoUpload};
pub use course::CourseService;
pub use email::{Mailer, OutgoingMail, SmtpMailer};
pub use error::{ServiceError, ServiceResult};
pub use geocoder::{build_geocoder, Geocoder, GeocodeError, NominatimGeocoder, StaticGeocoder};
pub use password::{hash_password, verify_password};
pub use review::ReviewService;
pub use user::{LoginInput, UpdateDetailsInput, UpdatePasswordInput, UserService};
