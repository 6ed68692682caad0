//! Bootcamp service
//!
//! Publishing, editing and deleting bootcamps, radius search and photo
//! uploads. Addresses are geocoded on create and whenever they change.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use serde_json::Value;

use crate::config::UploadConfig;
use crate::db::repositories::{BootcampRepository, CourseRepository};
use crate::models::{
    Bootcamp, CreateBootcampInput, GeoLocation, UpdateBootcampInput, User, DEFAULT_PHOTO,
};
use crate::query::{attach_children, AdvancedResults, ListQuery};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::geocoder::{bounding_box, distance_miles, GeocodeError, Geocoder};
use crate::services::validate::{max_len, require_email, require_text, require_url};

const NAME_MAX: usize = 50;
const DESCRIPTION_MAX: usize = 500;
const PHONE_MAX: usize = 20;

/// An uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub struct BootcampService {
    bootcamp_repo: Arc<dyn BootcampRepository>,
    course_repo: Arc<dyn CourseRepository>,
    geocoder: Arc<dyn Geocoder>,
    upload: UploadConfig,
}

impl BootcampService {
    pub fn new(
        bootcamp_repo: Arc<dyn BootcampRepository>,
        course_repo: Arc<dyn CourseRepository>,
        geocoder: Arc<dyn Geocoder>,
        upload: UploadConfig,
    ) -> Self {
        Self {
            bootcamp_repo,
            course_repo,
            geocoder,
            upload,
        }
    }

    /// One page of bootcamps, each with its courses attached
    pub async fn list(&self, query: &ListQuery) -> ServiceResult<AdvancedResults> {
        let page = self.bootcamp_repo.find(query).await?;
        let mut results = AdvancedResults::build(&page.records, page.total, query)?;

        let ids: Vec<i64> = page.records.iter().map(|b| b.id).collect();
        let mut courses: HashMap<i64, Vec<Value>> = HashMap::new();
        for course in self.course_repo.list_by_bootcamps(&ids).await? {
            let doc = serde_json::to_value(&course).context("Failed to serialize course")?;
            courses.entry(course.bootcamp).or_default().push(doc);
        }
        attach_children(&mut results.data, "courses", &courses);

        Ok(results)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Bootcamp> {
        self.bootcamp_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Bootcamp not found with id of {}", id)))
    }

    /// Publish a bootcamp owned by `user`
    ///
    /// Non-admins may publish only one bootcamp.
    pub async fn create(&self, user: &User, input: CreateBootcampInput) -> ServiceResult<Bootcamp> {
        if !user.is_admin() && self.bootcamp_repo.get_by_user(user.id).await?.is_some() {
            return Err(ServiceError::validation(format!(
                "The user with ID {} has already published a bootcamp",
                user.id
            )));
        }

        require_text("name", &input.name, Some(NAME_MAX))?;
        require_text("description", &input.description, Some(DESCRIPTION_MAX))?;
        require_text("address", &input.address, None)?;
        check_contact(input.website.as_deref(), input.phone.as_deref(), input.email.as_deref())?;
        if input.careers.is_empty() {
            return Err(ServiceError::validation("Please add at least one career"));
        }

        let name = input.name.trim().to_string();
        self.ensure_name_free(&name, None).await?;
        let location = self.locate(&input.address).await?;

        let bootcamp = Bootcamp {
            id: 0,
            slug: generate_slug(&name),
            name,
            description: input.description.trim().to_string(),
            website: input.website,
            phone: input.phone,
            email: input.email,
            location,
            careers: input.careers,
            average_rating: None,
            average_cost: None,
            photo: DEFAULT_PHOTO.to_string(),
            housing: input.housing,
            job_assistance: input.job_assistance,
            job_guarantee: input.job_guarantee,
            accept_gi: input.accept_gi,
            user: user.id,
            created_at: Utc::now(),
        };

        let created = self.bootcamp_repo.create(&bootcamp).await?;
        tracing::info!("User {} published bootcamp {}", user.id, created.id);
        Ok(created)
    }

    pub async fn update(
        &self,
        user: &User,
        id: i64,
        input: UpdateBootcampInput,
    ) -> ServiceResult<Bootcamp> {
        let mut bootcamp = self.get(id).await?;
        if !user.can_modify(bootcamp.user) {
            return Err(ServiceError::forbidden(format!(
                "User {} is not authorized to update this bootcamp",
                user.id
            )));
        }

        if let Some(name) = input.name {
            require_text("name", &name, Some(NAME_MAX))?;
            let name = name.trim().to_string();
            self.ensure_name_free(&name, Some(id)).await?;
            bootcamp.slug = generate_slug(&name);
            bootcamp.name = name;
        }
        if let Some(description) = input.description {
            require_text("description", &description, Some(DESCRIPTION_MAX))?;
            bootcamp.description = description.trim().to_string();
        }
        check_contact(input.website.as_deref(), input.phone.as_deref(), input.email.as_deref())?;
        if input.website.is_some() {
            bootcamp.website = input.website;
        }
        if input.phone.is_some() {
            bootcamp.phone = input.phone;
        }
        if input.email.is_some() {
            bootcamp.email = input.email;
        }
        if let Some(address) = input.address {
            require_text("address", &address, None)?;
            bootcamp.location = self.locate(&address).await?;
        }
        if let Some(careers) = input.careers {
            if careers.is_empty() {
                return Err(ServiceError::validation("Please add at least one career"));
            }
            bootcamp.careers = careers;
        }
        bootcamp.housing = input.housing.unwrap_or(bootcamp.housing);
        bootcamp.job_assistance = input.job_assistance.unwrap_or(bootcamp.job_assistance);
        bootcamp.job_guarantee = input.job_guarantee.unwrap_or(bootcamp.job_guarantee);
        bootcamp.accept_gi = input.accept_gi.unwrap_or(bootcamp.accept_gi);

        Ok(self.bootcamp_repo.update(&bootcamp).await?)
    }

    /// Delete a bootcamp along with its courses and reviews
    pub async fn delete(&self, user: &User, id: i64) -> ServiceResult<()> {
        let bootcamp = self.get(id).await?;
        if !user.can_modify(bootcamp.user) {
            return Err(ServiceError::forbidden(format!(
                "User {} is not authorized to delete this bootcamp",
                user.id
            )));
        }
        self.bootcamp_repo.delete(id).await?;
        tracing::info!("User {} deleted bootcamp {}", user.id, id);
        Ok(())
    }

    /// Bootcamps within `miles` of the place named by `zipcode`
    pub async fn within_radius(&self, zipcode: &str, miles: f64) -> ServiceResult<Vec<Bootcamp>> {
        if !miles.is_finite() || miles < 0.0 {
            return Err(ServiceError::validation("Please provide a non-negative distance"));
        }
        let center = self.locate(zipcode).await?;
        let (min_lat, max_lat, min_lng, max_lng) =
            bounding_box(center.latitude, center.longitude, miles);

        let candidates = self
            .bootcamp_repo
            .within_box(min_lat, max_lat, min_lng, max_lng)
            .await?;
        Ok(candidates
            .into_iter()
            .filter(|b| {
                distance_miles(
                    center.latitude,
                    center.longitude,
                    b.location.latitude,
                    b.location.longitude,
                ) <= miles
            })
            .collect())
    }

    /// Store a new photo for a bootcamp and return its file name
    pub async fn upload_photo(
        &self,
        user: &User,
        id: i64,
        upload: Option<PhotoUpload>,
    ) -> ServiceResult<String> {
        let bootcamp = self.get(id).await?;
        if !user.can_modify(bootcamp.user) {
            return Err(ServiceError::forbidden(format!(
                "User {} is not authorized to update this bootcamp",
                user.id
            )));
        }

        let upload = upload.ok_or_else(|| ServiceError::validation("Please upload a file"))?;
        if !self.upload.is_type_allowed(&upload.content_type) {
            return Err(ServiceError::validation("Please upload an image file"));
        }
        if upload.bytes.len() as u64 > self.upload.max_file_size {
            return Err(ServiceError::validation(format!(
                "Please upload an image less than {}",
                self.upload.max_file_size
            )));
        }

        let extension = Path::new(&upload.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_lowercase()))
            .unwrap_or_default();
        let file_name = format!("photo_{}{}", bootcamp.id, extension);

        let write = async {
            tokio::fs::create_dir_all(&self.upload.path).await?;
            tokio::fs::write(self.upload.path.join(&file_name), &upload.bytes).await
        };
        if let Err(e) = write.await {
            tracing::error!("Failed to store photo for bootcamp {}: {}", id, e);
            return Err(ServiceError::upstream("Problem with file upload"));
        }

        self.bootcamp_repo.set_photo(id, &file_name).await?;
        Ok(file_name)
    }

    async fn locate(&self, text: &str) -> ServiceResult<GeoLocation> {
        self.geocoder.geocode(text).await.map_err(|e| match e {
            GeocodeError::NoMatch(_) => ServiceError::validation(e.to_string()),
            GeocodeError::Provider(_) => {
                tracing::warn!("{}", e);
                ServiceError::upstream("Geocoding failed")
            }
        })
    }

    async fn ensure_name_free(&self, name: &str, owner: Option<i64>) -> ServiceResult<()> {
        match self.bootcamp_repo.get_by_name(name).await? {
            Some(existing) if Some(existing.id) != owner => {
                Err(ServiceError::validation("Duplicate field value entered"))
            }
            _ => Ok(()),
        }
    }
}

fn check_contact(website: Option<&str>, phone: Option<&str>, email: Option<&str>) -> ServiceResult<()> {
    if let Some(website) = website {
        require_url(website)?;
    }
    if let Some(phone) = phone {
        max_len("phone number", phone, Some(PHONE_MAX))?;
    }
    if let Some(email) = email {
        require_email(email)?;
    }
    Ok(())
}

/// URL-safe slug from a display name
///
/// Lowercases ASCII letters, turns every run of other ASCII characters into a
/// single hyphen and keeps non-ASCII characters as they are.
pub fn generate_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() || !c.is_ascii() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::StaticPlace;
    use crate::db::repositories::{
        SqlxBootcampRepository, SqlxCourseRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations, Database};
    use crate::models::{Career, UserRole};
    use crate::services::geocoder::StaticGeocoder;
    use tempfile::TempDir;

    /// Places known to the test geocoder: Boston, Cambridge (~3 mi away) and
    /// New York (~190 mi away)
    pub(crate) fn test_places() -> HashMap<String, StaticPlace> {
        let place = |lat: f64, lng: f64, city: &str| StaticPlace {
            latitude: lat,
            longitude: lng,
            formatted_address: Some(format!("{}, US", city)),
            street: None,
            city: Some(city.to_string()),
            state: None,
            zipcode: None,
            country: Some("US".to_string()),
        };
        HashMap::from([
            ("02215".to_string(), place(42.3505, -71.1054, "Boston")),
            ("02139".to_string(), place(42.3647, -71.1042, "Cambridge")),
            ("10001".to_string(), place(40.7506, -73.9972, "New York")),
        ])
    }

    pub(crate) fn bootcamp_input(name: &str, address: &str) -> CreateBootcampInput {
        CreateBootcampInput {
            name: name.to_string(),
            description: format!("{} teaches full stack development", name),
            website: Some("https://devworks.com".to_string()),
            phone: Some("(111) 111-1111".to_string()),
            email: Some("enroll@devworks.com".to_string()),
            address: address.to_string(),
            careers: vec![Career::WebDevelopment, Career::UiUx],
            housing: true,
            job_assistance: true,
            job_guarantee: false,
            accept_gi: true,
        }
    }

    struct Fixture {
        service: BootcampService,
        db: Database,
        uploads: TempDir,
    }

    async fn setup() -> Fixture {
        let db = create_test_pool().await.unwrap();
        migrations::run_migrations(&db).await.unwrap();
        let uploads = TempDir::new().unwrap();
        let upload = UploadConfig {
            path: uploads.path().join("photos"),
            max_file_size: 1024,
        };
        let service = BootcampService::new(
            SqlxBootcampRepository::boxed(db.clone()),
            SqlxCourseRepository::boxed(db.clone()),
            Arc::new(StaticGeocoder::new(test_places())),
            upload,
        );
        Fixture { service, db, uploads }
    }

    async fn user(db: &Database, name: &str, role: UserRole) -> User {
        SqlxUserRepository::new(db.clone())
            .create(&User::new(name.into(), format!("{}@example.com", name), "h".into(), role))
            .await
            .unwrap()
    }

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("Devworks Bootcamp"), "devworks-bootcamp");
        assert_eq!(generate_slug("  ModernTech -- Bootcamp! "), "moderntech-bootcamp");
        assert_eq!(generate_slug("UI/UX Academy"), "ui-ux-academy");
        assert_eq!(generate_slug("Café Code"), "café-code");
    }

    #[tokio::test]
    async fn test_create_geocodes_and_limits_publishers() {
        let f = setup().await;
        let publisher = user(&f.db, "pub", UserRole::Publisher).await;

        let bootcamp = f
            .service
            .create(&publisher, bootcamp_input("Devworks Bootcamp", "02215"))
            .await
            .unwrap();
        assert_eq!(bootcamp.slug, "devworks-bootcamp");
        assert_eq!(bootcamp.location.city.as_deref(), Some("Boston"));
        assert_eq!(bootcamp.photo, DEFAULT_PHOTO);
        assert_eq!(bootcamp.user, publisher.id);

        let err = f
            .service
            .create(&publisher, bootcamp_input("Second", "02215"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("The user with ID {} has already published a bootcamp", publisher.id)
        );

        let admin = user(&f.db, "admin", UserRole::Admin).await;
        f.service.create(&admin, bootcamp_input("First", "02139")).await.unwrap();
        f.service.create(&admin, bootcamp_input("Second", "10001")).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_validation() {
        let f = setup().await;
        let admin = user(&f.db, "admin", UserRole::Admin).await;

        let err = f
            .service
            .create(&admin, bootcamp_input("Nowhere", "atlantis"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let mut input = bootcamp_input("Bad Site", "02215");
        input.website = Some("devworks.com".into());
        assert!(matches!(
            f.service.create(&admin, input).await,
            Err(ServiceError::Validation(_))
        ));

        let input = bootcamp_input(&"n".repeat(51), "02215");
        let err = f.service.create(&admin, input).await.unwrap_err();
        assert_eq!(err.to_string(), "Name can not be more than 50 characters");

        f.service.create(&admin, bootcamp_input("Devworks", "02215")).await.unwrap();
        let err = f
            .service
            .create(&admin, bootcamp_input("Devworks", "02139"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Duplicate field value entered");
    }

    #[tokio::test]
    async fn test_update_requires_owner() {
        let f = setup().await;
        let owner = user(&f.db, "owner", UserRole::Publisher).await;
        let other = user(&f.db, "other", UserRole::Publisher).await;
        let admin = user(&f.db, "admin", UserRole::Admin).await;
        let bootcamp = f
            .service
            .create(&owner, bootcamp_input("Devworks", "02215"))
            .await
            .unwrap();

        let rename = UpdateBootcampInput {
            name: Some("Devworks Academy".into()),
            ..Default::default()
        };
        let err = f
            .service
            .update(&other, bootcamp.id, rename.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let updated = f.service.update(&owner, bootcamp.id, rename).await.unwrap();
        assert_eq!(updated.slug, "devworks-academy");

        let moved = f
            .service
            .update(
                &admin,
                bootcamp.id,
                UpdateBootcampInput {
                    address: Some("10001".into()),
                    housing: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.location.city.as_deref(), Some("New York"));
        assert!(!moved.housing);
        assert_eq!(moved.name, "Devworks Academy");
    }

    #[tokio::test]
    async fn test_delete() {
        let f = setup().await;
        let owner = user(&f.db, "owner", UserRole::Publisher).await;
        let other = user(&f.db, "other", UserRole::User).await;
        let bootcamp = f
            .service
            .create(&owner, bootcamp_input("Devworks", "02215"))
            .await
            .unwrap();

        assert!(matches!(
            f.service.delete(&other, bootcamp.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        f.service.delete(&owner, bootcamp.id).await.unwrap();
        assert!(matches!(
            f.service.get(bootcamp.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_within_radius() {
        let f = setup().await;
        let admin = user(&f.db, "admin", UserRole::Admin).await;
        f.service.create(&admin, bootcamp_input("Boston Camp", "02215")).await.unwrap();
        f.service.create(&admin, bootcamp_input("Cambridge Camp", "02139")).await.unwrap();
        f.service.create(&admin, bootcamp_input("NYC Camp", "10001")).await.unwrap();

        let mut near: Vec<String> = f
            .service
            .within_radius("02215", 10.0)
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        near.sort();
        assert_eq!(near, vec!["Boston Camp", "Cambridge Camp"]);

        assert_eq!(f.service.within_radius("02215", 500.0).await.unwrap().len(), 3);
        assert!(f.service.within_radius("02215", -1.0).await.is_err());
    }

    #[tokio::test]
    async fn test_upload_photo() {
        let f = setup().await;
        let owner = user(&f.db, "owner", UserRole::Publisher).await;
        let bootcamp = f
            .service
            .create(&owner, bootcamp_input("Devworks", "02215"))
            .await
            .unwrap();

        let photo = |content_type: &str, size: usize| PhotoUpload {
            file_name: "Campus.JPG".into(),
            content_type: content_type.into(),
            bytes: vec![7u8; size],
        };

        let err = f.service.upload_photo(&owner, bootcamp.id, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Please upload a file");

        let err = f
            .service
            .upload_photo(&owner, bootcamp.id, Some(photo("text/plain", 10)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please upload an image file");

        let err = f
            .service
            .upload_photo(&owner, bootcamp.id, Some(photo("image/jpeg", 2048)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please upload an image less than 1024");

        let name = f
            .service
            .upload_photo(&owner, bootcamp.id, Some(photo("image/jpeg", 100)))
            .await
            .unwrap();
        assert_eq!(name, format!("photo_{}.jpg", bootcamp.id));

        let stored = std::fs::read(f.uploads.path().join("photos").join(&name)).unwrap();
        assert_eq!(stored.len(), 100);
        assert_eq!(f.service.get(bootcamp.id).await.unwrap().photo, name);
    }
}
