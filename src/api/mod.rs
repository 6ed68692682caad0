//! API layer - HTTP handlers and routing
//!
//! Every endpoint lives under `/api/v1`:
//! - Auth endpoints (`/auth/...`)
//! - Bootcamp endpoints, including radius search and photo upload
//! - Course and review endpoints, top level and nested under a bootcamp
//! - User administration (admin only)
//!
//! Uploaded photos are served from `/uploads`.

pub mod auth;
pub mod bootcamps;
pub mod courses;
pub mod middleware;
pub mod responses;
pub mod reviews;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware as axum_middleware,
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::Config;
use crate::db::repositories::{
    SqlxBootcampRepository, SqlxCourseRepository, SqlxReviewRepository, SqlxSessionRepository,
    SqlxUserRepository,
};
use crate::db::Database;
use crate::services::{
    BootcampService, CourseService, Geocoder, Mailer, ReviewService, UserService,
};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Wire repositories and services over one database handle
pub fn build_state(
    db: Database,
    config: &Config,
    mailer: Arc<dyn Mailer>,
    geocoder: Arc<dyn Geocoder>,
) -> AppState {
    let user_repo = SqlxUserRepository::boxed(db.clone());
    let session_repo = SqlxSessionRepository::boxed(db.clone());
    let bootcamp_repo = SqlxBootcampRepository::boxed(db.clone());
    let course_repo = SqlxCourseRepository::boxed(db.clone());
    let review_repo = SqlxReviewRepository::boxed(db);

    AppState {
        user_service: Arc::new(UserService::new(
            user_repo,
            session_repo,
            mailer,
            &config.auth,
            &config.server.public_url,
        )),
        bootcamp_service: Arc::new(BootcampService::new(
            bootcamp_repo.clone(),
            course_repo.clone(),
            geocoder,
            config.upload.clone(),
        )),
        course_service: Arc::new(CourseService::new(course_repo, bootcamp_repo.clone())),
        review_service: Arc::new(ReviewService::new(review_repo, bootcamp_repo)),
        pagination: config.pagination,
        cookie_max_age: config.auth.session_expiration_days * 24 * 60 * 60,
    }
}

/// Build the main API router
pub fn build_api_router(state: AppState, max_photo_size: u64) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = users::admin_router()
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth; each resource router gates roles)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .merge(bootcamps::protected_router(max_photo_size))
        .merge(courses::protected_router())
        .merge(reviews::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .merge(bootcamps::public_router())
        .merge(courses::public_router())
        .merge(reviews::public_router())
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, config: &Config) -> anyhow::Result<Router> {
    let origin = config
        .server
        .cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", config.server.cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    let timeout = Duration::from_secs(config.server.request_timeout_secs);

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone(), config.upload.max_file_size))
        .nest_service("/uploads", ServeDir::new(&config.upload.path))
        .fallback(route_not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(timeout))
                .layer(cors),
        )
        .with_state(state))
}

async fn route_not_found() -> (StatusCode, Json<middleware::ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(middleware::ErrorBody {
            success: false,
            error: "Route not found".to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateUserInput, UserRole};
    use crate::services::bootcamp::tests::test_places;
    use crate::services::email::RecordingMailer;
    use crate::services::StaticGeocoder;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    struct TestApp {
        server: TestServer,
        state: AppState,
        mailer: Arc<RecordingMailer>,
        uploads: TempDir,
    }

    async fn spawn_app() -> TestApp {
        let db = create_test_pool().await.unwrap();
        migrations::run_migrations(&db).await.unwrap();

        let uploads = TempDir::new().unwrap();
        let mut config = Config::default();
        config.upload.path = uploads.path().to_path_buf();
        config.upload.max_file_size = 1024;

        let mailer = Arc::new(RecordingMailer::default());
        let geocoder = Arc::new(StaticGeocoder::new(test_places()));
        let state = build_state(db, &config, mailer.clone(), geocoder);
        let server = TestServer::new(build_router(state.clone(), &config).unwrap()).unwrap();

        TestApp {
            server,
            state,
            mailer,
            uploads,
        }
    }

    impl TestApp {
        async fn register(&self, name: &str, role: &str) -> String {
            let response = self
                .server
                .post("/api/v1/auth/register")
                .json(&json!({
                    "name": name,
                    "email": format!("{}@example.com", name),
                    "password": "123456",
                    "role": role
                }))
                .await;
            assert_eq!(response.status_code(), StatusCode::OK);
            response.json::<Value>()["token"].as_str().unwrap().to_string()
        }

        async fn admin_token(&self) -> String {
            self.state
                .user_service
                .create(CreateUserInput {
                    name: "Admin".into(),
                    email: "admin@example.com".into(),
                    password: "123456".into(),
                    role: Some(UserRole::Admin),
                })
                .await
                .unwrap();
            let response = self
                .server
                .post("/api/v1/auth/login")
                .json(&json!({"email": "admin@example.com", "password": "123456"}))
                .await;
            response.json::<Value>()["token"].as_str().unwrap().to_string()
        }

        async fn create_bootcamp(&self, token: &str, name: &str, address: &str) -> Value {
            let response = self
                .server
                .post("/api/v1/bootcamps")
                .authorization_bearer(token)
                .json(&json!({
                    "name": name,
                    "description": format!("{} teaches web development", name),
                    "website": "https://example.com",
                    "address": address,
                    "careers": ["Web Development", "Data Science"],
                    "housing": true
                }))
                .await;
            assert_eq!(response.status_code(), StatusCode::CREATED, "{}", response.text());
            response.json::<Value>()["data"].clone()
        }
    }

    #[tokio::test]
    async fn test_register_and_me() {
        let app = spawn_app().await;
        let token = app.register("jane", "user").await;

        let response = app
            .server
            .get("/api/v1/auth/me")
            .authorization_bearer(&token)
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body = response.json::<Value>();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["email"], "jane@example.com");
        assert!(body["data"].get("password_hash").is_none());

        let response = app.server.get("/api/v1/auth/me").await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.json::<Value>(),
            json!({"success": false, "error": "Not authorized to access this route"})
        );
    }

    #[tokio::test]
    async fn test_register_rejects_admin_role_and_bad_body() {
        let app = spawn_app().await;
        let response = app
            .server
            .post("/api/v1/auth/register")
            .json(&json!({"name": "x", "email": "x@example.com", "password": "123456", "role": "admin"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

        let response = app
            .server
            .post("/api/v1/auth/register")
            .json(&json!({"name": "x"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["success"], false);
    }

    #[tokio::test]
    async fn test_logout_invalidates_token() {
        let app = spawn_app().await;
        let token = app.register("jane", "user").await;

        let response = app
            .server
            .get("/api/v1/auth/logout")
            .authorization_bearer(&token)
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.json::<Value>(), json!({"success": true, "data": {}}));

        let response = app
            .server
            .get("/api/v1/auth/me")
            .authorization_bearer(&token)
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_reset_password_flow() {
        let app = spawn_app().await;
        app.register("jane", "user").await;

        let response = app
            .server
            .post("/api/v1/auth/forgotpassword")
            .json(&json!({"email": "jane@example.com"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let mail = app.mailer.last().unwrap();
        let token = mail.body.rsplit('/').next().unwrap().trim().to_string();

        let path = format!("/api/v1/auth/resetpassword/{}", token);
        let response = app.server.put(&path).json(&json!({"password": "abcdef"})).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert!(response.json::<Value>()["token"].is_string());

        let response = app.server.put(&path).json(&json!({"password": "ghijkl"})).await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "Invalid token");

        let response = app
            .server
            .post("/api/v1/auth/login")
            .json(&json!({"email": "jane@example.com", "password": "abcdef"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let response = app
            .server
            .post("/api/v1/auth/forgotpassword")
            .json(&json!({"email": "nobody@example.com"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_roles_and_ownership() {
        let app = spawn_app().await;
        let user = app.register("jane", "user").await;
        let owner = app.register("pub", "publisher").await;
        let rival = app.register("rival", "publisher").await;

        let response = app
            .server
            .post("/api/v1/bootcamps")
            .json(&json!({"name": "Anon"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

        let response = app
            .server
            .post("/api/v1/bootcamps")
            .authorization_bearer(&user)
            .json(&json!({}))
            .await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.json::<Value>()["error"],
            "User role user is not authorized to access this route"
        );

        let bootcamp = app.create_bootcamp(&owner, "Devworks", "02215").await;
        let path = format!("/api/v1/bootcamps/{}", bootcamp["id"]);

        let response = app
            .server
            .put(&path)
            .authorization_bearer(&rival)
            .json(&json!({"housing": false}))
            .await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

        let response = app
            .server
            .put(&path)
            .authorization_bearer(&owner)
            .json(&json!({"housing": false}))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.json::<Value>()["data"]["housing"], false);

        let admin = app.admin_token().await;
        let response = app.server.delete(&path).authorization_bearer(&admin).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(app.server.get(&path).await.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_role_checked_before_body() {
        let app = spawn_app().await;
        let user = app.register("jane", "user").await;
        let owner = app.register("pub", "publisher").await;
        let bootcamp = app.create_bootcamp(&owner, "Devworks", "02215").await;
        let id = bootcamp["id"].as_i64().unwrap();

        let cases = [
            (format!("/api/v1/bootcamps/{}/courses", id), &user, "user"),
            (format!("/api/v1/bootcamps/{}/reviews", id), &owner, "publisher"),
        ];
        for (path, token, role) in cases {
            let response = app
                .server
                .post(&path)
                .authorization_bearer(token)
                .json(&json!({"unexpected": true}))
                .await;
            assert_eq!(response.status_code(), StatusCode::FORBIDDEN, "{}", path);
            assert_eq!(
                response.json::<Value>()["error"],
                format!("User role {} is not authorized to access this route", role).as_str()
            );
        }

        let response = app
            .server
            .put(&format!("/api/v1/bootcamps/{}", id))
            .authorization_bearer(&user)
            .text("not json")
            .await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

        let form = MultipartForm::new().add_text("other", "x");
        let response = app
            .server
            .put(&format!("/api/v1/bootcamps/{}/photo", id))
            .authorization_bearer(&user)
            .multipart(form)
            .await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_non_integer_id_is_not_found() {
        let app = spawn_app().await;
        let response = app.server.get("/api/v1/bootcamps/abc").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.json::<Value>(),
            json!({"success": false, "error": "Resource not found with id of abc"})
        );

        let response = app.server.get("/api/v1/bootcamps/42").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>()["error"], "Bootcamp not found with id of 42");
    }

    #[tokio::test]
    async fn test_list_select_sort_and_pagination() {
        let app = spawn_app().await;
        let admin = app.admin_token().await;
        for (name, zip) in [("Alpha", "02215"), ("Bravo", "02139"), ("Charlie", "10001")] {
            app.create_bootcamp(&admin, name, zip).await;
        }

        let response = app
            .server
            .get("/api/v1/bootcamps")
            .add_query_param("select", "name,city")
            .add_query_param("sort", "name")
            .add_query_param("limit", "2")
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body = response.json::<Value>();
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 2);
        assert_eq!(body["pagination"], json!({"next": {"page": 2, "limit": 2}}));
        assert_eq!(body["data"][0]["name"], "Alpha");
        assert_eq!(body["data"][1]["name"], "Bravo");
        assert!(body["data"][0]["id"].is_i64());
        assert!(body["data"][0].get("description").is_none());
        assert_eq!(body["data"][0]["courses"], json!([]));

        let body = app
            .server
            .get("/api/v1/bootcamps")
            .add_query_param("sort", "name")
            .add_query_param("page", "2")
            .add_query_param("limit", "2")
            .await
            .json::<Value>();
        assert_eq!(body["count"], 1);
        assert_eq!(body["pagination"], json!({"prev": {"page": 1, "limit": 2}}));
        assert_eq!(body["data"][0]["name"], "Charlie");

        let body = app
            .server
            .get("/api/v1/bootcamps")
            .add_query_param("city", "in(Boston,Cambridge)")
            .await
            .json::<Value>();
        assert_eq!(body["count"], 2);
        assert_eq!(body["pagination"], json!({}));

        let response = app
            .server
            .get("/api/v1/bootcamps")
            .add_query_param("average_cost[gte]", "")
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_radius_search() {
        let app = spawn_app().await;
        let admin = app.admin_token().await;
        app.create_bootcamp(&admin, "Boston Camp", "02215").await;
        app.create_bootcamp(&admin, "Cambridge Camp", "02139").await;
        app.create_bootcamp(&admin, "NYC Camp", "10001").await;

        let body = app
            .server
            .get("/api/v1/bootcamps/radius/02215/10")
            .await
            .json::<Value>();
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 2);

        let response = app.server.get("/api/v1/bootcamps/radius/02215/far").await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_photo_upload() {
        let app = spawn_app().await;
        let owner = app.register("pub", "publisher").await;
        let bootcamp = app.create_bootcamp(&owner, "Devworks", "02215").await;
        let path = format!("/api/v1/bootcamps/{}/photo", bootcamp["id"]);

        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(vec![1u8; 200]).file_name("campus.png").mime_type("image/png"),
        );
        let response = app.server.put(&path).authorization_bearer(&owner).multipart(form).await;
        assert_eq!(response.status_code(), StatusCode::OK, "{}", response.text());
        let expected = format!("photo_{}.png", bootcamp["id"]);
        assert_eq!(response.json::<Value>()["data"], expected.as_str());
        assert!(app.uploads.path().join(&expected).exists());

        let served = app.server.get(&format!("/uploads/{}", expected)).await;
        assert_eq!(served.status_code(), StatusCode::OK);

        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(b"hello".to_vec()).file_name("notes.txt").mime_type("text/plain"),
        );
        let response = app.server.put(&path).authorization_bearer(&owner).multipart(form).await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "Please upload an image file");
    }

    #[tokio::test]
    async fn test_courses_and_reviews() {
        let app = spawn_app().await;
        let owner = app.register("pub", "publisher").await;
        let reviewer = app.register("jane", "user").await;
        let bootcamp = app.create_bootcamp(&owner, "Devworks", "02215").await;
        let id = bootcamp["id"].as_i64().unwrap();

        let response = app
            .server
            .post(&format!("/api/v1/bootcamps/{}/courses", id))
            .authorization_bearer(&owner)
            .json(&json!({
                "title": "Front End Web Development",
                "description": "HTML, CSS and JavaScript",
                "weeks": 8,
                "tuition": 8000,
                "minimum_skill": "beginner"
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED, "{}", response.text());

        let body = app.server.get("/api/v1/courses").await.json::<Value>();
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["bootcamp"]["name"], "Devworks");

        let reviews_path = format!("/api/v1/bootcamps/{}/reviews", id);
        let review = json!({"title": "Great", "text": "Learned a lot", "rating": 9});
        let response = app
            .server
            .post(&reviews_path)
            .authorization_bearer(&owner)
            .json(&review)
            .await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

        let response = app
            .server
            .post(&reviews_path)
            .authorization_bearer(&reviewer)
            .json(&review)
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        let response = app
            .server
            .post(&reviews_path)
            .authorization_bearer(&reviewer)
            .json(&review)
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

        let body = app.server.get(&reviews_path).await.json::<Value>();
        assert_eq!(body["count"], 1);

        let body = app
            .server
            .get(&format!("/api/v1/bootcamps/{}", id))
            .await
            .json::<Value>();
        assert_eq!(body["data"]["average_cost"], 8000.0);
        assert_eq!(body["data"]["average_rating"], 9.0);
    }

    #[tokio::test]
    async fn test_user_admin_requires_admin() {
        let app = spawn_app().await;
        let user = app.register("jane", "user").await;
        let response = app.server.get("/api/v1/users").authorization_bearer(&user).await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

        let admin = app.admin_token().await;
        let body = app
            .server
            .get("/api/v1/users")
            .authorization_bearer(&admin)
            .add_query_param("role", "user")
            .await
            .json::<Value>();
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["email"], "jane@example.com");

        let response = app
            .server
            .post("/api/v1/users")
            .authorization_bearer(&admin)
            .json(&json!({"name": "Pat", "email": "pat@example.com", "password": "123456", "role": "publisher"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = spawn_app().await;
        let response = app.server.get("/api/v1/nothing").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>()["success"], false);
    }
}
