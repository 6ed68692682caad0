//! Course API endpoints
//!
//! - GET /api/v1/courses - Filtered, paginated list, bootcamp expanded
//! - GET /api/v1/courses/{id}
//! - GET /api/v1/bootcamps/{id}/courses - Every course of one bootcamp
//! - POST /api/v1/bootcamps/{id}/courses - Publisher or admin owning the bootcamp
//! - PUT /api/v1/courses/{id}, DELETE /api/v1/courses/{id} - Owner or admin

use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::middleware::{
    require_role, ApiError, ApiJson, AppState, AuthenticatedUser, ListParams, RecordId,
};
use crate::api::responses::{CollectionResponse, DataResponse, Empty};
use crate::models::{Course, CreateCourseInput, UpdateCourseInput, UserRole};
use crate::query::AdvancedResults;

const PUBLISHERS: &[UserRole] = &[UserRole::Publisher, UserRole::Admin];

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses))
        .route("/courses/{id}", get(get_course))
        .route("/bootcamps/{id}/courses", get(list_bootcamp_courses))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/bootcamps/{id}/courses", post(create_course))
        .route("/courses/{id}", put(update_course).delete(delete_course))
        .route_layer(from_fn_with_state(PUBLISHERS, require_role))
}

/// GET /api/v1/courses
async fn list_courses(
    State(state): State<AppState>,
    ListParams(query): ListParams,
) -> Result<Json<AdvancedResults>, ApiError> {
    Ok(Json(state.course_service.list(&query).await?))
}

/// GET /api/v1/courses/{id}
async fn get_course(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<Json<DataResponse<Course>>, ApiError> {
    Ok(Json(DataResponse::new(state.course_service.get(id).await?)))
}

/// GET /api/v1/bootcamps/{id}/courses
async fn list_bootcamp_courses(
    State(state): State<AppState>,
    RecordId(bootcamp_id): RecordId,
) -> Result<Json<CollectionResponse<Course>>, ApiError> {
    let courses = state.course_service.list_for_bootcamp(bootcamp_id).await?;
    Ok(Json(CollectionResponse::new(courses)))
}

/// POST /api/v1/bootcamps/{id}/courses
async fn create_course(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    RecordId(bootcamp_id): RecordId,
    ApiJson(body): ApiJson<CreateCourseInput>,
) -> Result<(StatusCode, Json<DataResponse<Course>>), ApiError> {
    let course = state.course_service.create(&user, bootcamp_id, body).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(course))))
}

/// PUT /api/v1/courses/{id}
async fn update_course(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    RecordId(id): RecordId,
    ApiJson(body): ApiJson<UpdateCourseInput>,
) -> Result<Json<DataResponse<Course>>, ApiError> {
    Ok(Json(DataResponse::new(
        state.course_service.update(&user, id, body).await?,
    )))
}

/// DELETE /api/v1/courses/{id}
async fn delete_course(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    RecordId(id): RecordId,
) -> Result<Json<DataResponse<Empty>>, ApiError> {
    state.course_service.delete(&user, id).await?;
    Ok(Json(DataResponse::new(Empty::default())))
}
