//! Review API endpoints
//!
//! - GET /api/v1/reviews - Filtered, paginated list, bootcamp expanded
//! - GET /api/v1/reviews/{id}
//! - GET /api/v1/bootcamps/{id}/reviews
//! - POST /api/v1/bootcamps/{id}/reviews - Users and admins, once per bootcamp
//! - PUT /api/v1/reviews/{id}, DELETE /api/v1/reviews/{id} - Author or admin

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
use crate::models::{CreateReviewInput, Review, UpdateReviewInput, UserRole};
use crate::query::AdvancedResults;

const REVIEWERS: &[UserRole] = &[UserRole::User, UserRole::Admin];

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/reviews", get(list_reviews))
        .route("/reviews/{id}", get(get_review))
        .route("/bootcamps/{id}/reviews", get(list_bootcamp_reviews))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/bootcamps/{id}/reviews", post(create_review))
        .route("/reviews/{id}", put(update_review).delete(delete_review))
        .route_layer(from_fn_with_state(REVIEWERS, require_role))
}

async fn list_reviews(
    State(state): State<AppState>,
    ListParams(query): ListParams,
) -> Result<Json<AdvancedResults>, ApiError> {
    Ok(Json(state.review_service.list(&query).await?))
}

async fn get_review(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<Json<DataResponse<Review>>, ApiError> {
    Ok(Json(DataResponse::new(state.review_service.get(id).await?)))
}

async fn list_bootcamp_reviews(
    State(state): State<AppState>,
    RecordId(bootcamp_id): RecordId,
) -> Result<Json<CollectionResponse<Review>>, ApiError> {
    let reviews = state.review_service.list_for_bootcamp(bootcamp_id).await?;
    Ok(Json(CollectionResponse::new(reviews)))
}

async fn create_review(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    RecordId(bootcamp_id): RecordId,
    ApiJson(body): ApiJson<CreateReviewInput>,
) -> Result<(StatusCode, Json<DataResponse<Review>>), ApiError> {
    let review = state.review_service.create(&user, bootcamp_id, body).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(review))))
}

async fn update_review(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    RecordId(id): RecordId,
    ApiJson(body): ApiJson<UpdateReviewInput>,
) -> Result<Json<DataResponse<Review>>, ApiError> {
    Ok(Json(DataResponse::new(
        state.review_service.update(&user, id, body).await?,
    )))
}

async fn delete_review(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    RecordId(id): RecordId,
) -> Result<Json<DataResponse<Empty>>, ApiError> {
    state.review_service.delete(&user, id).await?;
    Ok(Json(DataResponse::new(Empty::default())))
}
