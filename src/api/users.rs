//! User administration endpoints (admin only)
//!
//! - GET /api/v1/users
//! - GET /api/v1/users/{id}
//! - POST /api/v1/users
//! - PUT /api/v1/users/{id}
//! - DELETE /api/v1/users/{id}

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, ApiJson, AppState, ListParams, RecordId};
use crate::api::responses::{DataResponse, Empty};
use crate::models::{CreateUserInput, UpdateUserInput, User};
use crate::query::AdvancedResults;

/// Routes behind `require_auth` and `require_admin`
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

async fn list_users(
    State(state): State<AppState>,
    ListParams(query): ListParams,
) -> Result<Json<AdvancedResults>, ApiError> {
    Ok(Json(state.user_service.list(&query).await?))
}

async fn get_user(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<Json<DataResponse<User>>, ApiError> {
    Ok(Json(DataResponse::new(state.user_service.get(id).await?)))
}

async fn create_user(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateUserInput>,
) -> Result<(StatusCode, Json<DataResponse<User>>), ApiError> {
    let user = state.user_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(user))))
}

async fn update_user(
    State(state): State<AppState>,
    RecordId(id): RecordId,
    ApiJson(body): ApiJson<UpdateUserInput>,
) -> Result<Json<DataResponse<User>>, ApiError> {
    Ok(Json(DataResponse::new(
        state.user_service.update(id, body).await?,
    )))
}

async fn delete_user(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<Json<DataResponse<Empty>>, ApiError> {
    state.user_service.delete(id).await?;
    Ok(Json(DataResponse::new(Empty::default())))
}
