//! Authentication API endpoints
//!
//! Handles HTTP requests for user authentication:
//! - POST /api/v1/auth/register - User registration
//! - POST /api/v1/auth/login - User login
//! - GET /api/v1/auth/logout - User logout
//! - GET /api/v1/auth/me - Get current user
//! - PUT /api/v1/auth/updatedetails - Change name or email
//! - PUT /api/v1/auth/updatepassword - Change password
//! - POST /api/v1/auth/forgotpassword - Email a reset link
//! - PUT /api/v1/auth/resetpassword/{token} - Set a new password with a reset token

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{extract_session_token, ApiError, ApiJson, AppState, AuthenticatedUser};
use crate::api::responses::{DataResponse, Empty, TokenResponse};
use crate::models::{CreateUserInput, User};
use crate::services::{LoginInput, UpdateDetailsInput, UpdatePasswordInput};

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub password: String,
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", get(logout))
        .route("/me", get(get_current_user))
        .route("/updatedetails", put(update_details))
        .route("/updatepassword", put(update_password))
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/forgotpassword", post(forgot_password))
        .route("/resetpassword/{token}", put(reset_password))
}

/// Token body plus a `token` cookie carrying the same value
fn token_response(state: &AppState, token: String) -> Result<Response, ApiError> {
    let cookie = format!(
        "token={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        token, state.cookie_max_age
    );
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::internal_error(anyhow::anyhow!("Invalid cookie value: {}", e)))?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(TokenResponse {
            success: true,
            token,
        }),
    )
        .into_response())
}

/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateUserInput>,
) -> Result<Response, ApiError> {
    let (_, session) = state.user_service.register(body).await?;
    token_response(&state, session.id)
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginInput>,
) -> Result<Response, ApiError> {
    let (user, session) = state.user_service.login(body).await?;
    tracing::debug!("User {} logged in", user.id);
    token_response(&state, session.id)
}

/// GET /api/v1/auth/logout
///
/// Deletes the session and overwrites the cookie.
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }

    Ok((
        [(
            header::SET_COOKIE,
            HeaderValue::from_static("token=none; Path=/; HttpOnly; SameSite=Lax; Max-Age=10"),
        )],
        Json(DataResponse::new(Empty::default())),
    ))
}

/// GET /api/v1/auth/me
async fn get_current_user(AuthenticatedUser(user): AuthenticatedUser) -> Json<DataResponse<User>> {
    Json(DataResponse::new(user))
}

/// PUT /api/v1/auth/updatedetails
async fn update_details(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(body): ApiJson<UpdateDetailsInput>,
) -> Result<Json<DataResponse<User>>, ApiError> {
    let updated = state.user_service.update_details(&user, body).await?;
    Ok(Json(DataResponse::new(updated)))
}

/// PUT /api/v1/auth/updatepassword
async fn update_password(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(body): ApiJson<UpdatePasswordInput>,
) -> Result<Response, ApiError> {
    let session = state.user_service.update_password(&user, body).await?;
    token_response(&state, session.id)
}

/// POST /api/v1/auth/forgotpassword
async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<DataResponse<&'static str>>, ApiError> {
    state.user_service.forgot_password(&body.email).await?;
    Ok(Json(DataResponse::new("Email sent")))
}

/// PUT /api/v1/auth/resetpassword/{token}
async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> Result<Response, ApiError> {
    let (_, session) = state
        .user_service
        .reset_password(&token, &body.password)
        .await?;
    token_response(&state, session.id)
}
