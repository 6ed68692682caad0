//! API middleware
//!
//! Contains:
//! - `AppState`, the services shared by every handler
//! - `ApiError`, the single translation point from service errors to HTTP
//! - Authentication (session token validation) and role authorization
//! - Extractors for path ids, list queries and JSON bodies

use axum::{
    extract::{
        rejection::JsonRejection, FromRequest, FromRequestParts, Path, Query, Request, State,
    },
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::PaginationConfig;
use crate::models::{User, UserRole};
use crate::query::{ListQuery, QueryError};
use crate::services::{BootcampService, CourseService, ReviewService, ServiceError, UserService};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub bootcamp_service: Arc<BootcampService>,
    pub course_service: Arc<CourseService>,
    pub review_service: Arc<ReviewService>,
    pub pagination: PaginationConfig,
    /// Lifetime of the `token` cookie, in seconds
    pub cookie_max_age: i64,
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl AuthenticatedUser {
    /// Reject users whose role is not listed
    pub fn authorize(&self, roles: &[UserRole]) -> Result<&User, ApiError> {
        if self.0.has_role(roles) {
            Ok(&self.0)
        } else {
            Err(ApiError::forbidden(format!(
                "User role {} is not authorized to access this route",
                self.0.role
            )))
        }
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Not authorized to access this route"))
    }
}

/// Error response for API errors
///
/// Serialized as `{success: false, error: message}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    /// Log the cause and hide it from the client
    pub fn internal_error(err: anyhow::Error) -> Self {
        tracing::error!("Unexpected error: {:#}", err);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Server Error")
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(message) => Self::not_found(message),
            ServiceError::Validation(message) => Self::validation_error(message),
            ServiceError::Unauthorized(message) => Self::unauthorized(message),
            ServiceError::Forbidden(message) => Self::forbidden(message),
            ServiceError::Upstream(message) => Self::upstream(message),
            ServiceError::Internal(err) => Self::internal_error(err),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ServiceError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Extract session token from the Authorization header or `token` cookie
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix("token=") {
                    if !token.is_empty() && token != "none" {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Not authorized to access this route"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Not authorized to access this route"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Role authorization middleware; runs after `require_auth` and before the
/// handler reads the request body
///
/// ```ignore
/// router.route_layer(from_fn_with_state(PUBLISHERS, require_role))
/// ```
pub async fn require_role(
    State(roles): State<&'static [UserRole]>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize_request(&request, roles)?;
    Ok(next.run(request).await)
}

/// Admin authorization middleware; runs after `require_auth`
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    authorize_request(&request, &[UserRole::Admin])?;
    Ok(next.run(request).await)
}

fn authorize_request(request: &Request, roles: &[UserRole]) -> Result<(), ApiError> {
    request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Not authorized to access this route"))?
        .authorize(roles)?;
    Ok(())
}

/// Integer id from a single `{id}` path segment
///
/// Anything that is not an integer cannot name a record and is reported as
/// not found.
#[derive(Debug, Clone, Copy)]
pub struct RecordId(pub i64);

impl<S> FromRequestParts<S> for RecordId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::not_found("Resource not found"))?;
        raw.trim()
            .parse::<i64>()
            .map(RecordId)
            .map_err(|_| ApiError::not_found(format!("Resource not found with id of {}", raw)))
    }
}

/// Parsed filter, projection, sort and paging parameters
#[derive(Debug, Clone)]
pub struct ListParams(pub ListQuery);

impl FromRequestParts<AppState> for ListParams {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map_err(|e| ApiError::validation_error(e.body_text()))?;
        let query = ListQuery::from_pairs(pairs, &state.pagination)?;
        Ok(Self(query))
    }
}

/// JSON body whose rejections use the API error shape
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::validation_error(e.body_text()))?;
        Ok(Self(value))
    }
}
