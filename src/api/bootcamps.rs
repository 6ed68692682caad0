//! Bootcamp API endpoints
//!
//! - GET /api/v1/bootcamps - Filtered, paginated list with courses
//! - GET /api/v1/bootcamps/{id}
//! - GET /api/v1/bootcamps/radius/{zipcode}/{distance}
//! - POST /api/v1/bootcamps - Publisher or admin
//! - PUT /api/v1/bootcamps/{id} - Owner or admin
//! - DELETE /api/v1/bootcamps/{id} - Owner or admin
//! - PUT /api/v1/bootcamps/{id}/photo - Owner or admin, multipart field `file`

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::middleware::{
    require_role, ApiError, ApiJson, AppState, AuthenticatedUser, ListParams, RecordId,
};
use crate::api::responses::{CollectionResponse, DataResponse, Empty};
use crate::models::{Bootcamp, CreateBootcampInput, UpdateBootcampInput, UserRole};
use crate::query::AdvancedResults;
use crate::services::PhotoUpload;

const PUBLISHERS: &[UserRole] = &[UserRole::Publisher, UserRole::Admin];

/// Multipart overhead allowed on top of the configured photo size
const MULTIPART_SLACK: usize = 64 * 1024;

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/bootcamps", get(list_bootcamps))
        .route("/bootcamps/{id}", get(get_bootcamp))
        .route("/bootcamps/radius/{zipcode}/{distance}", get(bootcamps_in_radius))
}

/// Routes behind `require_auth`, open to publishers and admins;
/// `max_photo_size` bounds the photo body
pub fn protected_router(max_photo_size: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_photo_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_SLACK);

    Router::new()
        .route("/bootcamps", post(create_bootcamp))
        .route("/bootcamps/{id}", put(update_bootcamp).delete(delete_bootcamp))
        .route(
            "/bootcamps/{id}/photo",
            put(upload_photo).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route_layer(from_fn_with_state(PUBLISHERS, require_role))
}

/// GET /api/v1/bootcamps
async fn list_bootcamps(
    State(state): State<AppState>,
    ListParams(query): ListParams,
) -> Result<Json<AdvancedResults>, ApiError> {
    Ok(Json(state.bootcamp_service.list(&query).await?))
}

/// GET /api/v1/bootcamps/{id}
async fn get_bootcamp(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<Json<DataResponse<Bootcamp>>, ApiError> {
    Ok(Json(DataResponse::new(state.bootcamp_service.get(id).await?)))
}

/// GET /api/v1/bootcamps/radius/{zipcode}/{distance}
///
/// `distance` is in miles.
async fn bootcamps_in_radius(
    State(state): State<AppState>,
    Path((zipcode, distance)): Path<(String, String)>,
) -> Result<Json<CollectionResponse<Bootcamp>>, ApiError> {
    let miles: f64 = distance
        .trim()
        .parse()
        .map_err(|_| ApiError::validation_error(format!("Invalid distance: {}", distance)))?;

    let bootcamps = state.bootcamp_service.within_radius(&zipcode, miles).await?;
    Ok(Json(CollectionResponse::new(bootcamps)))
}

/// POST /api/v1/bootcamps
async fn create_bootcamp(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(body): ApiJson<CreateBootcampInput>,
) -> Result<(StatusCode, Json<DataResponse<Bootcamp>>), ApiError> {
    let bootcamp = state.bootcamp_service.create(&user, body).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(bootcamp))))
}

/// PUT /api/v1/bootcamps/{id}
async fn update_bootcamp(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    RecordId(id): RecordId,
    ApiJson(body): ApiJson<UpdateBootcampInput>,
) -> Result<Json<DataResponse<Bootcamp>>, ApiError> {
    let bootcamp = state.bootcamp_service.update(&user, id, body).await?;
    Ok(Json(DataResponse::new(bootcamp)))
}

/// DELETE /api/v1/bootcamps/{id}
async fn delete_bootcamp(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    RecordId(id): RecordId,
) -> Result<Json<DataResponse<Empty>>, ApiError> {
    state.bootcamp_service.delete(&user, id).await?;
    Ok(Json(DataResponse::new(Empty::default())))
}

/// PUT /api/v1/bootcamps/{id}/photo
///
/// Reads the first multipart field named `file`.
async fn upload_photo(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    RecordId(id): RecordId,
    mut multipart: Multipart,
) -> Result<Json<DataResponse<String>>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?;

        upload = Some(PhotoUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let file_name = state.bootcamp_service.upload_photo(&user, id, upload).await?;
    Ok(Json(DataResponse::new(file_name)))
}
