//! Media item, cover image and track endpoints

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use hinv_common::db::{MediaItem, Track, CATEGORIES};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::api::auth::CurrentUser;
use crate::db::media::{self, MediaFields, MediaFilter};
use crate::db::locations;
use crate::services::images::MAX_IMAGE_BYTES;
use crate::{ApiError, ApiResult, AppState};

/// Location assigned when a request names none
const DEFAULT_LOCATION_ID: i64 = 1;

/// Query string of `GET /api/media`
#[derive(Debug, Default, Deserialize)]
pub struct MediaQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
}

impl MediaQuery {
    fn into_filter(self) -> ApiResult<MediaFilter> {
        let location = match self.location.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
                ApiError::BadRequest(format!("Invalid location filter '{}'", raw))
            })?),
        };
        Ok(MediaFilter {
            q: self.q,
            category: self.category,
            location,
        })
    }
}

/// Body of create and update requests
#[derive(Debug, Deserialize)]
pub struct MediaPayload {
    pub title: String,
    pub category: String,
    pub barcode: Option<String>,
    pub author_artist: Option<String>,
    pub release_year: Option<i64>,
    pub description: Option<String>,
    pub location_id: Option<i64>,
    /// Borrower; blank or missing marks the item as returned
    pub lent_to: Option<String>,
    /// Cover to download into the upload directory
    pub remote_image_url: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl MediaPayload {
    async fn validated_fields(&self, pool: &SqlitePool) -> ApiResult<MediaFields> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ApiError::BadRequest("Title is required".to_string()));
        }
        if !CATEGORIES.contains(&self.category.as_str()) {
            return Err(ApiError::BadRequest(format!(
                "Unknown category '{}'",
                self.category
            )));
        }

        let location_id = self.location_id.unwrap_or(DEFAULT_LOCATION_ID);
        if locations::get_location(pool, location_id).await?.is_none() {
            return Err(ApiError::BadRequest(format!(
                "Location {} does not exist",
                location_id
            )));
        }

        Ok(MediaFields {
            title: title.to_string(),
            category: self.category.clone(),
            barcode: non_blank(&self.barcode),
            author_artist: non_blank(&self.author_artist),
            release_year: self.release_year,
            description: non_blank(&self.description),
            location_id,
        })
    }
}

/// Item with tracks and the display path of its location
#[derive(Debug, Serialize)]
pub struct MediaDetail {
    pub item: MediaItem,
    pub tracks: Vec<Track>,
    pub location_path: Option<String>,
}

async fn remote_cover(state: &AppState, payload: &MediaPayload) -> Option<String> {
    let url = non_blank(&payload.remote_image_url)?;
    state.images.download_remote(&url).await
}

/// GET /api/categories
pub async fn list_categories() -> Json<&'static [&'static str]> {
    Json(CATEGORIES)
}

/// GET /api/media
pub async fn list_media(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
) -> ApiResult<Json<Vec<MediaItem>>> {
    let filter = query.into_filter()?;
    let pool = state.db.pool().await;
    Ok(Json(media::search_media(&pool, &filter).await?))
}

/// POST /api/media
pub async fn create_media(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<MediaPayload>,
) -> ApiResult<(StatusCode, Json<MediaItem>)> {
    let pool = state.db.pool().await;
    let fields = payload.validated_fields(&pool).await?;
    let image = remote_cover(&state, &payload).await;

    let item = media::create_media(&pool, &fields, image.as_deref(), Some(user.id)).await?;
    info!(
        id = item.id,
        inventory_number = %item.inventory_number,
        user = %user.username,
        "Media item created"
    );
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /api/media/:id
pub async fn get_media(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MediaDetail>> {
    let pool = state.db.pool().await;
    let item = media::get_media(&pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Media item {}", id)))?;
    let tracks = media::list_tracks(&pool, id).await?;
    let location_path = locations::full_path(&pool, item.location_id).await?;

    Ok(Json(MediaDetail {
        item,
        tracks,
        location_path,
    }))
}

/// PUT /api/media/:id
pub async fn update_media(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<MediaPayload>,
) -> ApiResult<Json<MediaItem>> {
    let pool = state.db.pool().await;
    if media::get_media(&pool, id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Media item {}", id)));
    }
    let fields = payload.validated_fields(&pool).await?;
    let image = remote_cover(&state, &payload).await;

    let item = media::update_media(
        &pool,
        id,
        &fields,
        payload.lent_to.as_deref(),
        image.as_deref(),
    )
    .await?;
    info!(id, lent_to = ?item.lent_to, "Media item updated");
    Ok(Json(item))
}

/// DELETE /api/media/:id
pub async fn delete_media(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let pool = state.db.pool().await;
    media::delete_media(&pool, id).await?;
    info!(id, "Media item deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/media/:id/image
///
/// Multipart form with one file field named `image`.
pub async fn upload_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> ApiResult<Json<MediaItem>> {
    let pool = state.db.pool().await;
    if media::get_media(&pool, id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Media item {}", id)));
    }

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        let original_name = field.file_name().unwrap_or_default().to_string();
        if original_name.is_empty() {
            return Err(ApiError::BadRequest("No file selected".to_string()));
        }
        let data = field.bytes().await?;

        let filename = state.images.save_upload(&original_name, &data).await?;
        let item = media::set_image(&pool, id, &filename).await?;
        return Ok(Json(item));
    }

    Err(ApiError::BadRequest("Missing 'image' file field".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct TrackPayload {
    pub title: String,
    #[serde(default)]
    pub position: i64,
    pub duration: Option<String>,
}

/// POST /api/media/:id/tracks
pub async fn add_track(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<TrackPayload>,
) -> ApiResult<(StatusCode, Json<Track>)> {
    let pool = state.db.pool().await;
    let track = media::add_track(
        &pool,
        id,
        &payload.title,
        payload.position,
        payload.duration.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(track)))
}

/// DELETE /api/tracks/:id
pub async fn delete_track(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let pool = state.db.pool().await;
    let media_item_id = media::delete_track(&pool, id).await?;
    info!(track = id, media_item_id, "Track deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub fn media_routes() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list_categories))
        .route("/api/media", get(list_media).post(create_media))
        .route(
            "/api/media/:id",
            get(get_media).put(update_media).delete(delete_media),
        )
        .route(
            "/api/media/:id/image",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .route("/api/media/:id/tracks", post(add_track))
        .route("/api/tracks/:id", delete(delete_track))
}
