//! Media items and their tracks

use chrono::{NaiveDateTime, Utc};
use hinv_common::db::{generate_inventory_number, MediaItem, Track};
use hinv_common::{Error, Result};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

/// Search parameters; empty values are ignored
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaFilter {
    pub q: Option<String>,
    pub category: Option<String>,
    pub location: Option<i64>,
}

/// Editable columns of a media item
#[derive(Debug, Clone, Default)]
pub struct MediaFields {
    pub title: String,
    pub category: String,
    pub barcode: Option<String>,
    pub author_artist: Option<String>,
    pub release_year: Option<i64>,
    pub description: Option<String>,
    pub location_id: i64,
}

/// Lending columns after an edit
///
/// A non-blank borrower starts the lending time now only if the item had no
/// borrower; an item that was already lent keeps its stored time, even NULL.
/// A blank borrower clears both.
pub fn lending_state(
    current_lent_to: Option<&str>,
    current_lent_at: Option<NaiveDateTime>,
    requested: Option<&str>,
    now: NaiveDateTime,
) -> (Option<String>, Option<NaiveDateTime>) {
    match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(borrower) => {
            let was_lent = current_lent_to.is_some_and(|s| !s.is_empty());
            let lent_at = if was_lent { current_lent_at } else { Some(now) };
            (Some(borrower.to_string()), lent_at)
        }
        None => (None, None),
    }
}

pub async fn search_media(pool: &SqlitePool, filter: &MediaFilter) -> Result<Vec<MediaItem>> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM media_items WHERE 1 = 1");

    if let Some(text) = filter.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", text.to_lowercase());
        query.push(" AND (");
        for (i, column) in ["title", "author_artist", "inventory_number", "barcode"]
            .iter()
            .enumerate()
        {
            if i > 0 {
                query.push(" OR ");
            }
            query
                .push(format!("lower({}) LIKE ", column))
                .push_bind(pattern.clone());
        }
        query.push(")");
    }
    if let Some(category) = filter.category.as_deref().filter(|s| !s.is_empty()) {
        query.push(" AND category = ").push_bind(category.to_string());
    }
    if let Some(location) = filter.location {
        query.push(" AND location_id = ").push_bind(location);
    }
    query.push(" ORDER BY created_at DESC, id DESC");

    let items = query.build_query_as::<MediaItem>().fetch_all(pool).await?;
    Ok(items)
}

pub async fn get_media(pool: &SqlitePool, id: i64) -> Result<Option<MediaItem>> {
    let item = sqlx::query_as::<_, MediaItem>("SELECT * FROM media_items WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(item)
}

async fn require_media(pool: &SqlitePool, id: i64) -> Result<MediaItem> {
    get_media(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Media item {}", id)))
}

/// Insert a new item with a generated inventory number
pub async fn create_media(
    pool: &SqlitePool,
    fields: &MediaFields,
    image_filename: Option<&str>,
    user_id: Option<i64>,
) -> Result<MediaItem> {
    let inventory_number = generate_inventory_number();
    let id = sqlx::query(
        r#"
        INSERT INTO media_items (
            inventory_number, title, category, barcode, author_artist, release_year,
            description, image_filename, location_id, user_id
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&inventory_number)
    .bind(&fields.title)
    .bind(&fields.category)
    .bind(&fields.barcode)
    .bind(&fields.author_artist)
    .bind(fields.release_year)
    .bind(&fields.description)
    .bind(image_filename)
    .bind(fields.location_id)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|e| Error::from_unique_violation(e, &format!("Inventory number {}", inventory_number)))?
    .last_insert_rowid();

    require_media(pool, id).await
}

/// Overwrite the editable columns and apply the lending rule
///
/// `image_filename` replaces the stored image only when given.
pub async fn update_media(
    pool: &SqlitePool,
    id: i64,
    fields: &MediaFields,
    lent_to: Option<&str>,
    image_filename: Option<&str>,
) -> Result<MediaItem> {
    let current = require_media(pool, id).await?;
    let (lent_to, lent_at) = lending_state(
        current.lent_to.as_deref(),
        current.lent_at,
        lent_to,
        Utc::now().naive_utc(),
    );

    sqlx::query(
        r#"
        UPDATE media_items SET
            title = ?, category = ?, barcode = ?, author_artist = ?, release_year = ?,
            description = ?, location_id = ?, lent_to = ?, lent_at = ?,
            image_filename = COALESCE(?, image_filename)
        WHERE id = ?
        "#,
    )
    .bind(&fields.title)
    .bind(&fields.category)
    .bind(&fields.barcode)
    .bind(&fields.author_artist)
    .bind(fields.release_year)
    .bind(&fields.description)
    .bind(fields.location_id)
    .bind(lent_to)
    .bind(lent_at)
    .bind(image_filename)
    .bind(id)
    .execute(pool)
    .await?;

    require_media(pool, id).await
}

pub async fn set_image(pool: &SqlitePool, id: i64, image_filename: &str) -> Result<MediaItem> {
    let result = sqlx::query("UPDATE media_items SET image_filename = ? WHERE id = ?")
        .bind(image_filename)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Media item {}", id)));
    }
    require_media(pool, id).await
}

pub async fn delete_media(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM media_items WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Media item {}", id)));
    }
    Ok(())
}

// ============================================================================
// Tracks
// ============================================================================

pub async fn list_tracks(pool: &SqlitePool, media_item_id: i64) -> Result<Vec<Track>> {
    let tracks = sqlx::query_as::<_, Track>(
        "SELECT * FROM tracks WHERE media_item_id = ? ORDER BY position, id",
    )
    .bind(media_item_id)
    .fetch_all(pool)
    .await?;
    Ok(tracks)
}

pub async fn add_track(
    pool: &SqlitePool,
    media_item_id: i64,
    title: &str,
    position: i64,
    duration: Option<&str>,
) -> Result<Track> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::InvalidInput("Track title is required".to_string()));
    }
    require_media(pool, media_item_id).await?;

    let id = sqlx::query(
        "INSERT INTO tracks (media_item_id, title, position, duration) VALUES (?, ?, ?, ?)",
    )
    .bind(media_item_id)
    .bind(title)
    .bind(position)
    .bind(duration.map(str::trim).filter(|d| !d.is_empty()))
    .execute(pool)
    .await?
    .last_insert_rowid();

    let track = sqlx::query_as::<_, Track>("SELECT * FROM tracks WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(track)
}

/// Delete a track and return the id of the item it belonged to
pub async fn delete_track(pool: &SqlitePool, id: i64) -> Result<i64> {
    let media_item_id: Option<i64> =
        sqlx::query_scalar("SELECT media_item_id FROM tracks WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    let media_item_id = media_item_id.ok_or_else(|| Error::NotFound(format!("Track {}", id)))?;

    sqlx::query("DELETE FROM tracks WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(media_item_id)
}
