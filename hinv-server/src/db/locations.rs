//! Storage location hierarchy

use hinv_common::db::{location_full_path, Location};
use hinv_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;

/// Location with its display path
#[derive(Debug, Clone, Serialize)]
pub struct LocationView {
    #[serde(flatten)]
    pub location: Location,
    pub full_path: String,
}

pub async fn list_locations(pool: &SqlitePool) -> Result<Vec<Location>> {
    let locations = sqlx::query_as::<_, Location>("SELECT id, name, parent_id FROM locations")
        .fetch_all(pool)
        .await?;
    Ok(locations)
}

/// All locations with full paths, sorted by path
pub async fn list_with_paths(pool: &SqlitePool) -> Result<Vec<LocationView>> {
    let all = list_locations(pool).await?;
    let mut views: Vec<LocationView> = all
        .iter()
        .map(|l| LocationView {
            location: l.clone(),
            full_path: location_full_path(l, &all),
        })
        .collect();
    views.sort_by(|a, b| a.full_path.cmp(&b.full_path));
    Ok(views)
}

pub async fn get_location(pool: &SqlitePool, id: i64) -> Result<Option<Location>> {
    let location =
        sqlx::query_as::<_, Location>("SELECT id, name, parent_id FROM locations WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(location)
}

pub async fn full_path(pool: &SqlitePool, id: i64) -> Result<Option<String>> {
    let all = list_locations(pool).await?;
    Ok(all
        .iter()
        .find(|l| l.id == id)
        .map(|l| location_full_path(l, &all)))
}

async fn require_parent(pool: &SqlitePool, parent_id: Option<i64>) -> Result<()> {
    if let Some(parent_id) = parent_id {
        if get_location(pool, parent_id).await?.is_none() {
            return Err(Error::InvalidInput(format!(
                "Parent location {} does not exist",
                parent_id
            )));
        }
    }
    Ok(())
}

fn require_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Location name is required".to_string()));
    }
    Ok(name)
}

pub async fn create_location(
    pool: &SqlitePool,
    name: &str,
    parent_id: Option<i64>,
) -> Result<Location> {
    let name = require_name(name)?;
    require_parent(pool, parent_id).await?;

    let id = sqlx::query("INSERT INTO locations (name, parent_id) VALUES (?, ?)")
        .bind(name)
        .bind(parent_id)
        .execute(pool)
        .await?
        .last_insert_rowid();

    Ok(Location {
        id,
        name: name.to_string(),
        parent_id,
    })
}

/// Rename or move a location; a location cannot be its own parent
pub async fn update_location(
    pool: &SqlitePool,
    id: i64,
    name: &str,
    parent_id: Option<i64>,
) -> Result<Location> {
    let name = require_name(name)?;
    if parent_id == Some(id) {
        return Err(Error::InvalidInput(
            "A location cannot be its own parent".to_string(),
        ));
    }
    if get_location(pool, id).await?.is_none() {
        return Err(Error::NotFound(format!("Location {}", id)));
    }
    require_parent(pool, parent_id).await?;

    sqlx::query("UPDATE locations SET name = ?, parent_id = ? WHERE id = ?")
        .bind(name)
        .bind(parent_id)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(Location {
        id,
        name: name.to_string(),
        parent_id,
    })
}

/// Delete an empty leaf location
pub async fn delete_location(pool: &SqlitePool, id: i64) -> Result<()> {
    if get_location(pool, id).await?.is_none() {
        return Err(Error::NotFound(format!("Location {}", id)));
    }

    let children: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM locations WHERE parent_id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media_items WHERE location_id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    if children > 0 || items > 0 {
        return Err(Error::Conflict(format!(
            "Location {} still has {} sub-locations and {} items",
            id, children, items
        )));
    }

    sqlx::query("DELETE FROM locations WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
