//! Database models

use chrono::{Datelike, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed list of media categories offered by the API
pub const CATEGORIES: &[&str] = &[
    "Book",
    "Film (DVD/BluRay)",
    "CD",
    "Vinyl/LP",
    "Video game",
    "Other",
];

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Setting {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
}

/// User account without credential columns
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role_id: Option<i64>,
    pub role_name: Option<String>,
    pub created_at: NaiveDateTime,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.role_name.as_deref() == Some(role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MediaItem {
    pub id: i64,
    pub inventory_number: String,
    pub title: String,
    pub category: String,
    pub barcode: Option<String>,
    pub author_artist: Option<String>,
    pub release_year: Option<i64>,
    pub description: Option<String>,
    pub image_filename: Option<String>,
    pub location_id: i64,
    pub user_id: Option<i64>,
    pub lent_to: Option<String>,
    pub lent_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Track {
    pub id: i64,
    pub media_item_id: i64,
    pub title: String,
    pub position: i64,
    pub duration: Option<String>,
}

/// Generate an inventory number of the form `INV-<year>-<8 hex chars>`
pub fn generate_inventory_number() -> String {
    let year = Utc::now().year();
    let unique = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("INV-{}-{}", year, unique)
}

/// Build the display path of a location, root first, joined by `" > "`
///
/// A parent id that is missing from `all` ends the walk, as does a
/// location already visited (cyclic parent links).
pub fn location_full_path(location: &Location, all: &[Location]) -> String {
    let mut names = vec![location.name.clone()];
    let mut visited = vec![location.id];
    let mut parent = location.parent_id;

    while let Some(parent_id) = parent {
        if visited.contains(&parent_id) {
            break;
        }
        let Some(next) = all.iter().find(|l| l.id == parent_id) else {
            break;
        };
        names.push(next.name.clone());
        visited.push(next.id);
        parent = next.parent_id;
    }

    names.reverse();
    names.join(" > ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(id: i64, name: &str, parent_id: Option<i64>) -> Location {
        Location {
            id,
            name: name.to_string(),
            parent_id,
        }
    }

    #[test]
    fn inventory_number_format() {
        let number = generate_inventory_number();
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "INV");
        assert_eq!(parts[1], Utc::now().year().to_string());
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn full_path_walks_to_root() {
        let all = vec![
            loc(1, "House", None),
            loc(2, "Living room", Some(1)),
            loc(3, "Shelf A", Some(2)),
        ];
        assert_eq!(
            location_full_path(&all[2], &all),
            "House > Living room > Shelf A"
        );
        assert_eq!(location_full_path(&all[0], &all), "House");
    }

    #[test]
    fn full_path_stops_on_cycle() {
        let all = vec![loc(1, "A", Some(2)), loc(2, "B", Some(1))];
        assert_eq!(location_full_path(&all[0], &all), "B > A");
    }

    #[test]
    fn full_path_ignores_missing_parent() {
        let all = vec![loc(5, "Attic", Some(99))];
        assert_eq!(location_full_path(&all[0], &all), "Attic");
    }
}
