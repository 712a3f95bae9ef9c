//! User and role queries

use hinv_common::auth::{generate_salt, hash_password, verify_password};
use hinv_common::db::{Role, User};
use hinv_common::{Error, Result};
use sqlx::SqlitePool;

const USER_SELECT: &str = r#"
    SELECT u.id, u.username, u.role_id, r.name AS role_name, u.created_at
    FROM users u
    LEFT JOIN roles r ON r.id = u.role_id
"#;

pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("{} WHERE u.id = ?", USER_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn list_users(pool: &SqlitePool) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!("{} ORDER BY u.username", USER_SELECT))
        .fetch_all(pool)
        .await?;
    Ok(users)
}

/// Check credentials and return the matching user
///
/// Unknown user and wrong password produce the same error.
pub async fn authenticate(pool: &SqlitePool, username: &str, password: &str) -> Result<User> {
    let row: Option<(i64, String, String)> =
        sqlx::query_as("SELECT id, password_salt, password_hash FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;

    let invalid = || Error::Unauthorized("Invalid username or password".to_string());
    let (id, salt, hash) = row.ok_or_else(invalid)?;
    if !verify_password(password, &salt, &hash) {
        return Err(invalid());
    }

    get_user(pool, id).await?.ok_or_else(invalid)
}

pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    password: &str,
    role_id: i64,
) -> Result<User> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(Error::InvalidInput(
            "Username and password are required".to_string(),
        ));
    }
    if get_role(pool, role_id).await?.is_none() {
        return Err(Error::InvalidInput(format!("Unknown role id {}", role_id)));
    }

    let salt = generate_salt();
    let id = sqlx::query(
        "INSERT INTO users (username, password_hash, password_salt, role_id) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(hash_password(password, &salt))
    .bind(&salt)
    .bind(role_id)
    .execute(pool)
    .await
    .map_err(|e| Error::from_unique_violation(e, &format!("User '{}'", username)))?
    .last_insert_rowid();

    get_user(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {}", id)))
}

pub async fn delete_user(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("User {}", id)));
    }
    Ok(())
}

/// Replace a user's password after checking the current one
pub async fn change_password(
    pool: &SqlitePool,
    id: i64,
    current_password: &str,
    new_password: &str,
) -> Result<()> {
    let row: Option<(String, String)> =
        sqlx::query_as("SELECT password_salt, password_hash FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    let (salt, hash) = row.ok_or_else(|| Error::NotFound(format!("User {}", id)))?;

    if !verify_password(current_password, &salt, &hash) {
        return Err(Error::InvalidInput("Current password is incorrect".to_string()));
    }
    if new_password.is_empty() {
        return Err(Error::InvalidInput("New password must not be empty".to_string()));
    }

    let salt = generate_salt();
    sqlx::query("UPDATE users SET password_hash = ?, password_salt = ? WHERE id = ?")
        .bind(hash_password(new_password, &salt))
        .bind(&salt)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_roles(pool: &SqlitePool) -> Result<Vec<Role>> {
    let roles = sqlx::query_as::<_, Role>("SELECT id, name FROM roles ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(roles)
}

pub async fn get_role(pool: &SqlitePool, id: i64) -> Result<Option<Role>> {
    let role = sqlx::query_as::<_, Role>("SELECT id, name FROM roles WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(role)
}
