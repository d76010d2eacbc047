//! User operations.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{User, UserRole};

const USER_COLUMNS: &str = "id, username, role, created_by, created_at";

/// Create an admin, which starts a new tenant.
pub async fn create_admin(pool: &SqlitePool, username: &str) -> Result<User> {
    insert_user(pool, username, UserRole::Admin, None).await
}

/// Create a team member owned by the given admin.
pub async fn create_member(pool: &SqlitePool, username: &str, admin_id: i64) -> Result<User> {
    let admin = get_user(pool, admin_id).await?;
    if !admin.is_admin() {
        return Err(DatabaseError::not_found("Admin", admin_id));
    }
    insert_user(pool, username, UserRole::Member, Some(admin_id)).await
}

async fn insert_user(
    pool: &SqlitePool,
    username: &str,
    role: UserRole,
    created_by: Option<i64>,
) -> Result<User> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (username, role, created_by)
        VALUES (?, ?, ?)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(username)
    .bind(role)
    .bind(created_by)
    .fetch_one(pool)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "User", username))
}

/// Get a user by ID.
pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<User> {
    find_user(pool, id)
        .await?
        .ok_or_else(|| DatabaseError::not_found("User", id))
}

/// Get a user by ID, if it exists.
pub async fn find_user(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT {USER_COLUMNS}
        FROM users
        WHERE id = ?
        "#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// List the members created by an admin.
pub async fn list_team_members(pool: &SqlitePool, admin_id: i64) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT {USER_COLUMNS}
        FROM users
        WHERE created_by = ? AND role = 'member'
        ORDER BY username
        "#
    ))
    .bind(admin_id)
    .fetch_all(pool)
    .await?;

    Ok(users)
}
