//! Account queries shared by login, registration, user management and settings.

use crate::crypto::Role;
use sqlx::{PgPool, Row, postgres::PgRow};

/// Credentials row for an active account. Never serialized.
pub(crate) struct LoginRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub password_hash: String,
}

pub(crate) struct NewAccount<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
    pub is_active: bool,
}

/// Stored roles outside `admin`/`user` never reach a token; such rows are treated as `user`.
pub(crate) fn role_from_row(row: &PgRow) -> Role {
    Role::parse(row.get::<String, _>("role").as_str()).unwrap_or(Role::User)
}

pub(crate) async fn find_active_login(
    pool: &PgPool,
    username: &str,
) -> Result<Option<LoginRecord>, sqlx::Error> {
    let query = r"
        SELECT id, username, email, role, password_hash
        FROM users
        WHERE username = $1 AND is_active = TRUE
        LIMIT 1
    ";
    let row = sqlx::query(query)
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| LoginRecord {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        role: role_from_row(&row),
        password_hash: row.get("password_hash"),
    }))
}

pub(crate) async fn touch_last_login(pool: &PgPool, user_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// True when another account (other than `exclude_id`) already uses the username or email.
pub(crate) async fn identity_taken(
    pool: &PgPool,
    username: &str,
    email: &str,
    exclude_id: Option<i64>,
) -> Result<bool, sqlx::Error> {
    let query = r"
        SELECT 1
        FROM users
        WHERE (username = $1 OR email = $2)
          AND ($3::BIGINT IS NULL OR id <> $3)
        LIMIT 1
    ";
    let row = sqlx::query(query)
        .bind(username)
        .bind(email)
        .bind(exclude_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

pub(crate) async fn insert_account(
    pool: &PgPool,
    account: NewAccount<'_>,
) -> Result<i64, sqlx::Error> {
    let query = r"
        INSERT INTO users (username, password_hash, email, role, is_active)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ";
    let row = sqlx::query(query)
        .bind(account.username)
        .bind(account.password_hash)
        .bind(account.email)
        .bind(account.role.as_str())
        .bind(account.is_active)
        .fetch_one(pool)
        .await?;
    Ok(row.get("id"))
}

pub(crate) async fn password_hash(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query("SELECT password_hash FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| row.get("password_hash")))
}

pub(crate) async fn set_password_hash(
    pool: &PgPool,
    user_id: i64,
    password_hash: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
        .bind(password_hash)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
