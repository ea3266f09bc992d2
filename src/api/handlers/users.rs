//! Admin-only account management.
//!
//! Password hashes never leave the database layer; every response type here omits them.

use super::{
    ErrorBody, JsonBody, MessageBody, ServiceError,
    auth::{AuthState, Principal, register::{CreatedUser, RegisterRequest, create_account}},
    blocking, check_password_length, ensure_admin, is_unique_violation, normalize_optional,
    valid_email,
};
use crate::crypto::Role;
use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserList {
    pub users: Vec<UserSummary>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserStatusRequest {
    pub is_active: bool,
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All accounts, newest first", body = UserList),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Admin access required", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn list_users(
    Extension(principal): Extension<Principal>,
    Extension(pool): Extension<PgPool>,
) -> Response {
    let result = async {
        ensure_admin(&principal)?;
        fetch_user_summaries(&pool).await.map_err(ServiceError::from)
    }
    .await;

    match result {
        Ok(users) => (StatusCode::OK, Json(UserList { users })).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Account created", body = CreatedUser),
        (status = 400, description = "Missing or invalid fields", body = ErrorBody),
        (status = 403, description = "Admin access required", body = ErrorBody),
        (status = 409, description = "Username or email already exists", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn create_user(
    Extension(principal): Extension<Principal>,
    Extension(pool): Extension<PgPool>,
    Extension(auth_state): Extension<Arc<AuthState>>,
    JsonBody(request): JsonBody<CreateUserRequest>,
) -> Response {
    if let Err(err) = ensure_admin(&principal) {
        return err.into_response();
    }

    let role = request.role.unwrap_or(Role::User);
    let is_active = request.is_active.unwrap_or(true);
    let account = RegisterRequest {
        username: request.username,
        password: request.password,
        email: request.email,
    };

    match create_account(&pool, &auth_state, account, role, is_active).await {
        Ok(user_id) => {
            info!(actor = principal.user_id, user_id, "admin created account");
            (
                StatusCode::CREATED,
                Json(CreatedUser {
                    message: "User created successfully".to_string(),
                    user_id,
                }),
            )
                .into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Account updated", body = MessageBody),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 403, description = "Admin access required", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 409, description = "Email already in use", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn update_user(
    Path(id): Path<i64>,
    Extension(principal): Extension<Principal>,
    Extension(pool): Extension<PgPool>,
    Extension(auth_state): Extension<Arc<AuthState>>,
    JsonBody(request): JsonBody<UpdateUserRequest>,
) -> Response {
    match update_account(&pool, &auth_state, &principal, id, request).await {
        Ok(()) => (StatusCode::OK, MessageBody::new("User updated successfully")).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    patch,
    path = "/api/users/{id}/status",
    params(("id" = i64, Path, description = "User id")),
    request_body = UserStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = MessageBody),
        (status = 403, description = "Admin access required", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn update_user_status(
    Path(id): Path<i64>,
    Extension(principal): Extension<Principal>,
    Extension(pool): Extension<PgPool>,
    JsonBody(request): JsonBody<UserStatusRequest>,
) -> Response {
    let result = async {
        ensure_admin(&principal)?;
        let updated = sqlx::query("UPDATE users SET is_active = $1 WHERE id = $2")
            .bind(request.is_active)
            .bind(id)
            .execute(&pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(ServiceError::NotFound("User not found"));
        }
        info!(
            actor = principal.user_id,
            user_id = id,
            is_active = request.is_active,
            "account status changed"
        );
        Ok(())
    }
    .await;

    match result {
        Ok(()) => (
            StatusCode::OK,
            MessageBody::new("User status updated successfully"),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Account deleted", body = MessageBody),
        (status = 400, description = "Cannot delete your own account", body = ErrorBody),
        (status = 403, description = "Admin access required", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn delete_user(
    Path(id): Path<i64>,
    Extension(principal): Extension<Principal>,
    Extension(pool): Extension<PgPool>,
) -> Response {
    let result = async {
        ensure_admin(&principal)?;
        if principal.user_id == id {
            return Err(ServiceError::BadRequest("Cannot delete your own account"));
        }
        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(ServiceError::NotFound("User not found"));
        }
        info!(actor = principal.user_id, user_id = id, "account deleted");
        Ok(())
    }
    .await;

    match result {
        Ok(()) => (StatusCode::OK, MessageBody::new("User deleted successfully")).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn fetch_user_summaries(pool: &PgPool) -> Result<Vec<UserSummary>, sqlx::Error> {
    let query = r#"
        SELECT
            id,
            username,
            email,
            role,
            is_active,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            to_char(last_login AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS last_login
        FROM users
        ORDER BY created_at DESC
    "#;
    let rows = sqlx::query(query).fetch_all(pool).await?;
    Ok(rows
        .into_iter()
        .map(|row| UserSummary {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            role: super::auth::storage::role_from_row(&row),
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
            last_login: row.get("last_login"),
        })
        .collect())
}

async fn update_account(
    pool: &PgPool,
    auth_state: &AuthState,
    principal: &Principal,
    user_id: i64,
    request: UpdateUserRequest,
) -> Result<(), ServiceError> {
    ensure_admin(principal)?;

    let email = normalize_optional(request.email);
    if let Some(email) = email.as_deref() {
        if !valid_email(email) {
            return Err(ServiceError::BadRequest("Invalid email address"));
        }
        let taken = sqlx::query("SELECT 1 FROM users WHERE email = $1 AND id <> $2 LIMIT 1")
            .bind(email)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
        if taken.is_some() {
            return Err(ServiceError::Conflict("Username or email already exists"));
        }
    }

    let password_hash = match request.password.filter(|p| !p.trim().is_empty()) {
        Some(password) => {
            check_password_length(&password)?;
            let hasher = auth_state.passwords();
            Some(blocking(move || hasher.hash(&password)).await??)
        }
        None => None,
    };

    let query = r"
        UPDATE users
        SET
            email = COALESCE($1, email),
            password_hash = COALESCE($2, password_hash),
            role = COALESCE($3, role),
            is_active = COALESCE($4, is_active)
        WHERE id = $5
    ";
    let updated = sqlx::query(query)
        .bind(email)
        .bind(password_hash)
        .bind(request.role.map(Role::as_str))
        .bind(request.is_active)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ServiceError::Conflict("Username or email already exists")
            } else {
                ServiceError::Database(err)
            }
        })?
        .rows_affected();

    if updated == 0 {
        return Err(ServiceError::NotFound("User not found"));
    }

    info!(actor = principal.user_id, user_id, "account updated");
    Ok(())
}
