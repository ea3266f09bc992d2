use super::{
    AuthState,
    storage::{self, NewAccount},
};
use crate::{
    api::handlers::{
        ErrorBody, JsonBody, ServiceError, blocking, check_password_length,
        is_unique_violation, valid_email,
    },
    crypto::Role,
};
use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("password", &"***")
            .field("email", &self.email)
            .finish()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedUser {
    pub message: String,
    #[serde(rename = "userId")]
    pub user_id: i64,
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created with the user role", body = CreatedUser),
        (status = 400, description = "Missing or invalid fields", body = ErrorBody),
        (status = 409, description = "Username or email already exists", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn register(
    Extension(pool): Extension<PgPool>,
    Extension(auth_state): Extension<Arc<AuthState>>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Response {
    // Self-registration never grants elevated roles.
    match create_account(&pool, &auth_state, request, Role::User, true).await {
        Ok(user_id) => (
            StatusCode::CREATED,
            Json(CreatedUser {
                message: "User created successfully".to_string(),
                user_id,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// Validate, hash and insert a new account. Shared with admin user creation.
pub(crate) async fn create_account(
    pool: &PgPool,
    auth_state: &AuthState,
    request: RegisterRequest,
    role: Role,
    is_active: bool,
) -> Result<i64, ServiceError> {
    let username = request.username.trim().to_string();
    let email = request.email.trim().to_string();
    if username.is_empty() || request.password.is_empty() || email.is_empty() {
        return Err(ServiceError::BadRequest(
            "Username, password, and email required",
        ));
    }
    if !valid_email(&email) {
        return Err(ServiceError::BadRequest("Invalid email address"));
    }
    check_password_length(&request.password)?;

    if storage::identity_taken(pool, &username, &email, None).await? {
        return Err(ServiceError::Conflict("Username or email already exists"));
    }

    let hasher = auth_state.passwords();
    let password = request.password;
    let password_hash = blocking(move || hasher.hash(&password)).await??;

    let user_id = storage::insert_account(
        pool,
        NewAccount {
            username: &username,
            email: &email,
            password_hash: &password_hash,
            role,
            is_active,
        },
    )
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            ServiceError::Conflict("Username or email already exists")
        } else {
            ServiceError::Database(err)
        }
    })?;

    info!(user_id, role = role.as_str(), "account created");

    Ok(user_id)
}
