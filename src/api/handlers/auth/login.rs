use super::{
    AuthState,
    storage::{self, LoginRecord},
};
use crate::{
    api::handlers::{ErrorBody, JsonBody, ServiceError, blocking},
    crypto::{self, Role},
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
use tracing::{error, info};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user: LoginUser,
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session token issued", body = LoginResponse),
        (status = 400, description = "Username or password missing", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn login(
    Extension(pool): Extension<PgPool>,
    Extension(auth_state): Extension<Arc<AuthState>>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Response {
    match login_flow(&pool, auth_state, request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn login_flow(
    pool: &PgPool,
    auth_state: Arc<AuthState>,
    request: LoginRequest,
) -> Result<LoginResponse, ServiceError> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(ServiceError::BadRequest("Username and password required"));
    }

    let record = storage::find_active_login(pool, &request.username).await?;

    let state = auth_state.clone();
    let password = request.password;
    let record = blocking(move || authenticate(&state, record, &password))
        .await?
        .map_err(|_| ServiceError::Unauthorized("Invalid credentials"))?;

    if let Err(err) = storage::touch_last_login(pool, record.id).await {
        error!("Failed to record last login: {err}");
    }

    let token = auth_state
        .tokens()
        .issue(record.id, &record.username, record.role)?;

    info!(user_id = record.id, "user logged in");

    Ok(LoginResponse {
        token,
        user: LoginUser {
            id: record.id,
            username: record.username,
            email: record.email,
            role: record.role,
        },
    })
}

/// Decide a login attempt from the (optional) stored account.
///
/// Unknown users still pay for one bcrypt verification against a dummy hash, and both
/// failure paths return the same error.
pub(crate) fn authenticate(
    state: &AuthState,
    record: Option<LoginRecord>,
    password: &str,
) -> Result<LoginRecord, crypto::Error> {
    let hasher = state.passwords();
    match record {
        Some(record) if hasher.verify(password, &record.password_hash) => Ok(record),
        Some(_) => Err(crypto::Error::InvalidCredentials),
        None => {
            if let Some(dummy) = state.dummy_hash() {
                let _ = hasher.verify(password, dummy);
            }
            Err(crypto::Error::InvalidCredentials)
        }
    }
}
