//! Self-service profile, password and preference settings, plus admin database statistics.

use super::{
    ErrorBody, JsonBody, MessageBody, ServiceError,
    auth::{AuthState, Principal, storage},
    blocking, check_password_length, ensure_admin, is_unique_violation, valid_email,
};
use crate::crypto::Role;
use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_TIMEZONE: &str = "America/New_York";

#[derive(Debug, Serialize, ToSchema)]
pub struct Profile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: String,
    pub last_login: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub user: Profile,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProfileUpdateRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileIdentity {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileUpdateResponse {
    pub message: String,
    pub user: ProfileIdentity,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChangeRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStats {
    pub total_clients: i64,
    pub total_users: i64,
    pub total_notes: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DatabaseStatsResponse {
    pub stats: DatabaseStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub email_notifications: bool,
    pub sms_notifications: bool,
    pub dark_mode: bool,
    pub language: String,
    pub timezone: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            email_notifications: true,
            sms_notifications: false,
            dark_mode: false,
            language: DEFAULT_LANGUAGE.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PreferencesResponse {
    pub preferences: Preferences,
}

/// A full replacement of the caller's preferences. Omitted toggles are off;
/// omitted or blank language and timezone fall back to the defaults.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesUpdateRequest {
    #[serde(default)]
    pub email_notifications: bool,
    #[serde(default)]
    pub sms_notifications: bool,
    #[serde(default)]
    pub dark_mode: bool,
    pub language: Option<String>,
    pub timezone: Option<String>,
}

impl From<PreferencesUpdateRequest> for Preferences {
    fn from(request: PreferencesUpdateRequest) -> Self {
        let or_default = |value: Option<String>, default: &str| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        Self {
            email_notifications: request.email_notifications,
            sms_notifications: request.sms_notifications,
            dark_mode: request.dark_mode,
            language: or_default(request.language, DEFAULT_LANGUAGE),
            timezone: or_default(request.timezone, DEFAULT_TIMEZONE),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/settings/profile",
    responses(
        (status = 200, description = "Current user's profile", body = ProfileResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "settings"
)]
pub async fn get_profile(
    Extension(principal): Extension<Principal>,
    Extension(pool): Extension<PgPool>,
) -> Response {
    match fetch_profile(&pool, principal.user_id).await {
        Ok(Some(user)) => (StatusCode::OK, Json(ProfileResponse { user })).into_response(),
        Ok(None) => ServiceError::NotFound("User not found").into_response(),
        Err(err) => ServiceError::Database(err).into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/settings/profile",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileUpdateResponse),
        (status = 400, description = "Username and email are required", body = ErrorBody),
        (status = 409, description = "Username or email already exists", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "settings"
)]
pub async fn update_profile(
    Extension(principal): Extension<Principal>,
    Extension(pool): Extension<PgPool>,
    JsonBody(request): JsonBody<ProfileUpdateRequest>,
) -> Response {
    match update_identity(&pool, &principal, request).await {
        Ok(user) => (
            StatusCode::OK,
            Json(ProfileUpdateResponse {
                message: "Profile updated successfully".to_string(),
                user,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/settings/password",
    request_body = PasswordChangeRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageBody),
        (status = 400, description = "Missing fields or new password too short", body = ErrorBody),
        (status = 401, description = "Current password is incorrect", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "settings"
)]
pub async fn change_password(
    Extension(principal): Extension<Principal>,
    Extension(pool): Extension<PgPool>,
    Extension(auth_state): Extension<Arc<AuthState>>,
    JsonBody(request): JsonBody<PasswordChangeRequest>,
) -> Response {
    match replace_password(&pool, &auth_state, &principal, request).await {
        Ok(()) => (
            StatusCode::OK,
            MessageBody::new("Password changed successfully"),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/settings/preferences",
    responses(
        (status = 200, description = "Current user's preferences, created with defaults on first read", body = PreferencesResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "settings"
)]
pub async fn get_preferences(
    Extension(principal): Extension<Principal>,
    Extension(pool): Extension<PgPool>,
) -> Response {
    match ensure_preferences(&pool, principal.user_id).await {
        Ok(preferences) => {
            (StatusCode::OK, Json(PreferencesResponse { preferences })).into_response()
        }
        Err(err) => ServiceError::Database(err).into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/settings/preferences",
    request_body = PreferencesUpdateRequest,
    responses(
        (status = 200, description = "Preferences updated", body = MessageBody),
        (status = 400, description = "Malformed request body", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "settings"
)]
pub async fn update_preferences(
    Extension(principal): Extension<Principal>,
    Extension(pool): Extension<PgPool>,
    JsonBody(request): JsonBody<PreferencesUpdateRequest>,
) -> Response {
    let preferences = Preferences::from(request);
    match store_preferences(&pool, principal.user_id, &preferences).await {
        Ok(()) => {
            info!(user_id = principal.user_id, "preferences updated");
            (
                StatusCode::OK,
                MessageBody::new("Preferences updated successfully"),
            )
                .into_response()
        }
        Err(err) => ServiceError::Database(err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/settings/database/stats",
    responses(
        (status = 200, description = "Row counts", body = DatabaseStatsResponse),
        (status = 403, description = "Admin access required", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "settings"
)]
pub async fn database_stats(
    Extension(principal): Extension<Principal>,
    Extension(pool): Extension<PgPool>,
) -> Response {
    let result = async {
        ensure_admin(&principal)?;
        count_rows(&pool).await.map_err(ServiceError::from)
    }
    .await;

    match result {
        Ok(stats) => (StatusCode::OK, Json(DatabaseStatsResponse { stats })).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Enforce the minimum length for a replacement password.
pub fn check_new_password(request: &PasswordChangeRequest) -> Result<(), ServiceError> {
    if request.current_password.is_empty() || request.new_password.is_empty() {
        return Err(ServiceError::BadRequest(
            "Current password and new password are required",
        ));
    }
    if request.new_password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ServiceError::BadRequest(
            "New password must be at least 8 characters",
        ));
    }
    check_password_length(&request.new_password)
}

async fn fetch_profile(pool: &PgPool, user_id: i64) -> Result<Option<Profile>, sqlx::Error> {
    let query = r#"
        SELECT
            id,
            username,
            email,
            role,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            to_char(last_login AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS last_login
        FROM users
        WHERE id = $1
    "#;
    let row = sqlx::query(query).bind(user_id).fetch_optional(pool).await?;
    Ok(row.map(|row| Profile {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        role: storage::role_from_row(&row),
        created_at: row.get("created_at"),
        last_login: row.get("last_login"),
    }))
}

async fn update_identity(
    pool: &PgPool,
    principal: &Principal,
    request: ProfileUpdateRequest,
) -> Result<ProfileIdentity, ServiceError> {
    let username = request.username.trim().to_string();
    let email = request.email.trim().to_string();
    if username.is_empty() || email.is_empty() {
        return Err(ServiceError::BadRequest("Username and email are required"));
    }
    if !valid_email(&email) {
        return Err(ServiceError::BadRequest("Invalid email address"));
    }

    if storage::identity_taken(pool, &username, &email, Some(principal.user_id)).await? {
        return Err(ServiceError::Conflict("Username or email already exists"));
    }

    let updated = sqlx::query("UPDATE users SET username = $1, email = $2 WHERE id = $3")
        .bind(&username)
        .bind(&email)
        .bind(principal.user_id)
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

    info!(user_id = principal.user_id, "profile updated");
    Ok(ProfileIdentity { username, email })
}

async fn replace_password(
    pool: &PgPool,
    auth_state: &AuthState,
    principal: &Principal,
    request: PasswordChangeRequest,
) -> Result<(), ServiceError> {
    check_new_password(&request)?;

    let Some(current_hash) = storage::password_hash(pool, principal.user_id).await? else {
        return Err(ServiceError::NotFound("User not found"));
    };

    let hasher = auth_state.passwords();
    let PasswordChangeRequest {
        current_password,
        new_password,
    } = request;
    let new_hash = blocking(move || {
        if hasher.verify(&current_password, &current_hash) {
            hasher.hash(&new_password).map(Some)
        } else {
            Ok(None)
        }
    })
    .await??;

    let Some(new_hash) = new_hash else {
        return Err(ServiceError::Unauthorized("Current password is incorrect"));
    };

    storage::set_password_hash(pool, principal.user_id, &new_hash).await?;
    info!(user_id = principal.user_id, "password changed");
    Ok(())
}

async fn ensure_preferences(pool: &PgPool, user_id: i64) -> Result<Preferences, sqlx::Error> {
    let defaults = Preferences::default();
    // The no-op update makes RETURNING yield the existing row on conflict.
    let query = r"
        INSERT INTO user_preferences
            (user_id, email_notifications, sms_notifications, dark_mode, language, timezone)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
        RETURNING email_notifications, sms_notifications, dark_mode, language, timezone
    ";
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(defaults.email_notifications)
        .bind(defaults.sms_notifications)
        .bind(defaults.dark_mode)
        .bind(&defaults.language)
        .bind(&defaults.timezone)
        .fetch_one(pool)
        .await?;
    Ok(Preferences {
        email_notifications: row.get("email_notifications"),
        sms_notifications: row.get("sms_notifications"),
        dark_mode: row.get("dark_mode"),
        language: row.get("language"),
        timezone: row.get("timezone"),
    })
}

async fn store_preferences(
    pool: &PgPool,
    user_id: i64,
    preferences: &Preferences,
) -> Result<(), sqlx::Error> {
    let query = r"
        INSERT INTO user_preferences
            (user_id, email_notifications, sms_notifications, dark_mode, language, timezone)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id) DO UPDATE SET
            email_notifications = EXCLUDED.email_notifications,
            sms_notifications = EXCLUDED.sms_notifications,
            dark_mode = EXCLUDED.dark_mode,
            language = EXCLUDED.language,
            timezone = EXCLUDED.timezone,
            updated_at = NOW()
    ";
    sqlx::query(query)
        .bind(user_id)
        .bind(preferences.email_notifications)
        .bind(preferences.sms_notifications)
        .bind(preferences.dark_mode)
        .bind(&preferences.language)
        .bind(&preferences.timezone)
        .execute(pool)
        .await?;
    Ok(())
}

async fn count_rows(pool: &PgPool) -> Result<DatabaseStats, sqlx::Error> {
    let query = r"
        SELECT
            (SELECT COUNT(*) FROM clients) AS total_clients,
            (SELECT COUNT(*) FROM users) AS total_users,
            (SELECT COUNT(*) FROM notes) AS total_notes
    ";
    let row = sqlx::query(query).fetch_one(pool).await?;
    Ok(DatabaseStats {
        total_clients: row.get("total_clients"),
        total_users: row.get("total_users"),
        total_notes: row.get("total_notes"),
    })
}
