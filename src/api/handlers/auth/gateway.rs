//! Bearer-token gateway for protected routes.

use super::AuthState;
use crate::{
    api::handlers::error_response,
    crypto::{Role, SessionClaims},
};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

/// Authenticated caller, derived from verified token claims only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

impl Principal {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// # Errors
    /// Returns `403 Forbidden` unless the caller holds the `admin` role.
    pub fn require_admin(&self) -> Result<(), StatusCode> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(StatusCode::FORBIDDEN)
        }
    }
}

impl From<SessionClaims> for Principal {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            role: claims.role,
        }
    }
}

/// Read `Authorization: Bearer <token>`; anything else is treated as absent.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.trim().strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Reject the request with `401` unless it carries a valid session token.
///
/// On success the [`Principal`] is inserted into the request extensions and the
/// inner service runs.
pub async fn require_auth(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer_token(request.headers()) else {
        debug!("request without bearer token");
        return error_response(
            StatusCode::UNAUTHORIZED,
            "Unauthorized - No token provided",
        );
    };

    match auth_state.tokens().verify(&token) {
        Ok(claims) => {
            request.extensions_mut().insert(Principal::from(claims));
            next.run(request).await
        }
        Err(_) => error_response(StatusCode::UNAUTHORIZED, "Unauthorized - Invalid token"),
    }
}
