use super::{AuthState, extract_bearer_token};
use crate::{
    api::handlers::{ErrorBody, ServiceError},
    crypto::SessionClaims,
};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user: SessionClaims,
}

#[utoipa::path(
    get,
    path = "/api/auth/verify",
    responses(
        (status = 200, description = "Token is valid", body = VerifyResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn verify(
    headers: HeaderMap,
    Extension(auth_state): Extension<Arc<AuthState>>,
) -> Response {
    let Some(token) = extract_bearer_token(&headers) else {
        return ServiceError::Unauthorized("No token provided").into_response();
    };

    match auth_state.tokens().verify(&token) {
        Ok(claims) => (
            StatusCode::OK,
            Json(VerifyResponse {
                valid: true,
                user: claims,
            }),
        )
            .into_response(),
        Err(_) => ServiceError::Unauthorized("Invalid token").into_response(),
    }
}
