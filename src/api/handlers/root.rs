use super::health::app_headers;
use crate::GIT_COMMIT_HASH;
use axum::response::{IntoResponse, Json};
use serde_json::json;

pub const SERVICE_NAME: &str = "Client Database API";

// axum handler for the service banner
pub async fn root() -> impl IntoResponse {
    let body = Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "healthy",
        "build": GIT_COMMIT_HASH,
    }));

    (
        app_headers(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), GIT_COMMIT_HASH),
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn banner_fields() -> Result<(), Box<dyn std::error::Error>> {
        let response = root().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await?.to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(json["service"], SERVICE_NAME);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        Ok(())
    }
}
