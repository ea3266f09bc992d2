use crate::GIT_COMMIT_HASH;
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, PgPool};
use tracing::{Instrument, debug, error, info_span};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Database is reachable", body = Health),
        (status = 503, description = "Database is unreachable", body = Health)
    ),
    tag = "health"
)]
// axum handler for health
pub async fn health(method: Method, pool: Extension<PgPool>) -> impl IntoResponse {
    let acquire_span = info_span!(
        "db.acquire",
        db.system = "postgresql",
        db.operation = "ACQUIRE"
    );
    let result = match pool.0.acquire().instrument(acquire_span).await {
        Ok(mut conn) => {
            let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
            conn.ping().instrument(ping_span).await.map_err(|error| {
                error!("Failed to ping database: {}", error);
            })
        }
        Err(error) => {
            error!("Failed to acquire database connection: {}", error);
            Err(())
        }
    };

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if result.is_ok() {
            "ok".to_string()
        } else {
            "error".to_string()
        },
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let headers = app_headers(&health.name, &health.version, &health.commit);

    if result.is_ok() {
        debug!("Database connection is healthy");
        (StatusCode::OK, headers, body)
    } else {
        debug!("Database connection is unhealthy");
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}

/// `X-App: name:version:short-hash`; empty headers if the value is not a valid header.
pub(crate) fn app_headers(name: &str, version: &str, commit: &str) -> HeaderMap {
    let short_hash = commit.get(..7).unwrap_or("");
    let mut headers = HeaderMap::new();

    match format!("{name}:{version}:{short_hash}").parse::<HeaderValue>() {
        Ok(value) => {
            debug!("X-App header: {:?}", value);
            headers.insert("X-App", value);
        }
        Err(err) => error!("Failed to parse X-App header: {}", err),
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use sqlx::postgres::PgPoolOptions;
    use std::time::Duration;

    #[test]
    fn x_app_header_uses_short_hash() {
        let headers = app_headers("custodian", "1.2.3", "0123456789abcdef");
        assert_eq!(
            headers.get("X-App").and_then(|v| v.to_str().ok()),
            Some("custodian:1.2.3:0123456")
        );

        let headers = app_headers("custodian", "1.2.3", "unk");
        assert_eq!(
            headers.get("X-App").and_then(|v| v.to_str().ok()),
            Some("custodian:1.2.3:")
        );
    }

    #[test]
    fn invalid_header_value_is_skipped() {
        let headers = app_headers("bad\nname", "1", "");
        assert!(headers.get("X-App").is_none());
    }

    #[tokio::test]
    async fn unreachable_database_is_503() -> Result<(), Box<dyn std::error::Error>> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://custodian@127.0.0.1:1/custodian")?;

        let response = health(Method::GET, Extension(pool)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().contains_key("X-App"));

        let body = response.into_body().collect().await?.to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(json["database"], "error");
        assert_eq!(json["name"], env!("CARGO_PKG_NAME"));
        Ok(())
    }

    #[tokio::test]
    async fn head_request_has_empty_body() -> Result<(), Box<dyn std::error::Error>> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://custodian@127.0.0.1:1/custodian")?;

        let response = health(Method::HEAD, Extension(pool)).await.into_response();
        let body = response.into_body().collect().await?.to_bytes();
        assert!(body.is_empty());
        Ok(())
    }
}
