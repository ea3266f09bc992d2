use crate::{
    api::handlers::{
        auth::{self, AuthState, require_auth},
        clients, health, notes, root, settings, users,
    },
    crypto::{FieldCipher, PasswordHasher, SecretMaterial, TokenService},
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put},
};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
// OpenAPI document and its metadata live in openapi.rs.
mod openapi;

pub use openapi::openapi;

/// Build every route with its extensions, without the HTTP middleware stack.
///
/// Routes under `/api` other than login, register and verify sit behind
/// [`require_auth`].
#[must_use]
pub fn router(pool: PgPool, auth_state: Arc<AuthState>, cipher: Arc<FieldCipher>) -> Router {
    let public = Router::new()
        .route("/", get(root::root))
        .route(
            "/health",
            get(health::health)
                .head(health::health)
                .options(health::health),
        )
        .route("/api/auth/login", post(auth::login::login))
        .route("/api/auth/register", post(auth::register::register))
        .route("/api/auth/verify", get(auth::verify::verify));

    let protected = Router::new()
        .route(
            "/api/users",
            get(users::list_users).post(users::create_user),
        )
        .route(
            "/api/users/:id",
            put(users::update_user).delete(users::delete_user),
        )
        .route("/api/users/:id/status", patch(users::update_user_status))
        .route(
            "/api/settings/profile",
            get(settings::get_profile).put(settings::update_profile),
        )
        .route("/api/settings/password", put(settings::change_password))
        .route(
            "/api/settings/preferences",
            get(settings::get_preferences).put(settings::update_preferences),
        )
        .route("/api/settings/database/stats", get(settings::database_stats))
        .route(
            "/api/clients",
            get(clients::list_clients).post(clients::create_client),
        )
        .route(
            "/api/clients/:id",
            get(clients::get_client)
                .put(clients::update_client)
                .delete(clients::delete_client),
        )
        .route(
            "/api/clients/:id/notes",
            get(notes::list_notes).post(notes::create_note),
        )
        .route("/api/notes/:note_id", delete(notes::delete_note))
        .route_layer(from_fn_with_state(auth_state.clone(), require_auth));

    public
        .merge(protected)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(Extension(cipher))
        .layer(Extension(auth_state))
        .layer(Extension(pool))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    secrets: Arc<SecretMaterial>,
    frontend_base_url: String,
) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let auth_state = Arc::new(AuthState::new(
        TokenService::new(secrets.clone()),
        PasswordHasher::new(),
    ));
    let cipher = Arc::new(FieldCipher::new(secrets));

    let frontend_origin = frontend_origin(&frontend_base_url)?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    let app = router(pool, auth_state, cipher).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

pub(crate) fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_strips_path() -> Result<()> {
        let origin = frontend_origin("https://records.example.com/app/login")?;
        assert_eq!(origin, "https://records.example.com");
        Ok(())
    }

    #[test]
    fn frontend_origin_keeps_explicit_port() -> Result<()> {
        let origin = frontend_origin("http://localhost:3000")?;
        assert_eq!(origin, "http://localhost:3000");
        Ok(())
    }

    #[test]
    fn frontend_origin_rejects_invalid() {
        assert!(frontend_origin("not a url").is_err());
        assert!(frontend_origin("mailto:team@custodian.dev").is_err());
    }

    #[test]
    fn make_span_without_request_id() -> Result<()> {
        let request = Request::builder()
            .uri("/api/clients")
            .body(Body::empty())?;
        let span = make_span(&request);
        // Spans are disabled without a subscriber; building one must not panic.
        let _entered = span.enter();
        Ok(())
    }
}
