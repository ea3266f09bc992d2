use super::ServiceError;
use axum::{
    Json, async_trait,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use tracing::debug;

pub const INVALID_BODY: &str = "Invalid JSON request body";

/// `Json<T>` whose rejections use the API's `{"error": "..."}` shape.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(request, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                // The rejection text can quote submitted values, so only the status is logged.
                debug!(status = %rejection.status(), "request body rejected");
                Err(ServiceError::BadRequest(INVALID_BODY))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::header::CONTENT_TYPE};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        name: String,
    }

    fn request(
        content_type: Option<&str>,
        body: &'static str,
    ) -> Result<Request, axum::http::Error> {
        let builder = axum::http::Request::builder().method("POST").uri("/");
        let builder = match content_type {
            Some(value) => builder.header(CONTENT_TYPE, value),
            None => builder,
        };
        builder.body(Body::from(body))
    }

    #[tokio::test]
    async fn well_formed_body_is_extracted() -> Result<(), axum::http::Error> {
        let extracted = JsonBody::<Payload>::from_request(
            request(Some("application/json"), r#"{"name":"alice"}"#)?,
            &(),
        )
        .await;
        assert!(matches!(extracted, Ok(JsonBody(Payload { name })) if name == "alice"));
        Ok(())
    }

    #[tokio::test]
    async fn every_rejection_is_a_bad_request() -> Result<(), axum::http::Error> {
        for (content_type, body) in [
            (Some("application/json"), "{not json"),
            (Some("application/json"), r#"{"name":42}"#),
            (Some("text/plain"), r#"{"name":"alice"}"#),
            (None, r#"{"name":"alice"}"#),
        ] {
            let extracted =
                JsonBody::<Payload>::from_request(request(content_type, body)?, &()).await;
            assert!(
                matches!(extracted, Err(ServiceError::BadRequest(INVALID_BODY))),
                "{content_type:?} {body}"
            );
        }
        Ok(())
    }
}
