use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use validator::Validate;

/// JSON body that has passed `validator` checks. Both malformed JSON and
/// failed validation are rejected with a 400 in the standard envelope.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| {
                AppError::BadRequest(anyhow::anyhow!("Invalid JSON body: {}", rejection.body_text()))
            })?;

        value.validate()?;

        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, response::IntoResponse, routing::post, Router};
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Deserialize, Validate)]
    struct Payload {
        #[validate(length(min = 1))]
        name: String,
    }

    async fn handler(ValidatedJson(payload): ValidatedJson<Payload>) -> impl IntoResponse {
        payload.name
    }

    async fn status_for(body: &'static str) -> StatusCode {
        let app = Router::new().route("/", post(handler));
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn accepts_valid_payload() {
        assert_eq!(status_for(r#"{"name":"x"}"#).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_and_invalid_payloads_are_bad_requests() {
        assert_eq!(status_for("{not json").await, StatusCode::BAD_REQUEST);
        assert_eq!(status_for(r#"{"other":1}"#).await, StatusCode::BAD_REQUEST);
        assert_eq!(status_for(r#"{"name":""}"#).await, StatusCode::BAD_REQUEST);
    }
}
