use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use broker_transport::PublishError;
use event_store::StoreError;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PublisherError>;

#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("Invalid event: {0}")]
    InvalidPayload(String),

    #[error("Method not allowed")]
    MethodNotAllowed { allow: &'static str },

    #[error("Failed to record event: {0}")]
    PublishFailed(#[from] PublishError),

    #[error("Failed to encode event: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ResponseError for PublisherError {
    fn error_response(&self) -> HttpResponse {
        let code = self.status_code();
        let message = match self {
            PublisherError::InvalidPayload(_) | PublisherError::MethodNotAllowed { .. } => {
                self.to_string()
            }
            // Internal detail stays in the logs
            PublisherError::PublishFailed(_) => "Failed to record event".to_string(),
            PublisherError::Serialization(_) => "Internal server error".to_string(),
            PublisherError::Store(_) => "Database error".to_string(),
        };

        let mut builder = HttpResponse::build(code);
        if let PublisherError::MethodNotAllowed { allow } = self {
            builder.insert_header((header::ALLOW, *allow));
        }
        builder.json(ErrorResponse {
            error: message,
            code: code.as_u16(),
        })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            PublisherError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            PublisherError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            PublisherError::PublishFailed(_)
            | PublisherError::Serialization(_)
            | PublisherError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn test_error_body_shape() {
        let err = PublisherError::InvalidPayload("missing field `page`".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], 400);
        assert_eq!(json["error"], "Invalid event: missing field `page`");
    }

    #[actix_web::test]
    async fn test_publish_failure_hides_broker_detail() {
        let err = PublisherError::PublishFailed(PublishError::Unavailable("broker-3 down".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Failed to record event");
    }
}
