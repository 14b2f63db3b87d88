use std::any::Any;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::error;

use crate::schema::RequestSchema;

/// One field-level validation problem, shaped like the FastAPI error items
/// existing clients already parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(rename = "type")]
    pub kind: String,
    pub loc: Vec<String>,
    pub msg: String,
    pub input: Value,
}

impl FieldError {
    pub fn new(kind: &str, loc: Vec<String>, msg: &str, input: Value) -> Self {
        Self {
            kind: kind.to_string(),
            loc,
            msg: msg.to_string(),
            input,
        }
    }

    pub fn missing(field: &str, body: &Value) -> Self {
        Self::new(
            "missing",
            vec!["body".to_string(), field.to_string()],
            "Field required",
            body.clone(),
        )
    }
}

/// Errors surfaced to HTTP clients.
///
/// Only `Validation` and `Upstream` carry detail; the 500 variants render a
/// fixed message and the cause is logged where the error is raised.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request validation failed")]
    Validation(Vec<FieldError>),

    #[error("Verification failed: {0}")]
    Upstream(String),

    #[error("Failed to parse agent tool output")]
    ResultParsing,

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::ResultParsing | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn from_json_rejection(rejection: JsonRejection) -> Self {
        let kind = match &rejection {
            JsonRejection::MissingJsonContentType(_) => "content_type",
            _ => "json_invalid",
        };
        ApiError::Validation(vec![FieldError::new(
            kind,
            vec!["body".to_string()],
            &rejection.body_text(),
            Value::Null,
        )])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ApiError::Validation(errors) => json!({ "detail": errors }),
            ApiError::Upstream(_) => json!({ "detail": self.to_string() }),
            ApiError::ResultParsing | ApiError::Internal => json!({ "message": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// JSON body extractor that reports every invalid field as a 422 instead of
/// stopping at the first serde error.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: RequestSchema,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let path = req.uri().path().to_string();
        let Json(body) = Json::<Value>::from_request(req, state)
            .await
            .map_err(ApiError::from_json_rejection)?;

        let errors = T::field_errors(&body);
        if !errors.is_empty() {
            error!(path = %path, errors = ?errors, "Validation error");
            return Err(ApiError::Validation(errors));
        }

        serde_json::from_value(body.clone()).map(ValidatedJson).map_err(|e| {
            error!(path = %path, error = %e, "Validation error");
            ApiError::Validation(vec![FieldError::new(
                "value_error",
                vec!["body".to_string()],
                &e.to_string(),
                body,
            )])
        })
    }
}

/// Last-resort handler for panics inside request handling.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!(panic = %detail, "Unhandled exception during request");
    ApiError::Internal.into_response()
}
