//! JSON error responses.
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use qna_core::AppError;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

/// An error that renders as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let code = match &err {
            AppError::Schema { .. } => "schema_mismatch",
            AppError::Llm(_) => "generation_failed",
            _ => "internal",
        };

        tracing::error!("Request failed ({}): {}", code, err);

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_codes() {
        let schema: ApiError = AppError::Schema {
            index: "main".to_string(),
            field: "Ответ из БЗ".to_string(),
        }
        .into();
        assert_eq!(schema.code(), "schema_mismatch");
        assert_eq!(schema.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let llm: ApiError = AppError::Llm("timeout".to_string()).into();
        assert_eq!(llm.code(), "generation_failed");

        let other: ApiError = AppError::Knowledge("index missing".to_string()).into();
        assert_eq!(other.code(), "internal");
    }

    #[test]
    fn test_bad_request() {
        let err = ApiError::bad_request("empty");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "bad_request");
    }
}
