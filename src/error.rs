use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

/// One entry in a 400 validation response, shaped like the
/// `{"errors": [{"msg": ..., "param": ...}]}` bodies the client expects.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}

impl FieldError {
    pub fn new(param: &str, msg: &str) -> Self {
        Self {
            msg: msg.to_string(),
            param: Some(param.to_string()),
        }
    }

    /// A validation-shaped error not tied to a single field
    /// (e.g. "User already exists").
    pub fn bare(msg: &str) -> Self {
        Self {
            msg: msg.to_string(),
            param: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors }))).into_response()
            }
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "msg": msg }))).into_response()
            }
            AppError::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, Json(json!({ "msg": msg }))).into_response()
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(json!({ "msg": msg }))).into_response()
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, Json(json!({ "msg": msg }))).into_response()
            }
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {}", msg);
                (StatusCode::BAD_GATEWAY, Json(json!({ "msg": "Upstream error" }))).into_response()
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                server_error()
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                server_error()
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                server_error()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                server_error()
            }
        }
    }
}

fn server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "msg": "Server error" })),
    )
        .into_response()
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn response_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn validation_returns_400() {
        let err = AppError::Validation(vec![FieldError::new("name", "Name is required")]);
        assert_eq!(response_status(err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unauthorized_returns_401() {
        assert_eq!(
            response_status(AppError::Unauthorized("no token".into())),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn forbidden_returns_403() {
        assert_eq!(
            response_status(AppError::Forbidden("not yours".into())),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn not_found_returns_404() {
        assert_eq!(
            response_status(AppError::NotFound("Post not found".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn conflict_returns_409() {
        assert_eq!(
            response_status(AppError::Conflict("already liked".into())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn upstream_returns_502() {
        assert_eq!(
            response_status(AppError::Upstream("github down".into())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn internal_returns_500() {
        assert_eq!(
            response_status(AppError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn field_error_serializes_param() {
        let err = FieldError::new("email", "Please provide a valid email");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["param"], "email");
        assert_eq!(json["msg"], "Please provide a valid email");

        let bare = serde_json::to_value(FieldError::bare("User already exists")).unwrap();
        assert!(bare.get("param").is_none());
    }
}
