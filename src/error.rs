//! Error type shared by registration, configuration and the request stores.
//!
//! Registration errors are returned from the [`EywaApp`](crate::EywaApp)
//! builder and stop the application before it serves a single request.
//! The remaining variants come from the pluggable stores and renderers and
//! are normally swallowed into an empty default by the caller.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Result alias used across the crate.
pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("the action's name is invalid: \"{0}\", its first character must be a capital letter")]
    InvalidActionName(String),

    #[error("route \"{path}\" is already registered for method {method}")]
    DuplicateRoute { path: String, method: String },

    #[error("session error: {0}")]
    SessionError(String),

    #[error("render error: {0}")]
    RenderError(String),

    #[error("invalid token: {0}")]
    TokenError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::TokenError(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for errors raised while registering controllers.
    pub fn is_registration(&self) -> bool {
        matches!(
            self,
            AppError::InvalidActionName(_) | AppError::DuplicateRoute { .. }
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<minijinja::Error> for AppError {
    fn from(err: minijinja::Error) -> Self {
        AppError::RenderError(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::TokenError(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "status": status.as_u16(),
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
