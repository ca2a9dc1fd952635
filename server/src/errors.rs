use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use std::fmt;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
            }
        }));
        (self.status, body).into_response()
    }
}

impl From<catalog_contracts::CatalogError> for AppError {
    fn from(err: catalog_contracts::CatalogError) -> Self {
        use catalog_contracts::CatalogError;
        match err {
            CatalogError::NotFound(msg) => Self::not_found(msg),
            CatalogError::Conflict(msg) => Self::conflict(msg),
            CatalogError::InvalidInput(msg) => Self::bad_request(msg),
            CatalogError::Storage(e) => Self::internal(e.to_string()),
        }
    }
}

impl From<catalog_contracts::BusError> for AppError {
    fn from(err: catalog_contracts::BusError) -> Self {
        use catalog_contracts::BusError;
        match err {
            BusError::QueueFull => Self::new(StatusCode::TOO_MANY_REQUESTS, "queue is full"),
            BusError::NotFound(msg) => Self::not_found(msg),
            BusError::Transport(e) => Self::internal(e.to_string()),
        }
    }
}

impl From<catalog_contracts::PlacementError> for AppError {
    fn from(err: catalog_contracts::PlacementError) -> Self {
        Self::new(StatusCode::INSUFFICIENT_STORAGE, err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}
