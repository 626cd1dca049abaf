//! REST API module for HTTP endpoints
//!
//! - `POST /api/intake` - Run the intake pipeline on a request
//! - `POST /api/events` - Append a raw event
//! - `GET /api/events` - Debug listing of log records
//! - `GET /api/cases` - List case ids
//! - `GET /api/cases/:id` - Replayed case state
//! - `GET /api/cases/:id/events` - Events of one case
//! - `GET /api/stats` - Log statistics

pub mod cases;
pub mod events;
pub mod intake;
pub mod stats;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::event_store::StoreError;
use crate::intake::IntakeError;
use crate::types::InvalidCaseId;
use crate::validation::SchemaError;

/// Common pagination parameters
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    /// Maximum number of items to return (default: 100, max: 1000)
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Number of items to skip
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    100
}

impl PaginationParams {
    /// Normalize limit to max 1000
    pub fn normalized_limit(&self) -> usize {
        self.limit.min(1000)
    }
}

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Total count (for paginated responses)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data, total: None }
    }

    pub fn with_total(data: T, total: usize) -> Self {
        Self {
            data,
            total: Some(total),
        }
    }
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
    #[serde(skip)]
    pub status: StatusCode,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.to_string(),
            status,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "SCHEMA_ERROR", message)
    }

    pub fn conflict(code: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "WRITE_FAILURE", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<SchemaError> for ApiError {
    fn from(e: SchemaError) -> Self {
        Self::schema(e.to_string())
    }
}

impl From<InvalidCaseId> for ApiError {
    fn from(e: InvalidCaseId) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_CASE_ID", e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Schema(e) => e.into(),
            StoreError::InvalidCaseId(e) => e.into(),
            StoreError::CaseNotFound(_) => Self::not_found(e.to_string()),
            StoreError::CaseAlreadyExists(_) => Self::conflict("CASE_EXISTS", e.to_string()),
            ref e if e.is_integrity() => Self::conflict("INTEGRITY_ERROR", e.to_string()),
            StoreError::WriteFailure { .. } => {
                error!(error = %e, "append failed");
                Self::unavailable(e.to_string())
            }
            e => {
                error!(error = %e, "store error");
                Self::internal(e.to_string())
            }
        }
    }
}

impl From<IntakeError> for ApiError {
    fn from(e: IntakeError) -> Self {
        match e {
            IntakeError::EmptyRequest => Self::bad_request(e.to_string()),
            IntakeError::Store(e) => e.into(),
            IntakeError::Extract(e) => {
                error!(error = %e, "extraction failed");
                Self::internal(e.to_string())
            }
        }
    }
}

/// Run synchronous store work off the async runtime
pub async fn blocking<F, T, E>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(Into::into),
        Err(e) => {
            error!(error = %e, "blocking task failed");
            Err(ApiError::internal("request handler panicked"))
        }
    }
}
