//! Error handling module
//!
//! Provides unified error types and handling for the entire application.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// The database could not be reached or refused the credentials.
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// The connection was fine but the statement failed.
    #[error("Query '{query}' failed: {source}")]
    Query {
        query: &'static str,
        #[source]
        source: tokio_postgres::Error,
    },

    /// A row or the response body could not be shaped for the client.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    pub fn query(query: &'static str) -> impl FnOnce(tokio_postgres::Error) -> AppError {
        move |source| AppError::Query { query, source }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Connection(_) => "DATABASE_UNAVAILABLE",
            AppError::Query { .. } => "QUERY_FAILED",
            AppError::Serialization(_) => "SERIALIZATION_FAILED",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serialization(e.to_string())
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (message, details) = match &self {
            AppError::Connection(e) => {
                // Target and driver message name the database host; log only
                error!(code, "Database connection failed: {}", e);
                ("The patient database is unavailable".to_string(), None)
            }
            AppError::Query { query, source } => {
                // Only the statement name is logged; bound values may carry patient data
                error!(code, query = *query, "Query failed: {}", source);
                ("A database query failed".to_string(), None)
            }
            AppError::Serialization(msg) => {
                error!(code, "Serialization error: {}", msg);
                (
                    "Result rows could not be serialized".to_string(),
                    Some(msg.clone()),
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            error: details,
            code: Some(code.to_string()),
        });

        (self.status(), body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_connection_error_is_503() {
        let err = AppError::Connection("connection refused".into());
        assert_eq!(err.code(), "DATABASE_UNAVAILABLE");
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_connection_error_body_hides_target() {
        let err = AppError::Connection(
            "Failed to connect to ward@db.internal:5432/monitor: connection refused".into(),
        );
        let response = err.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["code"], serde_json::json!("DATABASE_UNAVAILABLE"));
        assert!(body.get("error").is_none());
        assert!(!body.to_string().contains("db.internal"));
    }

    #[test]
    fn test_serialization_error_is_500() {
        let response = AppError::Serialization("bad row".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_json_error_converts_to_serialization() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: AppError = json_err.into();
        assert_eq!(err.code(), "SERIALIZATION_FAILED");
    }
}
