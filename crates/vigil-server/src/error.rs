//! Error handling for the REST API server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

use vigil_core::error::VigilError;

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    // Common error constructors
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    pub fn insufficient_storage(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INSUFFICIENT_STORAGE, "STORAGE_FULL", message)
    }

    /// 404 for a delivered signal id the engine does not know.
    pub fn unknown_signal(id: &str) -> Self {
        Self::not_found(format!("Signal with id '{}' not found", id))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.status, self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };

        (self.status, Json(body)).into_response()
    }
}

// Convert from vigil-core errors
impl From<VigilError> for ApiError {
    fn from(err: VigilError) -> Self {
        let code = err.code().as_str();
        let suggestion = err.suggestion().map(str::to_string);

        let api = match err {
            VigilError::Validation {
                message, details, ..
            } => {
                let api = ApiError::validation(message);
                if details.is_empty() {
                    api
                } else {
                    api.with_details(serde_json::json!(details))
                }
            }
            VigilError::NotFound { message, .. } => ApiError::not_found(message),
            VigilError::CapacityExceeded { message, .. } => ApiError::insufficient_storage(message),
            VigilError::Configuration(msg) => ApiError::bad_request(msg),
            VigilError::Parse { message, .. } => ApiError::bad_request(message),
            VigilError::Storage { message, .. } => {
                ApiError::internal(format!("Storage error: {}", message))
            }
            VigilError::CorruptState { key, message, .. } => {
                ApiError::internal(format!("Corrupt state under '{}': {}", key, message))
            }
            VigilError::Serialization(e) => {
                ApiError::internal(format!("Serialization error: {}", e))
            }
            VigilError::Io(e) => ApiError::internal(format!("IO error: {}", e)),
            VigilError::Internal(msg) => ApiError::internal(msg),
        };

        match (api.details.is_some(), suggestion) {
            (false, Some(suggestion)) => api.with_details(serde_json::json!({
                "core_code": code,
                "suggestion": suggestion,
            })),
            _ => api,
        }
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::error::ErrorCode;

    #[test]
    fn test_not_found_maps_to_404() {
        let err: ApiError = VigilError::not_found(ErrorCode::NfRule, "Rule", "r-1").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "NOT_FOUND");
        assert!(err.message.contains("r-1"));
    }

    #[test]
    fn test_validation_keeps_suggestion() {
        let err: ApiError =
            VigilError::validation_with_suggestion("Unknown timezone 'X'", "Use an IANA name")
                .into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        let details = err.details.unwrap();
        assert_eq!(details["suggestion"], "Use an IANA name");
        assert_eq!(details["core_code"], "VAL_001");
    }

    #[test]
    fn test_missing_field_details() {
        let err: ApiError = VigilError::missing_field("id").into();
        assert_eq!(err.details.unwrap()["field"], "id");
    }

    #[test]
    fn test_capacity_maps_to_507() {
        let err: ApiError = VigilError::capacity(10, 4).into();
        assert_eq!(err.status, StatusCode::INSUFFICIENT_STORAGE);
    }
}
