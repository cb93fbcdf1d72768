//! Error types for vigil operations.
//!
//! The decision core itself never surfaces these to its callers: the engine turns
//! them into logged fallbacks. They are used by the stores, the repositories and
//! configuration loading, where the caller may want to react programmatically.

use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for vigil operations.
pub type VigilResult<T> = Result<T, VigilError>;

/// Main error type for all vigil operations.
#[derive(Error, Debug)]
pub enum VigilError {
    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        details: HashMap<String, String>,
        suggestion: Option<String>,
    },

    /// Referenced entity does not exist.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        entity_id: Option<String>,
    },

    /// The durable store rejected a write because it is full.
    #[error("Storage capacity exceeded: {message}")]
    CapacityExceeded {
        message: String,
        code: ErrorCode,
        attempted_bytes: Option<usize>,
        limit_bytes: Option<usize>,
    },

    /// Durable store operation failed.
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Persisted state could not be read back.
    #[error("Corrupt state under '{key}': {message}")]
    CorruptState {
        key: String,
        message: String,
        code: ErrorCode,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Parse error.
    #[error("Parse error: {message}")]
    Parse { message: String, code: ErrorCode },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation (VAL_xxx)
    ValInvalidInput,
    ValMissingField,
    ValOutOfRange,
    ValImmutable,

    // Lookup (NF_xxx)
    NfSignal,
    NfPersona,
    NfFocusZone,
    NfRule,

    // Storage (STO_xxx)
    StoCapacity,
    StoOperationFailed,
    StoConnectionFailed,
    StoCorrupt,

    // Parse (PARSE_xxx)
    ParseInvalidJson,
    ParseInvalidTime,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValMissingField => "VAL_002",
            ErrorCode::ValOutOfRange => "VAL_003",
            ErrorCode::ValImmutable => "VAL_004",
            ErrorCode::NfSignal => "NF_001",
            ErrorCode::NfPersona => "NF_002",
            ErrorCode::NfFocusZone => "NF_003",
            ErrorCode::NfRule => "NF_004",
            ErrorCode::StoCapacity => "STO_001",
            ErrorCode::StoOperationFailed => "STO_002",
            ErrorCode::StoConnectionFailed => "STO_003",
            ErrorCode::StoCorrupt => "STO_004",
            ErrorCode::ParseInvalidJson => "PARSE_001",
            ErrorCode::ParseInvalidTime => "PARSE_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl VigilError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: None,
        }
    }

    /// Create a validation error for a missing required field.
    pub fn missing_field(field: impl Into<String>) -> Self {
        let field = field.into();
        let mut details = HashMap::new();
        details.insert("field".to_string(), field.clone());
        Self::Validation {
            message: format!("Missing required field '{}'", field),
            code: ErrorCode::ValMissingField,
            details,
            suggestion: None,
        }
    }

    /// Create a validation error with suggestion.
    pub fn validation_with_suggestion(
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: Some(suggestion.into()),
        }
    }

    /// Create a not found error for the given code and id.
    pub fn not_found(code: ErrorCode, kind: &str, id: impl Into<String>) -> Self {
        let id = id.into();
        Self::NotFound {
            message: format!("{} with id '{}' not found", kind, id),
            code,
            entity_id: Some(id),
        }
    }

    /// Create a capacity error.
    pub fn capacity(attempted_bytes: usize, limit_bytes: usize) -> Self {
        Self::CapacityExceeded {
            message: format!(
                "value of {} bytes exceeds the {} byte limit",
                attempted_bytes, limit_bytes
            ),
            code: ErrorCode::StoCapacity,
            attempted_bytes: Some(attempted_bytes),
            limit_bytes: Some(limit_bytes),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            code: ErrorCode::StoOperationFailed,
            source: None,
        }
    }

    /// Create a corrupt-state error.
    pub fn corrupt(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptState {
            key: key.into(),
            message: message.into(),
            code: ErrorCode::StoCorrupt,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidJson,
        }
    }

    /// Whether this error means the store is full and a smaller write may succeed.
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::CapacityExceeded { code, .. } => *code,
            Self::Storage { code, .. } => *code,
            Self::CorruptState { code, .. } => *code,
            Self::Parse { code, .. } => *code,
            Self::Serialization(_) => ErrorCode::ParseInvalidJson,
            _ => ErrorCode::Internal,
        }
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::NotFound { .. } => Some("Please check the id and ensure it exists"),
            Self::CapacityExceeded { .. } => {
                Some("Lower the retention limits or raise the store capacity")
            }
            Self::Storage { .. } => Some("Please check the storage path and permissions"),
            Self::CorruptState { .. } => Some("The stored value was replaced by defaults"),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for VigilError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage {
            message: err.to_string(),
            code: ErrorCode::StoOperationFailed,
            source: Some(Box::new(err)),
        }
    }
}
