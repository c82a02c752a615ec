//! Connector error types
//!
//! Remote failures are classified exactly once, at the collaborator boundary,
//! into [`ErrorKind::Conflict`] (the effect already exists remotely) or
//! [`ErrorKind::Other`]. Migration steps branch on the kind, never on the
//! error text.

use thiserror::Error;

/// Coarse classification used by migration steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The resource or binding already exists on the remote side.
    Conflict,
    /// Any other failure.
    Other,
}

/// Error that can occur while talking to the source registry or the
/// destination platform.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Failed to reach the remote system.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The request did not complete within the configured timeout.
    #[error("request timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Credentials were rejected.
    #[error("authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Object already exists in the remote system.
    #[error("{message}")]
    ObjectAlreadyExists { message: String },

    /// Object not found in the remote system.
    #[error("object not found: {identifier}")]
    ObjectNotFound { identifier: String },

    /// Remote system answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Local configuration is unusable.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Response could not be interpreted.
    #[error("invalid data: {message}")]
    InvalidData { message: String },

    /// JSON encoding or decoding failed.
    #[error("serialization error: {message}")]
    Serialization { message: String },
}

impl ConnectorError {
    /// Classify this error for step logic.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConnectorError::ObjectAlreadyExists { .. } => ErrorKind::Conflict,
            _ => ErrorKind::Other,
        }
    }

    /// True when the remote effect already exists.
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectorError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            ConnectorError::Timeout { .. } => "TIMEOUT",
            ConnectorError::AuthenticationFailed { .. } => "AUTH_FAILED",
            ConnectorError::ObjectAlreadyExists { .. } => "OBJECT_EXISTS",
            ConnectorError::ObjectNotFound { .. } => "OBJECT_NOT_FOUND",
            ConnectorError::Http { .. } => "HTTP_ERROR",
            ConnectorError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            ConnectorError::InvalidData { .. } => "INVALID_DATA",
            ConnectorError::Serialization { .. } => "SERIALIZATION_ERROR",
        }
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a conflict error carrying the remote message.
    pub fn already_exists(message: impl Into<String>) -> Self {
        ConnectorError::ObjectAlreadyExists {
            message: message.into(),
        }
    }

    /// Create an HTTP status error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        ConnectorError::Http {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        ConnectorError::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        ConnectorError::InvalidData {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ConnectorError {
    fn from(e: serde_json::Error) -> Self {
        ConnectorError::Serialization {
            message: e.to_string(),
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
