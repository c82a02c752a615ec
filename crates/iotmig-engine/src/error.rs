//! Run-level migration errors
//!
//! Per-device failures never surface here; they are carried in
//! [`DeviceOutcome`](crate::outcome::DeviceOutcome). A `MigrationError`
//! aborts the whole run.

use thiserror::Error;

use iotmig_connector::error::ConnectorError;

/// Error that aborts a migration run.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A device carries a credential format the destination cannot accept.
    #[error("device '{device_id}' has unsupported credential format '{format}'")]
    UnsupportedKeyFormat { device_id: String, format: String },

    /// A column mapping names a source field that does not exist.
    #[error("column map line {line}: unknown source field '{field}'")]
    UnknownSourceField { field: String, line: usize },

    /// A column mapping row is malformed or targets a fixed field.
    #[error("column map line {line}: {message}")]
    InvalidColumnMapping { line: usize, message: String },

    /// Column map file could not be read.
    #[error("unable to read column map {path}: {message}")]
    ColumnMapFile { path: String, message: String },

    /// Run configuration is unusable.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Fetching devices from the source registry failed.
    #[error("source registry error: {0}")]
    Source(#[from] ConnectorError),

    /// Failed-device report could not be written.
    #[error("unable to write report: {message}")]
    Report { message: String },

    /// A pool worker died outside of task execution.
    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },

    /// Fewer outcomes than tasks arrived before all workers stopped.
    #[error("result channel closed after {received} of {expected} outcomes")]
    ResultChannelClosed { received: usize, expected: usize },
}

impl MigrationError {
    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            MigrationError::UnsupportedKeyFormat { .. } => "UNSUPPORTED_KEY_FORMAT",
            MigrationError::UnknownSourceField { .. } => "UNKNOWN_SOURCE_FIELD",
            MigrationError::InvalidColumnMapping { .. } => "INVALID_COLUMN_MAPPING",
            MigrationError::ColumnMapFile { .. } => "COLUMN_MAP_FILE",
            MigrationError::InvalidConfig { .. } => "INVALID_CONFIG",
            MigrationError::Source(_) => "SOURCE_ERROR",
            MigrationError::Report { .. } => "REPORT_ERROR",
            MigrationError::WorkerPanicked { .. } => "WORKER_PANICKED",
            MigrationError::ResultChannelClosed { .. } => "RESULT_CHANNEL_CLOSED",
        }
    }

    /// True for errors caused by user input rather than a remote system.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            MigrationError::UnsupportedKeyFormat { .. }
                | MigrationError::UnknownSourceField { .. }
                | MigrationError::InvalidColumnMapping { .. }
                | MigrationError::ColumnMapFile { .. }
                | MigrationError::InvalidConfig { .. }
        )
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        MigrationError::InvalidConfig {
            message: message.into(),
        }
    }
}

impl From<csv::Error> for MigrationError {
    fn from(e: csv::Error) -> Self {
        MigrationError::Report {
            message: e.to_string(),
        }
    }
}

impl From<std::io::Error> for MigrationError {
    fn from(e: std::io::Error) -> Self {
        MigrationError::Report {
            message: e.to_string(),
        }
    }
}

/// Result type for run-level operations.
pub type MigrationResult<T> = Result<T, MigrationError>;
