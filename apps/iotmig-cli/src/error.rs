//! CLI error types and exit codes

use thiserror::Error;

use iotmig_connector::error::ConnectorError;
use iotmig_engine::MigrationError;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 2: Authentication failed
/// - 3: Network error
/// - 4: Validation error
/// - 5: Devices failed and `--fail-on-errors` was given
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Connection failed: {0}\n\nTroubleshooting:\n  - Check your internet connection\n  - Verify the registry and enterprise URLs are correct\n  - Try again in a few moments")]
    ConnectionFailed(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Remote error (status {status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("{failed} of {total} devices failed to migrate")]
    IncompleteMigration { failed: usize, total: usize },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::AuthenticationFailed(_) => 2,
            CliError::Network(_) | CliError::ConnectionFailed(_) => 3,
            CliError::Validation(_) => 4,
            CliError::Remote { status, .. } => {
                if *status == 401 || *status == 403 {
                    2
                } else {
                    1
                }
            }
            CliError::Config(_) | CliError::Migration(_) | CliError::Io(_) => 1,
            CliError::IncompleteMigration { .. } => 5,
        }
    }

    /// Print the error to stderr with appropriate formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    /// Get a suggested action for this error
    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::AuthenticationFailed(_) => {
                Some("Check --cb-dev-email and --cb-dev-pwd for the target system.")
            }
            CliError::ConnectionFailed(_) => Some("Check your network connection and try again."),
            CliError::Validation(_) => Some("Run 'iotmig migrate --help' for all options."),
            CliError::IncompleteMigration { .. } => {
                Some("Inspect the failed devices report and re-run with --devices-csv.")
            }
            _ => None,
        }
    }
}

impl From<ConnectorError> for CliError {
    fn from(e: ConnectorError) -> Self {
        match e {
            ConnectorError::AuthenticationFailed { message } => {
                CliError::AuthenticationFailed(message)
            }
            ConnectorError::ConnectionFailed { .. } => CliError::ConnectionFailed(e.to_string()),
            ConnectorError::Timeout { .. } => CliError::Network(e.to_string()),
            ConnectorError::Http { status, message } => CliError::Remote { status, message },
            ConnectorError::InvalidConfiguration { message } => CliError::Validation(message),
            other => CliError::Config(other.to_string()),
        }
    }
}

impl From<MigrationError> for CliError {
    fn from(e: MigrationError) -> Self {
        match e {
            MigrationError::Source(source) => source.into(),
            e if e.is_configuration() => CliError::Validation(e.to_string()),
            MigrationError::Report { message } => CliError::Io(message),
            other => CliError::Migration(other.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}

impl From<csv::Error> for CliError {
    fn from(e: csv::Error) -> Self {
        CliError::Io(format!("CSV error: {}", e))
    }
}
