//! Per-device outcomes and the run summary.

use serde::Serialize;
use std::fmt;

/// Context strings naming the step that failed.
pub mod contexts {
    pub const CREATE_DEVICE: &str = "Error when Creating Device";
    pub const UPDATE_DEVICE: &str = "Error when Patching Device";
    pub const DELETE_CREDENTIALS: &str = "Error when deleting device credentials";
    pub const CREATE_CREDENTIAL: &str = "Error when creating device credential";
    pub const CREATE_ROLE: &str = "Error when Creating role";
    pub const GET_ROLE: &str = "Error when retrieving role";
    pub const RESOLVE_ROLE_ID: &str = "Error when resolving role id";
    pub const ADD_TOPIC: &str = "Error when adding topic to role";
    pub const ADD_DEVICE_TO_ROLE: &str = "Error when adding device to role";
    pub const WORKER_PANIC: &str = "Error when running migration task";
}

/// One failed step for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorLog {
    pub device_id: String,
    pub context: String,
    pub error: String,
}

impl ErrorLog {
    pub fn new(
        device_id: impl Into<String>,
        context: impl Into<String>,
        error: impl fmt::Display,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            context: context.into(),
            error: error.to_string(),
        }
    }
}

impl fmt::Display for ErrorLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.context, self.device_id, self.error)
    }
}

/// Terminal result of migrating one device.
///
/// `failure` is the hard failure that stopped the device, if any. `warnings`
/// are failures that were recorded but did not stop it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceOutcome {
    pub device_id: String,
    pub failure: Option<ErrorLog>,
    pub warnings: Vec<ErrorLog>,
}

impl DeviceOutcome {
    pub fn success(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            failure: None,
            warnings: Vec::new(),
        }
    }

    pub fn failed(failure: ErrorLog) -> Self {
        Self {
            device_id: failure.device_id.clone(),
            failure: Some(failure),
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<ErrorLog>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Aggregate of all outcomes of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    pub total: usize,
    pub succeeded: usize,
    /// Every failure, followed by every warning.
    pub errors: Vec<ErrorLog>,
}

impl MigrationSummary {
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = DeviceOutcome>) -> Self {
        let mut summary = Self::default();
        let mut warnings = Vec::new();

        for outcome in outcomes {
            summary.total += 1;
            match outcome.failure {
                None => summary.succeeded += 1,
                Some(failure) => summary.errors.push(failure),
            }
            warnings.extend(outcome.warnings);
        }

        summary.errors.extend(warnings);
        summary
    }

    pub fn failed(&self) -> usize {
        self.total - self.succeeded
    }

    pub fn is_complete(&self) -> bool {
        self.succeeded == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_orders_failures_before_warnings() {
        let warning = ErrorLog::new("dev-1", contexts::CREATE_DEVICE, "timeout");
        let failure = ErrorLog::new("dev-2", contexts::UPDATE_DEVICE, "HTTP 500: boom");

        let summary = MigrationSummary::from_outcomes(vec![
            DeviceOutcome::success("dev-1").with_warnings(vec![warning.clone()]),
            DeviceOutcome::failed(failure.clone()),
            DeviceOutcome::success("dev-3"),
        ]);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed(), 1);
        assert!(!summary.is_complete());
        assert_eq!(summary.errors, vec![failure, warning]);
    }

    #[test]
    fn test_empty_summary_is_complete() {
        let summary = MigrationSummary::from_outcomes(Vec::new());
        assert!(summary.is_complete());
        assert!(summary.errors.is_empty());
    }

    #[test]
    fn test_failed_outcome_takes_device_id() {
        let outcome = DeviceOutcome::failed(ErrorLog::new("dev-9", contexts::ADD_TOPIC, "x"));
        assert_eq!(outcome.device_id, "dev-9");
        assert!(!outcome.is_success());
    }
}
