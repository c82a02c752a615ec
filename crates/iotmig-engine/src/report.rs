//! Failed-device report.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::MigrationResult;
use crate::outcome::ErrorLog;

/// Report file name for a run finished at `at`.
pub fn report_file_name(at: DateTime<Local>) -> String {
    format!("failed_devices_{}.csv", at.format("%Y-%m-%dT%H-%M-%S"))
}

/// Write `errors` to a timestamped CSV in `dir` and return its path.
///
/// Columns are `context,error,deviceId`.
pub fn write_failed_devices_report(dir: &Path, errors: &[ErrorLog]) -> MigrationResult<PathBuf> {
    let path = dir.join(report_file_name(Local::now()));
    let mut writer = csv::Writer::from_path(&path)?;

    writer.write_record(["context", "error", "deviceId"])?;
    for entry in errors {
        writer.write_record([
            entry.context.as_str(),
            entry.error.as_str(),
            entry.device_id.as_str(),
        ])?;
    }
    writer.flush()?;

    info!(path = %path.display(), entries = errors.len(), "Wrote failed device report");
    Ok(path)
}
