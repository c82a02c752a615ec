//! `iotmig version` command.

use crate::error::CliResult;

/// Version string printed by `iotmig version`.
pub fn version_string() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Execute the version command.
pub fn execute() -> CliResult<()> {
    println!("{}", version_string());
    Ok(())
}
