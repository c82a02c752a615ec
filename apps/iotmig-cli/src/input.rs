//! Devices CSV input.

use std::io::Read;
use std::path::Path;

use crate::error::{CliError, CliResult};

/// Read device ids from the first column of a headerless CSV file.
pub fn read_device_ids(path: &Path) -> CliResult<Vec<String>> {
    let file = std::fs::File::open(path).map_err(|e| {
        CliError::Io(format!("unable to open devices CSV {}: {}", path.display(), e))
    })?;
    device_ids_from_reader(file)
}

/// Read device ids from CSV data. Blank rows and empty ids are skipped.
pub fn device_ids_from_reader<R: Read>(reader: R) -> CliResult<Vec<String>> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut ids = Vec::new();
    for record in csv.records() {
        let record = record?;
        if let Some(id) = record.get(0).filter(|id| !id.is_empty()) {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}
