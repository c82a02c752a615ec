//! Loading devices from the source registry.

use std::collections::HashSet;

use tracing::{debug, warn};

use iotmig_connector::traits::SourceRegistry;
use iotmig_connector::types::SourceDevice;

use crate::error::{MigrationError, MigrationResult};
use crate::progress::ProgressReporter;

/// Devices fetched by id, plus the ids the registry did not return.
#[derive(Debug, Clone, Default)]
pub struct FetchedDevices {
    pub devices: Vec<SourceDevice>,
    pub missing_ids: Vec<String>,
}

/// Fetch every device, following page tokens to the end.
pub async fn fetch_all(
    registry: &dyn SourceRegistry,
    page_size: usize,
    progress: &dyn ProgressReporter,
) -> MigrationResult<Vec<SourceDevice>> {
    check_page_size(page_size)?;

    let mut devices = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = registry.list_devices(page_size, token.as_deref()).await?;
        let more = page.has_more();
        debug!(fetched = page.devices.len(), more, "Fetched page");

        devices.extend(page.devices);
        progress.inc(1);

        if !more {
            break;
        }
        token = page.next_page_token;
    }

    Ok(devices)
}

/// Fetch the given ids in batches of at most `page_size`.
///
/// Duplicate ids are fetched once. Ids the registry does not know are
/// returned in `missing_ids` rather than failing the fetch.
pub async fn fetch_by_ids(
    registry: &dyn SourceRegistry,
    ids: &[String],
    page_size: usize,
    progress: &dyn ProgressReporter,
) -> MigrationResult<FetchedDevices> {
    check_page_size(page_size)?;

    let unique = dedup_ids(ids);
    let mut devices = Vec::with_capacity(unique.len());
    for batch in unique.chunks(page_size) {
        let fetched = registry.list_devices_by_ids(batch).await?;
        debug!(requested = batch.len(), fetched = fetched.len(), "Fetched batch");
        devices.extend(fetched);
        progress.inc(1);
    }

    let missing_ids = missing_device_ids(&devices, &unique);
    if !missing_ids.is_empty() {
        warn!(missing = ?missing_ids, "Some device ids were not found in the registry");
    }

    Ok(FetchedDevices {
        devices,
        missing_ids,
    })
}

/// Ids from `ids` that no device in `devices` carries, in input order.
pub fn missing_device_ids(devices: &[SourceDevice], ids: &[String]) -> Vec<String> {
    let found: HashSet<&str> = devices.iter().map(|d| d.id.as_str()).collect();
    ids.iter()
        .filter(|id| !found.contains(id.as_str()))
        .cloned()
        .collect()
}

fn dedup_ids(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && seen.insert(*id))
        .map(str::to_string)
        .collect()
}

fn check_page_size(page_size: usize) -> MigrationResult<()> {
    if page_size == 0 {
        return Err(MigrationError::invalid_config("page size must be at least 1"));
    }
    Ok(())
}
