//! Create-or-update of one destination device.

use tracing::{debug, warn};

use iotmig_connector::types::DestinationDevice;

use crate::context::MigrationContext;
use crate::outcome::{contexts, ErrorLog};

/// Create the device, falling back to an update.
///
/// A conflict on create goes straight to update. Any other create failure
/// is pushed onto `warnings` and update is still attempted, which repairs
/// devices that exist remotely but failed to create for another reason.
/// The update result is the verdict.
pub async fn upsert_device(
    ctx: &MigrationContext,
    device: &DestinationDevice,
    warnings: &mut Vec<ErrorLog>,
) -> Result<(), ErrorLog> {
    let device_id = device.name();

    match ctx.platform.create_device(ctx.system_key(), device).await {
        Ok(()) => {
            debug!(device_id = %device_id, "Device created");
            return Ok(());
        }
        Err(e) if e.is_conflict() => {
            debug!(device_id = %device_id, "Device exists, updating");
        }
        Err(e) => {
            warn!(device_id = %device_id, error = %e, "Device create failed, attempting update");
            warnings.push(ErrorLog::new(device_id, contexts::CREATE_DEVICE, &e));
        }
    }

    ctx.platform
        .update_device(ctx.system_key(), device)
        .await
        .map_err(|e| ErrorLog::new(device_id, contexts::UPDATE_DEVICE, e))
}
