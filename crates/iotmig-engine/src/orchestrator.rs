//! Per-device migration state machine.
//!
//! `Upsert -> CredentialSync? -> RoleProvision?`, strictly in order. The first
//! hard failure ends the device. Nothing is retried within a run.

use tracing::{debug, instrument, warn};

use iotmig_connector::types::SourceDevice;

use crate::context::MigrationContext;
use crate::credentials::sync_credentials;
use crate::outcome::{DeviceOutcome, ErrorLog};
use crate::roles::provision_role;
use crate::transform::transform;
use crate::upsert::upsert_device;

/// Migrate one device and return its single outcome.
#[instrument(skip_all, fields(device_id = %device.id))]
pub async fn migrate_device(ctx: &MigrationContext, device: &SourceDevice) -> DeviceOutcome {
    let mut warnings = Vec::new();
    let result = run_steps(ctx, device, &mut warnings).await;

    let outcome = match result {
        Ok(()) => {
            debug!("Device migrated");
            DeviceOutcome::success(&device.id)
        }
        Err(failure) => {
            warn!(context = %failure.context, error = %failure.error, "Device migration failed");
            DeviceOutcome::failed(failure)
        }
    };
    outcome.with_warnings(warnings)
}

async fn run_steps(
    ctx: &MigrationContext,
    device: &SourceDevice,
    warnings: &mut Vec<ErrorLog>,
) -> Result<(), ErrorLog> {
    let config = &ctx.config;
    let destination = transform(device, &config.device_type, config.column_mapping.as_ref());

    upsert_device(ctx, &destination, warnings).await?;

    if config.update_public_keys {
        sync_credentials(ctx, device).await?;
    }

    if config.create_device_role {
        provision_role(ctx, &device.id).await?;
    }

    Ok(())
}
