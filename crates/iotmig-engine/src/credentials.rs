//! Credential replacement for one device.

use tracing::debug;

use iotmig_connector::types::{DeviceCredential, KeyFormat, NewCredential, ParseKeyFormatError};
use iotmig_connector::types::SourceDevice;

use crate::context::MigrationContext;
use crate::outcome::{contexts, ErrorLog};

/// Map a source credential to its destination form.
///
/// Fails on an unrecognised key format instead of guessing one.
pub fn to_new_credential(
    credential: &DeviceCredential,
) -> Result<NewCredential, ParseKeyFormatError> {
    let key_format: KeyFormat = credential.public_key.format.parse()?;
    Ok(NewCredential {
        public_key: credential.public_key.key.clone(),
        key_format,
        expire_time: credential.normalized_expiration(),
    })
}

/// Delete every destination credential, then create the source ones in order.
///
/// Stops at the first failure. Devices without credentials are left alone.
pub async fn sync_credentials(ctx: &MigrationContext, device: &SourceDevice) -> Result<(), ErrorLog> {
    if device.credentials.is_empty() {
        return Ok(());
    }

    ctx.platform
        .delete_credentials(ctx.system_key(), &device.id)
        .await
        .map_err(|e| ErrorLog::new(&device.id, contexts::DELETE_CREDENTIALS, e))?;

    for credential in &device.credentials {
        let new_credential = to_new_credential(credential)
            .map_err(|e| ErrorLog::new(&device.id, contexts::CREATE_CREDENTIAL, e))?;

        ctx.platform
            .create_credential(ctx.system_key(), &device.id, &new_credential)
            .await
            .map_err(|e| ErrorLog::new(&device.id, contexts::CREATE_CREDENTIAL, e))?;
    }

    debug!(
        device_id = %device.id,
        count = device.credentials.len(),
        "Credentials replaced"
    );
    Ok(())
}
