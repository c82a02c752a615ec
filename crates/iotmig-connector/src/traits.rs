//! Collaborator traits
//!
//! The engine talks to the source registry and the destination platform only
//! through these traits. Implementations must be safe to share across the
//! worker pool.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ConnectorResult;
use crate::types::{DestinationDevice, DevicePage, NewCredential, SourceDevice, TopicPermission};

/// Read access to the registry devices are migrated from.
#[async_trait]
pub trait SourceRegistry: Send + Sync {
    /// Total number of devices in the registry.
    async fn device_count(&self) -> ConnectorResult<u64>;

    /// Fetch one page of devices.
    ///
    /// Pass the previous page's `next_page_token` to continue; `None` starts
    /// from the beginning.
    async fn list_devices(
        &self,
        page_size: usize,
        page_token: Option<&str>,
    ) -> ConnectorResult<DevicePage>;

    /// Fetch the named devices. Ids the registry does not know are omitted.
    async fn list_devices_by_ids(&self, ids: &[String]) -> ConnectorResult<Vec<SourceDevice>>;
}

/// Write access to the platform devices are migrated into.
///
/// Every operation that can find its effect already present reports that as
/// [`ConnectorError::ObjectAlreadyExists`](crate::error::ConnectorError::ObjectAlreadyExists).
#[async_trait]
pub trait DestinationPlatform: Send + Sync {
    /// Create a device. Conflict when the device name is taken.
    async fn create_device(&self, system_key: &str, device: &DestinationDevice)
        -> ConnectorResult<()>;

    /// Patch an existing device.
    async fn update_device(&self, system_key: &str, device: &DestinationDevice)
        -> ConnectorResult<()>;

    /// Remove every credential bound to the device.
    async fn delete_credentials(&self, system_key: &str, device_name: &str) -> ConnectorResult<()>;

    /// Bind one credential to the device.
    async fn create_credential(
        &self,
        system_key: &str,
        device_name: &str,
        credential: &NewCredential,
    ) -> ConnectorResult<()>;

    /// Create a role. Conflict when the role name is taken.
    async fn create_role(&self, system_key: &str, role_name: &str) -> ConnectorResult<Value>;

    /// Fetch a role by name.
    async fn get_role(&self, system_key: &str, role_name: &str) -> ConnectorResult<Value>;

    /// Grant `permission` on `topic` to the role.
    async fn add_topic_to_role(
        &self,
        system_key: &str,
        role_id: &str,
        topic: &str,
        permission: TopicPermission,
    ) -> ConnectorResult<()>;

    /// Make the device a member of the role. Conflict when already a member.
    async fn add_device_to_role(
        &self,
        system_key: &str,
        device_name: &str,
        role_name: &str,
    ) -> ConnectorResult<()>;
}
