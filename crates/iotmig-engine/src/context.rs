//! Run configuration and shared handles.

use std::sync::Arc;

use iotmig_connector::traits::DestinationPlatform;

use crate::error::{MigrationError, MigrationResult};
use crate::mapping::ColumnMapping;

/// Number of concurrent per-device workers.
pub const TOTAL_WORKERS: usize = 10;

/// Default page size for registry listings and id batches.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Settings that shape a migration run.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Destination system key all devices are written under.
    pub system_key: String,

    /// Destination `type` label for every device.
    pub device_type: String,

    /// Replace destination credentials with the source ones.
    pub update_public_keys: bool,

    /// Provision a per-device role with topic permissions.
    pub create_device_role: bool,

    /// Worker pool size.
    pub workers: usize,

    /// Page size for batched fetch.
    pub page_size: usize,

    /// Optional extra columns.
    pub column_mapping: Option<ColumnMapping>,
}

impl MigrationConfig {
    /// Create a config with the defaults of the command line.
    pub fn new(system_key: impl Into<String>) -> Self {
        Self {
            system_key: system_key.into(),
            device_type: String::new(),
            update_public_keys: true,
            create_device_role: false,
            workers: TOTAL_WORKERS,
            page_size: DEFAULT_PAGE_SIZE,
            column_mapping: None,
        }
    }

    #[must_use]
    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = device_type.into();
        self
    }

    #[must_use]
    pub fn with_update_public_keys(mut self, enabled: bool) -> Self {
        self.update_public_keys = enabled;
        self
    }

    #[must_use]
    pub fn with_create_device_role(mut self, enabled: bool) -> Self {
        self.create_device_role = enabled;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn with_column_mapping(mut self, mapping: ColumnMapping) -> Self {
        self.column_mapping = Some(mapping);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> MigrationResult<()> {
        if self.system_key.trim().is_empty() {
            return Err(MigrationError::invalid_config("system key is required"));
        }
        if self.workers == 0 {
            return Err(MigrationError::invalid_config("worker count must be at least 1"));
        }
        if self.page_size == 0 {
            return Err(MigrationError::invalid_config("page size must be at least 1"));
        }
        Ok(())
    }
}

/// Everything a migration step needs: configuration plus the destination.
///
/// Built once per run and shared by reference with every worker.
pub struct MigrationContext {
    pub config: MigrationConfig,
    pub platform: Arc<dyn DestinationPlatform>,
}

impl MigrationContext {
    pub fn new(config: MigrationConfig, platform: Arc<dyn DestinationPlatform>) -> Self {
        Self { config, platform }
    }

    pub fn system_key(&self) -> &str {
        &self.config.system_key
    }
}

impl std::fmt::Debug for MigrationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
