//! # Migration Connectors
//!
//! Shared vocabulary for moving IoT devices from a source device registry
//! into a destination platform.
//!
//! ## Crate Organization
//!
//! - [`types`] - Source device records, credentials, key formats and the
//!   destination device representation
//! - [`error`] - Connector errors with the typed `Conflict`/`Other` classification
//! - [`traits`] - The [`SourceRegistry`](traits::SourceRegistry) and
//!   [`DestinationPlatform`](traits::DestinationPlatform) capabilities
//!
//! Concrete HTTP implementations live in `iotmig-connector-rest`; the
//! migration engine only ever sees the traits defined here.

pub mod error;
pub mod traits;
pub mod types;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{ConnectorError, ConnectorResult, ErrorKind};
    pub use crate::traits::{DestinationPlatform, SourceRegistry};
    pub use crate::types::{
        DestinationDevice, DeviceCredential, DevicePage, KeyFormat, NewCredential,
        ParseKeyFormatError, PublicKeyCredential, SourceDevice, TopicPermission,
    };
}

// Re-export async_trait for collaborator implementors
pub use async_trait::async_trait;
