//! # REST Migration Connectors
//!
//! HTTP implementations of the migration collaborators.
//!
//! - [`IotCoreRegistry`] reads devices from an IoT Core compatible registry,
//!   authenticated by a [`ServiceAccount`].
//! - [`PlatformClient`] writes devices, credentials and roles to the
//!   destination platform, authenticated as a developer.
//!
//! Both clients apply a per-request timeout from [`RestConfig`] and never
//! retry. "Already exists" responses are classified here into
//! [`ConnectorError::ObjectAlreadyExists`](iotmig_connector::error::ConnectorError::ObjectAlreadyExists).
//!
//! # Example
//!
//! ```ignore
//! use iotmig_connector_rest::{PlatformClient, RestConfig};
//!
//! let config = RestConfig::new("https://iot.example.com").with_request_timeout(30);
//! let platform = PlatformClient::authenticate(config, "dev@example.com", "secret").await?;
//! ```

pub mod config;
pub mod destination;
mod response;
pub mod service_account;
pub mod source;

pub use config::RestConfig;
pub use destination::PlatformClient;
pub use service_account::ServiceAccount;
pub use source::IotCoreRegistry;
