//! # Migration Engine
//!
//! Concurrent migration of IoT devices from a source registry into a
//! destination platform.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   fetch    ┌──────────────┐  one task   ┌──────────────┐
//! │   Source     │──────────► │   Driver     │────────────►│  Worker Pool │
//! │   Registry   │            │  (preflight) │  per device │  (N workers) │
//! └──────────────┘            └──────▲───────┘             └──────┬───────┘
//!                                    │ exactly one                │
//!                                    │ outcome per device         ▼
//!                             ┌──────┴───────┐             ┌──────────────┐
//!                             │   Summary /  │             │ Orchestrator │
//!                             │   Report     │             │ upsert→creds │
//!                             └──────────────┘             │   →role      │
//!                                                          └──────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Every enqueued device yields exactly one [`DeviceOutcome`].
//! - "Already exists" from the destination is success, never an error.
//! - Per-device failures never abort the run; configuration errors
//!   (unknown key format, bad column mapping) abort it before any write.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use iotmig_engine::{migrate_devices, MigrationConfig, MigrationContext, NoopProgress};
//!
//! let config = MigrationConfig::new(system_key).with_create_device_role(true);
//! let ctx = Arc::new(MigrationContext::new(config, Arc::new(platform)));
//! let summary = migrate_devices(ctx, devices, Arc::new(NoopProgress)).await?;
//! println!("Migrated {} / {} devices", summary.succeeded, summary.total);
//! ```

pub mod context;
pub mod credentials;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod mapping;
pub mod orchestrator;
pub mod outcome;
pub mod pool;
pub mod progress;
pub mod report;
pub mod roles;
pub mod transform;
pub mod upsert;

pub use context::{MigrationConfig, MigrationContext, DEFAULT_PAGE_SIZE, TOTAL_WORKERS};
pub use driver::{migrate_devices, preflight};
pub use error::{MigrationError, MigrationResult};
pub use fetch::{fetch_all, fetch_by_ids, missing_device_ids, FetchedDevices};
pub use mapping::{ColumnMapping, SourceField};
pub use orchestrator::migrate_device;
pub use outcome::{DeviceOutcome, ErrorLog, MigrationSummary};
pub use pool::{Task, WorkerPool};
pub use progress::{NoopProgress, ProgressReporter};
pub use report::write_failed_devices_report;
pub use transform::transform;
