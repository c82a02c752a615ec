//! Fan-out/fan-in driver.

use std::sync::Arc;

use tracing::{info, instrument};

use iotmig_connector::types::{KeyFormat, SourceDevice};

use crate::context::MigrationContext;
use crate::error::{MigrationError, MigrationResult};
use crate::orchestrator::migrate_device;
use crate::outcome::MigrationSummary;
use crate::pool::{Task, WorkerPool};
use crate::progress::ProgressReporter;

/// Reject the run if any credential that would be migrated has an
/// unsupported key format.
///
/// Runs before any destination call. Does nothing when credential
/// replacement is disabled.
pub fn preflight(ctx: &MigrationContext, devices: &[SourceDevice]) -> MigrationResult<()> {
    if !ctx.config.update_public_keys {
        return Ok(());
    }

    for device in devices {
        for credential in &device.credentials {
            let format = &credential.public_key.format;
            if format.parse::<KeyFormat>().is_err() {
                return Err(MigrationError::UnsupportedKeyFormat {
                    device_id: device.id.clone(),
                    format: format.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Migrate every device through the worker pool and summarise the outcomes.
///
/// One task is enqueued per device in input order; outcomes arrive in
/// completion order. Per-device failures end up in the summary; only
/// configuration and pool errors are returned as `Err`.
#[instrument(skip_all, fields(devices = devices.len(), workers = ctx.config.workers))]
pub async fn migrate_devices(
    ctx: Arc<MigrationContext>,
    devices: Vec<SourceDevice>,
    progress: Arc<dyn ProgressReporter>,
) -> MigrationResult<MigrationSummary> {
    ctx.config.validate()?;
    preflight(&ctx, &devices)?;

    let expected = devices.len();
    progress.set_total(expected as u64);

    let (mut pool, mut results) = WorkerPool::new(ctx.config.workers, expected, progress.clone());
    pool.run();

    for device in devices {
        let task_ctx = Arc::clone(&ctx);
        let device_id = device.id.clone();
        pool.add_task(Task::new(device_id, async move {
            migrate_device(&task_ctx, &device).await
        }))?;
    }
    pool.close();

    let mut outcomes = Vec::with_capacity(expected);
    while outcomes.len() < expected {
        match results.recv().await {
            Some(outcome) => outcomes.push(outcome),
            None => {
                return Err(MigrationError::ResultChannelClosed {
                    received: outcomes.len(),
                    expected,
                })
            }
        }
    }
    pool.join().await?;

    let summary = MigrationSummary::from_outcomes(outcomes);
    progress.finish(&format!(
        "Migrated {} / {} devices",
        summary.succeeded, summary.total
    ));
    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        errors = summary.errors.len(),
        "Migration finished"
    );
    Ok(summary)
}
