//! `iotmig migrate` command.

use std::sync::Arc;

use tracing::debug;

use iotmig_connector::traits::SourceRegistry;
use iotmig_connector::types::SourceDevice;
use iotmig_connector_rest::{IotCoreRegistry, PlatformClient, RestConfig, ServiceAccount};
use iotmig_engine::{
    fetch_all, fetch_by_ids, migrate_devices, write_failed_devices_report, ColumnMapping,
    MigrationContext, ProgressReporter,
};

use crate::config::{MigrateArgs, MigrateSettings};
use crate::error::{CliError, CliResult};
use crate::input::read_device_ids;
use crate::interactive::TerminalPrompter;
use crate::output::printer::{
    print_header, print_info, print_key_value, print_migration_result, print_success,
    print_warning,
};
use crate::progress::{FetchSpinner, MigrationProgress};

/// Execute the migrate command.
pub async fn execute(args: MigrateArgs) -> CliResult<()> {
    let args = args.with_env()?;
    if args.cb_enterprise_msg_url.is_some() || args.cb_system_secret.is_some() {
        debug!("Messaging URL and system secret are not used by the HTTP transport");
    }

    let settings = args.resolve(&TerminalPrompter)?;
    debug!(?settings, "Resolved settings");
    print_success("All flags validated!");

    run(settings).await
}

async fn run(settings: MigrateSettings) -> CliResult<()> {
    // Mapping errors surface before any remote call.
    let column_mapping = settings
        .column_map_csv
        .as_ref()
        .map(ColumnMapping::from_csv_path)
        .transpose()?;

    let account = ServiceAccount::from_file(&settings.service_account)?;
    let http = RestConfig::new(&account.url).with_request_timeout(settings.request_timeout_secs);

    let registry = IotCoreRegistry::connect(
        &account,
        &settings.registry_name,
        &settings.registry_region,
        http.clone(),
    )
    .await?;
    print_success(&format!(
        "Connected to registry {} ({})",
        settings.registry_name, settings.registry_region
    ));

    let platform = PlatformClient::authenticate(
        http.with_base_url(&settings.enterprise_url),
        &settings.dev_email,
        &settings.dev_password,
    )
    .await?;
    print_success("Authenticated with IoT Enterprise");

    let device_count = registry.device_count().await?;
    if device_count == 0 {
        print_info("No devices in registry. Skipping migration.");
        return Ok(());
    }

    print_header("Starting Device Migration");
    print_key_value("Version", env!("CARGO_PKG_VERSION"));
    print_key_value("Registry", registry.parent());
    print_key_value("Devices in registry", &device_count.to_string());

    let devices = fetch_devices(&registry, &settings, device_count).await?;
    if devices.is_empty() {
        print_info("No devices to migrate.");
        return Ok(());
    }

    let config = settings.migration_config(column_mapping);
    let ctx = Arc::new(MigrationContext::new(config, Arc::new(platform)));
    let progress = Arc::new(MigrationProgress::new("Migrating devices"));

    let summary = migrate_devices(ctx, devices, progress).await?;
    print_migration_result(summary.succeeded, summary.total);

    if !summary.errors.is_empty() {
        let path = write_failed_devices_report(&settings.report_dir, &summary.errors)?;
        print_info(&format!("Failed devices report written to {}", path.display()));
    }

    print_success("Done!");

    if settings.fail_on_errors && !summary.is_complete() {
        return Err(CliError::IncompleteMigration {
            failed: summary.failed(),
            total: summary.total,
        });
    }
    Ok(())
}

/// Fetch the devices named in the devices CSV, or the whole registry.
async fn fetch_devices(
    registry: &dyn SourceRegistry,
    settings: &MigrateSettings,
    device_count: u64,
) -> CliResult<Vec<SourceDevice>> {
    let devices = match &settings.devices_csv {
        Some(path) => {
            let ids = read_device_ids(path)?;
            print_info(&format!("Read {} device ids from {}", ids.len(), path.display()));

            let spinner = FetchSpinner::new("Fetching devices by id");
            let fetched = fetch_by_ids(registry, &ids, settings.page_size, &spinner).await;
            spinner.finish("");
            let fetched = fetched?;

            if !fetched.missing_ids.is_empty() {
                print_warning(&format!(
                    "{} device(s) not found in the registry: {}",
                    fetched.missing_ids.len(),
                    fetched.missing_ids.join(", ")
                ));
            }
            fetched.devices
        }
        None => {
            let spinner = FetchSpinner::new("Fetching all devices");
            let devices = fetch_all(registry, settings.page_size, &spinner).await;
            spinner.finish("");
            let devices = devices?;

            if devices.len() as u64 != device_count {
                print_warning(&format!(
                    "Registry reported {} devices but {} were fetched",
                    device_count,
                    devices.len()
                ));
            }
            devices
        }
    };

    print_success(&format!("Fetched {} devices", devices.len()));
    Ok(devices)
}
