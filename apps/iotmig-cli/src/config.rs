//! Migration settings: flags, `IOTMIG_*` environment variables, prompts.
//!
//! Values are taken from the command line first, then from the
//! environment, then asked for interactively. In silent mode, or without
//! a terminal, a missing required value is a validation error.

use std::env::VarError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::Args;

use iotmig_connector_rest::config::DEFAULT_REQUEST_TIMEOUT_SECS;
use iotmig_connector_rest::service_account::expand_home;
use iotmig_engine::{ColumnMapping, MigrationConfig, DEFAULT_PAGE_SIZE, TOTAL_WORKERS};

use crate::error::{CliError, CliResult};
use crate::interactive::Prompter;

/// Arguments of `iotmig migrate`.
#[derive(Args, Debug, Clone, Default)]
pub struct MigrateArgs {
    /// Path to the ClearBlade service account JSON file (required)
    #[arg(long, value_name = "PATH")]
    pub cb_service_account: Option<String>,

    /// Source registry name (required)
    #[arg(long, value_name = "NAME")]
    pub cb_registry_name: Option<String>,

    /// Source registry region (required)
    #[arg(long, value_name = "REGION")]
    pub cb_registry_region: Option<String>,

    /// IoT Enterprise URL devices are migrated to (required)
    #[arg(long, value_name = "URL")]
    pub cb_enterprise_url: Option<String>,

    /// IoT Enterprise messaging URL (accepted for compatibility, unused over HTTP)
    #[arg(long, value_name = "URL")]
    pub cb_enterprise_msg_url: Option<String>,

    /// System key of the target IoT Enterprise system (required)
    #[arg(long, value_name = "KEY")]
    pub cb_system_key: Option<String>,

    /// System secret of the target system (accepted for compatibility, unused over HTTP)
    #[arg(long, value_name = "SECRET")]
    pub cb_system_secret: Option<String>,

    /// Developer e-mail used to authenticate with the target system (required)
    #[arg(long, value_name = "EMAIL")]
    pub cb_dev_email: Option<String>,

    /// Developer password used to authenticate with the target system (required)
    #[arg(long, value_name = "PASSWORD")]
    pub cb_dev_pwd: Option<String>,

    /// CSV of device ids to migrate; all devices are migrated when omitted
    #[arg(long, value_name = "PATH")]
    pub devices_csv: Option<String>,

    /// CSV mapping source fields to extra destination columns
    #[arg(long, value_name = "PATH")]
    pub column_map_csv: Option<String>,

    /// Device type assigned to every migrated device
    #[arg(long, value_name = "TYPE")]
    pub device_type: Option<String>,

    /// Page size for registry listings [default: 100]
    #[arg(long, value_name = "N")]
    pub page_size: Option<usize>,

    /// Replace existing keys of migrated devices [default: true]
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub update_public_keys: Option<bool>,

    /// Create a role with topic permissions for every device [default: false]
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub create_device_role: Option<bool>,

    /// Never prompt; fail on missing required values
    #[arg(long)]
    pub silent_mode: bool,

    /// Number of concurrent workers [default: 10]
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Per-request timeout in seconds [default: 30]
    #[arg(long, value_name = "SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Directory the failed devices report is written to [default: .]
    #[arg(long, value_name = "DIR")]
    pub report_dir: Option<String>,

    /// Exit with code 5 when any device failed
    #[arg(long)]
    pub fail_on_errors: bool,
}

impl MigrateArgs {
    /// Fill unset arguments from the process environment.
    pub fn with_env(self) -> CliResult<Self> {
        self.with_reader(|key| std::env::var(key))
    }

    /// Fill unset arguments from a custom variable reader.
    ///
    /// This allows tests to supply variables without mutating process-global
    /// environment state.
    pub fn with_reader<F>(mut self, reader: F) -> CliResult<Self>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        fill(&mut self.cb_service_account, &reader, "IOTMIG_CB_SERVICE_ACCOUNT");
        fill(&mut self.cb_registry_name, &reader, "IOTMIG_CB_REGISTRY_NAME");
        fill(&mut self.cb_registry_region, &reader, "IOTMIG_CB_REGISTRY_REGION");
        fill(&mut self.cb_enterprise_url, &reader, "IOTMIG_CB_ENTERPRISE_URL");
        fill(&mut self.cb_enterprise_msg_url, &reader, "IOTMIG_CB_ENTERPRISE_MSG_URL");
        fill(&mut self.cb_system_key, &reader, "IOTMIG_CB_SYSTEM_KEY");
        fill(&mut self.cb_system_secret, &reader, "IOTMIG_CB_SYSTEM_SECRET");
        fill(&mut self.cb_dev_email, &reader, "IOTMIG_CB_DEV_EMAIL");
        fill(&mut self.cb_dev_pwd, &reader, "IOTMIG_CB_DEV_PWD");
        fill(&mut self.devices_csv, &reader, "IOTMIG_DEVICES_CSV");
        fill(&mut self.column_map_csv, &reader, "IOTMIG_COLUMN_MAP_CSV");
        fill(&mut self.device_type, &reader, "IOTMIG_DEVICE_TYPE");
        fill(&mut self.report_dir, &reader, "IOTMIG_REPORT_DIR");

        if self.page_size.is_none() {
            self.page_size = parse_var(&reader, "IOTMIG_PAGE_SIZE")?;
        }
        if self.workers.is_none() {
            self.workers = parse_var(&reader, "IOTMIG_WORKERS")?;
        }
        if self.request_timeout_secs.is_none() {
            self.request_timeout_secs = parse_var(&reader, "IOTMIG_REQUEST_TIMEOUT_SECS")?;
        }
        if self.update_public_keys.is_none() {
            self.update_public_keys = bool_var(&reader, "IOTMIG_UPDATE_PUBLIC_KEYS")?;
        }
        if self.create_device_role.is_none() {
            self.create_device_role = bool_var(&reader, "IOTMIG_CREATE_DEVICE_ROLE")?;
        }
        if !self.silent_mode {
            self.silent_mode = bool_var(&reader, "IOTMIG_SILENT_MODE")?.unwrap_or(false);
        }
        if !self.fail_on_errors {
            self.fail_on_errors = bool_var(&reader, "IOTMIG_FAIL_ON_ERRORS")?.unwrap_or(false);
        }

        Ok(self)
    }

    /// Validate the arguments and ask for whatever is still missing.
    pub fn resolve(self, prompter: &dyn Prompter) -> CliResult<MigrateSettings> {
        let resolver = Resolver {
            prompter,
            interactive: !self.silent_mode && prompter.is_interactive(),
        };

        let page_size = positive(self.page_size.unwrap_or(DEFAULT_PAGE_SIZE), "page-size")?;
        let workers = positive(self.workers.unwrap_or(TOTAL_WORKERS), "workers")?;
        let request_timeout_secs = self
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            return Err(CliError::Validation(
                "--request-timeout-secs must be at least 1".to_string(),
            ));
        }

        let service_account = resolver.required(
            self.cb_service_account,
            "cb-service-account",
            "Enter path to ClearBlade service account file",
        )?;
        let service_account = existing_file(&service_account, "service account")?;

        let registry_name = resolver.required(
            self.cb_registry_name,
            "cb-registry-name",
            "Enter ClearBlade Registry Name",
        )?;
        let registry_region = resolver.required(
            self.cb_registry_region,
            "cb-registry-region",
            "Enter ClearBlade Registry Region",
        )?;

        let devices_csv = resolver
            .optional(
                self.devices_csv,
                "Enter Devices CSV file path (all registry devices are migrated by default, press enter to skip)",
            )?
            .map(|path| existing_file(&path, "devices CSV"))
            .transpose()?;

        let enterprise_url = resolver.required(
            self.cb_enterprise_url,
            "cb-enterprise-url",
            "Enter the URL of the IoT Enterprise instance the devices will be migrated to",
        )?;
        let system_key = resolver.required(
            self.cb_system_key,
            "cb-system-key",
            "Enter the system key of the IoT Enterprise system the devices will be migrated to",
        )?;
        let dev_email = resolver.required(
            self.cb_dev_email,
            "cb-dev-email",
            "Enter the developer email address used to authenticate with the target system",
        )?;
        let dev_password = resolver.secret(
            self.cb_dev_pwd,
            "cb-dev-pwd",
            "Enter the developer password used to authenticate with the target system",
        )?;

        let column_map_csv = resolver
            .optional(
                self.column_map_csv,
                "Enter the path to a CSV file containing column mappings (press enter to skip)",
            )?
            .map(|path| existing_file(&path, "column map CSV"))
            .transpose()?;
        let device_type = resolver
            .optional(
                self.device_type,
                "Enter the device type to assign to each migrated device (press enter to skip)",
            )?
            .unwrap_or_default();

        let report_dir = self
            .report_dir
            .map(|dir| expand_home(Path::new(&dir)))
            .unwrap_or_else(|| PathBuf::from("."));
        if !report_dir.is_dir() {
            return Err(CliError::Validation(format!(
                "report directory {} does not exist",
                report_dir.display()
            )));
        }

        Ok(MigrateSettings {
            service_account,
            registry_name,
            registry_region,
            enterprise_url,
            system_key,
            dev_email,
            dev_password,
            devices_csv,
            column_map_csv,
            device_type,
            page_size,
            update_public_keys: self.update_public_keys.unwrap_or(true),
            create_device_role: self.create_device_role.unwrap_or(false),
            workers,
            request_timeout_secs,
            report_dir,
            fail_on_errors: self.fail_on_errors,
        })
    }
}

/// Settings of one migration run, complete and validated.
#[derive(Clone)]
pub struct MigrateSettings {
    pub service_account: PathBuf,
    pub registry_name: String,
    pub registry_region: String,
    pub enterprise_url: String,
    pub system_key: String,
    pub dev_email: String,
    pub dev_password: String,
    pub devices_csv: Option<PathBuf>,
    pub column_map_csv: Option<PathBuf>,
    pub device_type: String,
    pub page_size: usize,
    pub update_public_keys: bool,
    pub create_device_role: bool,
    pub workers: usize,
    pub request_timeout_secs: u64,
    pub report_dir: PathBuf,
    pub fail_on_errors: bool,
}

impl MigrateSettings {
    /// Engine configuration for these settings.
    pub fn migration_config(&self, column_mapping: Option<ColumnMapping>) -> MigrationConfig {
        let config = MigrationConfig::new(&self.system_key)
            .with_device_type(&self.device_type)
            .with_update_public_keys(self.update_public_keys)
            .with_create_device_role(self.create_device_role)
            .with_workers(self.workers)
            .with_page_size(self.page_size);
        match column_mapping {
            Some(mapping) => config.with_column_mapping(mapping),
            None => config,
        }
    }
}

impl fmt::Debug for MigrateSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrateSettings")
            .field("service_account", &self.service_account)
            .field("registry_name", &self.registry_name)
            .field("registry_region", &self.registry_region)
            .field("enterprise_url", &self.enterprise_url)
            .field("system_key", &self.system_key)
            .field("dev_email", &self.dev_email)
            .field("dev_password", &"[REDACTED]")
            .field("devices_csv", &self.devices_csv)
            .field("column_map_csv", &self.column_map_csv)
            .field("device_type", &self.device_type)
            .field("page_size", &self.page_size)
            .field("update_public_keys", &self.update_public_keys)
            .field("create_device_role", &self.create_device_role)
            .field("workers", &self.workers)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("report_dir", &self.report_dir)
            .field("fail_on_errors", &self.fail_on_errors)
            .finish()
    }
}

struct Resolver<'a> {
    prompter: &'a dyn Prompter,
    interactive: bool,
}

impl Resolver<'_> {
    fn required(&self, value: Option<String>, flag: &str, prompt: &str) -> CliResult<String> {
        match present(value) {
            Some(value) => Ok(value),
            None if self.interactive => self.prompter.required(prompt),
            None => Err(missing(flag)),
        }
    }

    fn secret(&self, value: Option<String>, flag: &str, prompt: &str) -> CliResult<String> {
        match present(value) {
            Some(value) => Ok(value),
            None if self.interactive => {
                let value = self.prompter.secret(prompt)?;
                if value.is_empty() {
                    return Err(missing(flag));
                }
                Ok(value)
            }
            None => Err(missing(flag)),
        }
    }

    fn optional(&self, value: Option<String>, prompt: &str) -> CliResult<Option<String>> {
        match present(value) {
            Some(value) => Ok(Some(value)),
            None if self.interactive => self.prompter.optional(prompt),
            None => Ok(None),
        }
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn missing(flag: &str) -> CliError {
    let var = format!("IOTMIG_{}", flag.replace('-', "_").to_uppercase());
    CliError::Validation(format!("--{flag} is required (or set {var})"))
}

fn positive(value: usize, flag: &str) -> CliResult<usize> {
    if value == 0 {
        return Err(CliError::Validation(format!("--{flag} must be at least 1")));
    }
    Ok(value)
}

fn existing_file(path: &str, what: &str) -> CliResult<PathBuf> {
    let path = expand_home(Path::new(path));
    if !path.is_file() {
        return Err(CliError::Validation(format!(
            "could not locate {what} file {}, please make sure the path is correct",
            path.display()
        )));
    }
    Ok(path)
}

fn fill<F>(slot: &mut Option<String>, reader: &F, key: &str)
where
    F: Fn(&str) -> Result<String, VarError>,
{
    if slot.is_none() {
        *slot = reader(key).ok().and_then(|v| present(Some(v)));
    }
}

fn parse_var<T, F>(reader: &F, key: &str) -> CliResult<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Result<String, VarError>,
{
    match reader(key).ok().and_then(|v| present(Some(v))) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| CliError::Validation(format!("invalid value for {key}: {e}"))),
    }
}

fn bool_var<F>(reader: &F, key: &str) -> CliResult<Option<bool>>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    match reader(key).ok().and_then(|v| present(Some(v))) {
        None => Ok(None),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(Some(true)),
            "0" | "false" | "no" => Ok(Some(false)),
            _ => Err(CliError::Validation(format!(
                "invalid value for {key}: expected true or false, got '{raw}'"
            ))),
        },
    }
}
