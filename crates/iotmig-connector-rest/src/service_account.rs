//! Source registry service account.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use iotmig_connector::error::{ConnectorError, ConnectorResult};

/// Contents of a service account JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccount {
    pub system_key: String,
    pub token: String,
    pub url: String,
    pub project: String,
}

impl ServiceAccount {
    /// Load a service account from disk. A leading `~/` is expanded.
    pub fn from_file(path: impl AsRef<Path>) -> ConnectorResult<Self> {
        let path = expand_home(path.as_ref());
        if !path.is_file() {
            return Err(ConnectorError::invalid_configuration(format!(
                "unable to locate service account file: {}",
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            ConnectorError::invalid_configuration(format!(
                "unable to read service account file {}: {e}",
                path.display()
            ))
        })?;

        let account: ServiceAccount = serde_json::from_str(&contents).map_err(|e| {
            ConnectorError::invalid_configuration(format!(
                "invalid service account file {}: {e}",
                path.display()
            ))
        })?;

        if account.url.is_empty() || account.system_key.is_empty() {
            return Err(ConnectorError::invalid_configuration(
                "service account file is missing url or systemKey",
            ));
        }

        Ok(account)
    }

    /// Resource path of a registry in this account's project.
    pub fn registry_path(&self, region: &str, registry: &str) -> String {
        format!(
            "projects/{}/locations/{}/registries/{}",
            self.project, region, registry
        )
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
