//! IoT Core compatible source registry.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use iotmig_connector::error::{ConnectorError, ConnectorResult};
use iotmig_connector::traits::SourceRegistry;
use iotmig_connector::types::{DevicePage, SourceDevice};

use crate::config::RestConfig;
use crate::response;
use crate::service_account::ServiceAccount;

const USER_TOKEN_HEADER: &str = "ClearBlade-UserToken";

/// Credentials scoped to a single registry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryCredentials {
    #[serde(default)]
    system_key: String,
    #[serde(default)]
    service_account_token: String,
    #[serde(default)]
    url: String,
}

/// Client for one device registry.
pub struct IotCoreRegistry {
    client: Client,
    config: RestConfig,
    system_key: String,
    token: String,
    parent: String,
}

impl std::fmt::Debug for IotCoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IotCoreRegistry")
            .field("base_url", &self.config.base_url)
            .field("system_key", &self.system_key)
            .field("parent", &self.parent)
            .finish()
    }
}

impl IotCoreRegistry {
    /// Resolve the registry's own credentials and return a client for it.
    ///
    /// `config` supplies timeouts; its base URL is replaced by the account's.
    #[instrument(skip(account, config), fields(project = %account.project))]
    pub async fn connect(
        account: &ServiceAccount,
        registry: &str,
        region: &str,
        config: RestConfig,
    ) -> ConnectorResult<Self> {
        let account_config = config.with_base_url(&account.url);
        let client = account_config.build_client()?;

        let url = account_config.url(&format!(
            "/api/v/1/code/{}/getRegistryCredentials",
            account.system_key
        ));
        let request = client
            .post(&url)
            .header(USER_TOKEN_HEADER, &account.token)
            .json(&json!({
                "project": account.project,
                "region": region,
                "registry": registry,
            }));

        let resp = response::send(request, &url, account_config.request_timeout_secs).await?;
        let resp = response::check(resp, None).await?;
        let creds: RegistryCredentials = response::json(resp).await?;

        if creds.system_key.is_empty() {
            return Err(ConnectorError::invalid_configuration(format!(
                "unable to fetch credentials for registry '{registry}' in region '{region}', \
                 check --cb-registry-name and --cb-registry-region"
            )));
        }

        let registry_url = if creds.url.is_empty() {
            account.url.clone()
        } else {
            creds.url
        };
        let config = account_config.with_base_url(registry_url);
        let client = config.build_client()?;

        info!(registry = %registry, region = %region, "Connected to source registry");

        Ok(Self {
            client,
            config,
            system_key: creds.system_key,
            token: creds.service_account_token,
            parent: account.registry_path(region, registry),
        })
    }

    /// Registry resource path used as `parent` on listings.
    pub fn parent(&self) -> &str {
        &self.parent
    }

    fn devices_url(&self) -> String {
        self.config.url(&format!(
            "/api/v/4/webhook/execute/{}/cloudiot_devices",
            self.system_key
        ))
    }

    async fn get_page(&self, query: &[(&str, String)]) -> ConnectorResult<DevicePage> {
        let url = self.devices_url();
        let request = self
            .client
            .get(&url)
            .header(USER_TOKEN_HEADER, &self.token)
            .query(query);

        let resp = response::send(request, &url, self.config.request_timeout_secs).await?;
        let resp = response::check(resp, None).await?;
        response::json(resp).await
    }
}

#[async_trait]
impl SourceRegistry for IotCoreRegistry {
    #[instrument(skip(self))]
    async fn device_count(&self) -> ConnectorResult<u64> {
        let url = self.config.url(&format!(
            "/api/v/1/code/{}/getNumDevicesGateways",
            self.system_key
        ));
        let request = self.client.post(&url).header(USER_TOKEN_HEADER, &self.token);

        let resp = response::send(request, &url, self.config.request_timeout_secs).await?;
        let resp = response::check(resp, None).await?;
        let body: Value = response::json(resp).await?;

        let count = device_count_from(&body);
        debug!(count, "Fetched device count");
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn list_devices(
        &self,
        page_size: usize,
        page_token: Option<&str>,
    ) -> ConnectorResult<DevicePage> {
        let mut query = vec![
            ("parent", self.parent.clone()),
            ("pageSize", page_size.to_string()),
        ];
        if let Some(token) = page_token.filter(|t| !t.is_empty()) {
            query.push(("pageToken", token.to_string()));
        }

        let page = self.get_page(&query).await?;
        debug!(devices = page.devices.len(), more = page.has_more(), "Fetched device page");
        Ok(page)
    }

    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    async fn list_devices_by_ids(&self, ids: &[String]) -> ConnectorResult<Vec<SourceDevice>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = vec![
            ("parent", self.parent.clone()),
            ("pageSize", ids.len().to_string()),
        ];
        query.extend(ids.iter().map(|id| ("deviceIds", id.clone())));

        let page = self.get_page(&query).await?;
        Ok(page.devices)
    }
}

/// Read `counts.devices`, integral or floating. Missing or negative reads as 0.
fn device_count_from(body: &Value) -> u64 {
    match body.pointer("/counts/devices") {
        Some(count) => count
            .as_u64()
            .or_else(|| count.as_f64().filter(|n| *n >= 0.0).map(|n| n as u64))
            .unwrap_or(0),
        None => 0,
    }
}
