//! Destination platform client.
//!
//! Implements [`DestinationPlatform`] over the platform's admin REST API,
//! authenticated as a developer.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};
use url::Url;

use iotmig_connector::error::{ConnectorError, ConnectorResult};
use iotmig_connector::traits::DestinationPlatform;
use iotmig_connector::types::{DestinationDevice, NewCredential, TopicPermission};

use crate::config::RestConfig;
use crate::response;

const DEV_TOKEN_HEADER: &str = "ClearBlade-DevToken";

/// Text the platform returns when a device name is taken.
pub const DEVICE_EXISTS_MARKER: &str = "already exists in system";

/// Text the platform returns when a role name is taken.
pub const ROLE_EXISTS_MARKER: &str = "A role's name must be unique";

/// Text the platform returns when a device is already a member of a role.
pub const MEMBERSHIP_EXISTS_MARKER: &str = "duplicate key value violates unique constraint";

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    dev_token: String,
}

/// Authenticated developer client for the destination platform.
#[derive(Clone)]
pub struct PlatformClient {
    client: Client,
    config: RestConfig,
    token: String,
}

impl std::fmt::Debug for PlatformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformClient")
            .field("base_url", &self.config.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl PlatformClient {
    /// Log in as a developer and return an authenticated client.
    #[instrument(skip(config, password), fields(url = %config.base_url))]
    pub async fn authenticate(
        config: RestConfig,
        email: &str,
        password: &str,
    ) -> ConnectorResult<Self> {
        let client = config.build_client()?;
        let url = config.url("/admin/auth");
        let request = client
            .post(&url)
            .json(&json!({ "email": email, "password": password }));

        let resp = response::send(request, &url, config.request_timeout_secs).await?;
        let resp = response::check(resp, None)
            .await
            .map_err(|e| match e {
                ConnectorError::Http { message, .. } => {
                    ConnectorError::AuthenticationFailed { message }
                }
                other => other,
            })?;
        let auth: AuthResponse = response::json(resp).await?;

        if auth.dev_token.is_empty() {
            return Err(ConnectorError::AuthenticationFailed {
                message: "no developer token in auth response".to_string(),
            });
        }

        info!("Authenticated to destination platform");
        Ok(Self {
            client,
            config,
            token: auth.dev_token,
        })
    }

    /// Build a client from an existing developer token.
    pub fn with_token(config: RestConfig, token: impl Into<String>) -> ConnectorResult<Self> {
        Ok(Self {
            client: config.build_client()?,
            config,
            token: token.into(),
        })
    }

    /// Build a URL from path segments, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> ConnectorResult<Url> {
        let mut url = Url::parse(&self.config.base_url).map_err(|e| {
            ConnectorError::invalid_configuration(format!("invalid base URL: {e}"))
        })?;
        url.path_segments_mut()
            .map_err(|()| ConnectorError::invalid_configuration("base URL cannot have a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: &Url) -> RequestBuilder {
        self.client
            .request(method, url.clone())
            .header(DEV_TOKEN_HEADER, &self.token)
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        url: &Url,
        conflict_marker: Option<&str>,
    ) -> ConnectorResult<Response> {
        let resp = response::send(request, url.as_str(), self.config.request_timeout_secs).await?;
        response::check(resp, conflict_marker).await
    }
}

/// Read a role body. An empty body reads as an empty object.
async fn role_body(resp: Response) -> ConnectorResult<Value> {
    let text = resp.text().await.map_err(|e| {
        ConnectorError::connection_failed_with_source("failed to read response body", e)
    })?;
    if text.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    Ok(serde_json::from_str(&text)?)
}

#[async_trait]
impl DestinationPlatform for PlatformClient {
    #[instrument(skip(self, device), fields(device = %device.name()))]
    async fn create_device(
        &self,
        system_key: &str,
        device: &DestinationDevice,
    ) -> ConnectorResult<()> {
        let url = self.endpoint(&["admin", "devices", system_key, device.name()])?;
        let request = self.request(Method::POST, &url).json(device);
        self.execute(request, &url, Some(DEVICE_EXISTS_MARKER)).await?;
        debug!("Device created");
        Ok(())
    }

    #[instrument(skip(self, device), fields(device = %device.name()))]
    async fn update_device(
        &self,
        system_key: &str,
        device: &DestinationDevice,
    ) -> ConnectorResult<()> {
        let url = self.endpoint(&["admin", "devices", system_key, device.name()])?;
        let request = self.request(Method::PUT, &url).json(device);
        self.execute(request, &url, None).await?;
        debug!("Device updated");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_credentials(&self, system_key: &str, device_name: &str) -> ConnectorResult<()> {
        let url = self.endpoint(&["admin", system_key, "devices", "keys", device_name])?;
        let request = self.request(Method::DELETE, &url);
        self.execute(request, &url, None).await?;
        Ok(())
    }

    #[instrument(skip(self, credential), fields(key_format = %credential.key_format))]
    async fn create_credential(
        &self,
        system_key: &str,
        device_name: &str,
        credential: &NewCredential,
    ) -> ConnectorResult<()> {
        let url = self.endpoint(&["admin", system_key, "devices", "keys", device_name])?;
        let request = self.request(Method::POST, &url).json(credential);
        self.execute(request, &url, None).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_role(&self, system_key: &str, role_name: &str) -> ConnectorResult<Value> {
        let url = self.endpoint(&["admin", "user", system_key, "roles"])?;
        let request = self.request(Method::POST, &url).json(&json!({
            "name": role_name,
            "description": format!("Role for device {role_name}"),
        }));
        let resp = self.execute(request, &url, Some(ROLE_EXISTS_MARKER)).await?;
        role_body(resp).await
    }

    #[instrument(skip(self))]
    async fn get_role(&self, system_key: &str, role_name: &str) -> ConnectorResult<Value> {
        let url = self.endpoint(&["admin", "user", system_key, "roles", role_name])?;
        let request = self.request(Method::GET, &url);
        let resp = self.execute(request, &url, None).await?;
        role_body(resp).await
    }

    #[instrument(skip(self))]
    async fn add_topic_to_role(
        &self,
        system_key: &str,
        role_id: &str,
        topic: &str,
        permission: TopicPermission,
    ) -> ConnectorResult<()> {
        let url = self.endpoint(&["admin", "user", system_key, "roles"])?;
        let request = self.request(Method::PUT, &url).json(&json!({
            "id": role_id,
            "changes": {
                "topics": [{
                    "itemInfo": { "name": topic },
                    "permissions": permission.code(),
                }],
            },
        }));
        self.execute(request, &url, None).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_device_to_role(
        &self,
        system_key: &str,
        device_name: &str,
        role_name: &str,
    ) -> ConnectorResult<()> {
        let url = self.endpoint(&["admin", "devices", "roles", system_key, device_name])?;
        let request = self
            .request(Method::PUT, &url)
            .json(&json!({ "add": [role_name] }));
        self.execute(request, &url, Some(MEMBERSHIP_EXISTS_MARKER))
            .await?;
        Ok(())
    }
}
