//! Hand-written recording fakes of the migration collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use iotmig_connector::error::{ConnectorError, ConnectorResult};
use iotmig_connector::traits::{DestinationPlatform, SourceRegistry};
use iotmig_connector::types::{
    DestinationDevice, DevicePage, NewCredential, SourceDevice, TopicPermission,
};
use iotmig_engine::{MigrationConfig, MigrationContext};

// =============================================================================
// Fake Destination Platform
// =============================================================================

/// Destination operations, for recording and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    CreateDevice,
    UpdateDevice,
    DeleteCredentials,
    CreateCredential,
    CreateRole,
    GetRole,
    AddTopic,
    AddDeviceToRole,
}

/// How an injected failure is reported.
#[derive(Debug, Clone)]
pub enum Failure {
    Conflict(&'static str),
    Other(&'static str),
}

impl Failure {
    fn to_error(&self) -> ConnectorError {
        match self {
            Failure::Conflict(msg) => ConnectorError::already_exists(*msg),
            Failure::Other(msg) => ConnectorError::http(500, *msg),
        }
    }
}

/// One recorded destination call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateDevice(String),
    UpdateDevice(DestinationDevice),
    DeleteCredentials(String),
    CreateCredential(String, NewCredential),
    CreateRole(String),
    GetRole(String),
    AddTopic {
        role_id: String,
        topic: String,
        permission: TopicPermission,
    },
    AddDeviceToRole {
        device: String,
        role: String,
    },
}

impl Call {
    pub fn op(&self) -> Op {
        match self {
            Call::CreateDevice(_) => Op::CreateDevice,
            Call::UpdateDevice(_) => Op::UpdateDevice,
            Call::DeleteCredentials(_) => Op::DeleteCredentials,
            Call::CreateCredential(..) => Op::CreateCredential,
            Call::CreateRole(_) => Op::CreateRole,
            Call::GetRole(_) => Op::GetRole,
            Call::AddTopic { .. } => Op::AddTopic,
            Call::AddDeviceToRole { .. } => Op::AddDeviceToRole,
        }
    }
}

/// Recording destination with injectable failures and concurrency tracking.
#[derive(Default)]
pub struct FakePlatform {
    calls: Mutex<Vec<Call>>,
    // (op, device id or "*") -> failure
    failures: Mutex<HashMap<(Op, String), Failure>>,
    role_body: Mutex<Option<Value>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `op` for every device.
    pub fn fail(self, op: Op, failure: Failure) -> Self {
        self.fail_device(op, "*", failure)
    }

    /// Fail `op` for one device.
    pub fn fail_device(self, op: Op, device_id: &str, failure: Failure) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert((op, device_id.to_string()), failure);
        self
    }

    /// Body returned by create_role and get_role instead of the default.
    pub fn with_role_body(self, body: Value) -> Self {
        *self.role_body.lock().unwrap() = Some(body);
        self
    }

    /// Sleep inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, op: Op) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.op() == op).collect()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls_for(op).len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn record(&self, device_id: &str, call: Call) -> ConnectorResult<()> {
        let op = call.op();
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.calls.lock().unwrap().push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failure = {
            let failures = self.failures.lock().unwrap();
            failures
                .get(&(op, device_id.to_string()))
                .or_else(|| failures.get(&(op, "*".to_string())))
                .cloned()
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match failure {
            Some(f) => Err(f.to_error()),
            None => Ok(()),
        }
    }

    fn role(&self, default: Value) -> Value {
        self.role_body.lock().unwrap().clone().unwrap_or(default)
    }
}

#[async_trait]
impl DestinationPlatform for FakePlatform {
    async fn create_device(
        &self,
        _system_key: &str,
        device: &DestinationDevice,
    ) -> ConnectorResult<()> {
        self.record(device.name(), Call::CreateDevice(device.name().to_string()))
            .await
    }

    async fn update_device(
        &self,
        _system_key: &str,
        device: &DestinationDevice,
    ) -> ConnectorResult<()> {
        self.record(device.name(), Call::UpdateDevice(device.clone()))
            .await
    }

    async fn delete_credentials(&self, _system_key: &str, device_name: &str) -> ConnectorResult<()> {
        self.record(device_name, Call::DeleteCredentials(device_name.to_string()))
            .await
    }

    async fn create_credential(
        &self,
        _system_key: &str,
        device_name: &str,
        credential: &NewCredential,
    ) -> ConnectorResult<()> {
        self.record(
            device_name,
            Call::CreateCredential(device_name.to_string(), credential.clone()),
        )
        .await
    }

    async fn create_role(&self, _system_key: &str, role_name: &str) -> ConnectorResult<Value> {
        self.record(role_name, Call::CreateRole(role_name.to_string()))
            .await?;
        Ok(self.role(json!({ "role_id": format!("role-{role_name}") })))
    }

    async fn get_role(&self, _system_key: &str, role_name: &str) -> ConnectorResult<Value> {
        self.record(role_name, Call::GetRole(role_name.to_string()))
            .await?;
        Ok(self.role(json!({ "ID": format!("existing-{role_name}"), "Name": role_name })))
    }

    async fn add_topic_to_role(
        &self,
        _system_key: &str,
        role_id: &str,
        topic: &str,
        permission: TopicPermission,
    ) -> ConnectorResult<()> {
        // Topics embed the device id as their second path segment.
        let device_id = topic.split('/').nth(2).unwrap_or_default().to_string();
        self.record(
            &device_id,
            Call::AddTopic {
                role_id: role_id.to_string(),
                topic: topic.to_string(),
                permission,
            },
        )
        .await
    }

    async fn add_device_to_role(
        &self,
        _system_key: &str,
        device_name: &str,
        role_name: &str,
    ) -> ConnectorResult<()> {
        self.record(
            device_name,
            Call::AddDeviceToRole {
                device: device_name.to_string(),
                role: role_name.to_string(),
            },
        )
        .await
    }
}

// =============================================================================
// Fake Source Registry
// =============================================================================

/// Registry serving fixed pages, addressed by `page-<n>` tokens.
#[derive(Default)]
pub struct FakeRegistry {
    pages: Vec<Vec<SourceDevice>>,
    page_requests: Mutex<Vec<Option<String>>>,
    id_batches: Mutex<Vec<Vec<String>>>,
}

impl FakeRegistry {
    pub fn with_pages(pages: Vec<Vec<SourceDevice>>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    pub fn page_requests(&self) -> Vec<Option<String>> {
        self.page_requests.lock().unwrap().clone()
    }

    pub fn id_batches(&self) -> Vec<Vec<String>> {
        self.id_batches.lock().unwrap().clone()
    }

    fn all_devices(&self) -> impl Iterator<Item = &SourceDevice> {
        self.pages.iter().flatten()
    }
}

#[async_trait]
impl SourceRegistry for FakeRegistry {
    async fn device_count(&self) -> ConnectorResult<u64> {
        Ok(self.all_devices().count() as u64)
    }

    async fn list_devices(
        &self,
        _page_size: usize,
        page_token: Option<&str>,
    ) -> ConnectorResult<DevicePage> {
        self.page_requests
            .lock()
            .unwrap()
            .push(page_token.map(str::to_string));

        let index = match page_token {
            None => 0,
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| ConnectorError::invalid_data(format!("bad token {token}")))?,
        };

        let devices = self.pages.get(index).cloned().unwrap_or_default();
        let next_page_token = if index + 1 < self.pages.len() {
            Some(format!("page-{}", index + 1))
        } else {
            Some(String::new())
        };
        Ok(DevicePage {
            devices,
            next_page_token,
        })
    }

    async fn list_devices_by_ids(&self, ids: &[String]) -> ConnectorResult<Vec<SourceDevice>> {
        self.id_batches.lock().unwrap().push(ids.to_vec());
        Ok(self
            .all_devices()
            .filter(|d| ids.contains(&d.id))
            .cloned()
            .collect())
    }
}

// =============================================================================
// Helpers
// =============================================================================

pub fn context(config: MigrationConfig, platform: Arc<FakePlatform>) -> Arc<MigrationContext> {
    Arc::new(MigrationContext::new(config, platform))
}

pub fn config() -> MigrationConfig {
    MigrationConfig::new("sys-key").with_device_type("sensor")
}

pub fn devices(count: usize) -> Vec<SourceDevice> {
    (0..count)
        .map(|i| SourceDevice::new(format!("dev-{i}")))
        .collect()
}
