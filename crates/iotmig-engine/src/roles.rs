//! Per-device role provisioning.
//!
//! Each device gets a role named after its id, granting subscribe access to
//! its command, config and error topics and publish access to its event and
//! state topics. Every step tolerates an earlier run having done it already.

use serde_json::Value;
use tracing::debug;

use iotmig_connector::types::TopicPermission;

use crate::context::MigrationContext;
use crate::outcome::{contexts, ErrorLog};

/// Placeholder replaced by the device id in topic patterns.
pub const TOPIC_TOKEN: &str = "{device_id}";

/// Topics the device may subscribe to.
pub const SUBSCRIBE_TOPICS: [&str; 3] = [
    "/devices/{device_id}/commands/#",
    "/devices/{device_id}/config",
    "/devices/{device_id}/errors",
];

/// Topics the device may publish to.
pub const PUBLISH_TOPICS: [&str; 2] = ["/devices/{device_id}/events/#", "/devices/{device_id}/state"];

/// Concrete topic bindings for a device, subscribe topics first.
pub fn topic_bindings(device_id: &str) -> Vec<(String, TopicPermission)> {
    let subscribe = SUBSCRIBE_TOPICS
        .iter()
        .map(|t| (t.replace(TOPIC_TOKEN, device_id), TopicPermission::Read));
    let publish = PUBLISH_TOPICS
        .iter()
        .map(|t| (t.replace(TOPIC_TOKEN, device_id), TopicPermission::Create));
    subscribe.chain(publish).collect()
}

/// Read a role's id, accepting both `role_id` and `ID`.
pub fn role_id(role: &Value) -> Option<String> {
    ["role_id", "ID"].iter().find_map(|key| match role.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Create (or fetch) the device's role, bind its topics and add the device.
pub async fn provision_role(ctx: &MigrationContext, device_id: &str) -> Result<(), ErrorLog> {
    let system_key = ctx.system_key();

    let role = match ctx.platform.create_role(system_key, device_id).await {
        Ok(role) => role,
        Err(e) if e.is_conflict() => {
            debug!(device_id = %device_id, "Role exists, fetching");
            ctx.platform
                .get_role(system_key, device_id)
                .await
                .map_err(|e| ErrorLog::new(device_id, contexts::GET_ROLE, e))?
        }
        Err(e) => return Err(ErrorLog::new(device_id, contexts::CREATE_ROLE, e)),
    };

    let role_id = role_id(&role).ok_or_else(|| {
        ErrorLog::new(
            device_id,
            contexts::RESOLVE_ROLE_ID,
            format!("role response has no role_id or ID: {role}"),
        )
    })?;

    for (topic, permission) in topic_bindings(device_id) {
        ctx.platform
            .add_topic_to_role(system_key, &role_id, &topic, permission)
            .await
            .map_err(|e| ErrorLog::new(device_id, contexts::ADD_TOPIC, e))?;
    }

    match ctx
        .platform
        .add_device_to_role(system_key, device_id, device_id)
        .await
    {
        Ok(()) => {}
        Err(e) if e.is_conflict() => {
            debug!(device_id = %device_id, "Device already in role");
        }
        Err(e) => return Err(ErrorLog::new(device_id, contexts::ADD_DEVICE_TO_ROLE, e)),
    }

    debug!(device_id = %device_id, role_id = %role_id, "Role provisioned");
    Ok(())
}
