//! Source to destination device transform.

use iotmig_connector::types::{DestinationDevice, SourceDevice};

use crate::mapping::ColumnMapping;

/// Build the destination representation of a source device.
///
/// Migrated devices authenticate by certificate only. Pure: the same inputs
/// always produce an equal result.
pub fn transform(
    device: &SourceDevice,
    device_type: &str,
    mapping: Option<&ColumnMapping>,
) -> DestinationDevice {
    let mut out = DestinationDevice::new();
    out.insert("name", device.id.as_str());
    out.insert("enabled", !device.blocked);
    out.insert("type", device_type);
    out.insert("allow_key_auth", false);
    out.insert("allow_certificate_auth", true);

    if let Some(mapping) = mapping {
        for rule in mapping.rules() {
            out.insert(rule.destination.as_str(), rule.source.extract(device));
        }
    }

    out
}
