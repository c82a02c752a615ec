//! Device and credential types
//!
//! Source records use the IoT Core resource shape. Destination records are
//! free-form field maps, since the column mapping decides their extra fields.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A device as returned by the source registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceDevice {
    /// User-assigned device identifier, unique within the registry.
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    /// Registry-assigned numeric identifier (serialized as a string).
    #[serde(deserialize_with = "null_as_default")]
    pub num_id: String,
    /// Full resource name.
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    /// When true the device may not connect.
    #[serde(deserialize_with = "null_as_default")]
    pub blocked: bool,
    /// Public-key credentials, in registry order.
    #[serde(deserialize_with = "null_as_default")]
    pub credentials: Vec<DeviceCredential>,
    /// Free-form key/value metadata.
    #[serde(deserialize_with = "null_as_default")]
    pub metadata: BTreeMap<String, String>,
    #[serde(deserialize_with = "null_as_default")]
    pub log_level: String,
    #[serde(deserialize_with = "empty_as_none")]
    pub last_heartbeat_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "empty_as_none")]
    pub last_event_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "empty_as_none")]
    pub last_state_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "empty_as_none")]
    pub last_config_ack_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "empty_as_none")]
    pub last_config_send_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "empty_as_none")]
    pub last_error_time: Option<DateTime<Utc>>,
}

impl SourceDevice {
    /// Create a device with only an id set.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Builder: append a credential.
    #[must_use]
    pub fn with_credential(mut self, credential: DeviceCredential) -> Self {
        self.credentials.push(credential);
        self
    }

    /// Builder: set the blocked flag.
    #[must_use]
    pub fn with_blocked(mut self, blocked: bool) -> Self {
        self.blocked = blocked;
        self
    }

    /// Builder: add one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A public key bound to a source device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceCredential {
    #[serde(deserialize_with = "null_as_default")]
    pub public_key: PublicKeyCredential,
    /// Expiration; the epoch-zero timestamp means "never".
    #[serde(deserialize_with = "empty_as_none")]
    pub expiration_time: Option<DateTime<Utc>>,
}

impl DeviceCredential {
    /// Create a credential without expiration.
    pub fn new(format: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            public_key: PublicKeyCredential {
                format: format.into(),
                key: key.into(),
            },
            expiration_time: None,
        }
    }

    /// Builder: set the expiration time.
    #[must_use]
    pub fn with_expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration_time = Some(expiration);
        self
    }

    /// Expiration rendered for the destination: empty when unset or epoch zero.
    pub fn normalized_expiration(&self) -> String {
        format_timestamp(self.expiration_time)
    }
}

/// Key material with its source-side format name.
///
/// The format is kept as the raw registry string so an unrecognised value
/// survives deserialization and can be reported by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicKeyCredential {
    #[serde(deserialize_with = "null_as_default")]
    pub format: String,
    #[serde(deserialize_with = "null_as_default")]
    pub key: String,
}

/// Render a timestamp for the destination.
///
/// `None` and the Unix epoch both mean "no value" and render as `""`.
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(t) if t.timestamp() != 0 || t.timestamp_subsec_nanos() != 0 => {
            t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
        }
        _ => String::new(),
    }
}

/// Read `null` as the type's default. Nil slices and maps arrive as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}

/// Supported public-key formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFormat {
    RsaPem,
    RsaX509Pem,
    Es256Pem,
    Es256X509Pem,
}

impl KeyFormat {
    /// Get all supported key formats.
    #[must_use]
    pub fn all() -> &'static [KeyFormat] {
        &[
            KeyFormat::RsaPem,
            KeyFormat::RsaX509Pem,
            KeyFormat::Es256Pem,
            KeyFormat::Es256X509Pem,
        ]
    }

    /// Name used by the source registry.
    #[must_use]
    pub fn as_source_str(&self) -> &'static str {
        match self {
            KeyFormat::RsaPem => "RSA_PEM",
            KeyFormat::RsaX509Pem => "RSA_X509_PEM",
            KeyFormat::Es256Pem => "ES256_PEM",
            KeyFormat::Es256X509Pem => "ES256_X509_PEM",
        }
    }

    /// Numeric key-format code understood by the destination platform.
    #[must_use]
    pub fn destination_code(&self) -> u8 {
        match self {
            KeyFormat::RsaPem => 0,
            KeyFormat::RsaX509Pem => 1,
            KeyFormat::Es256Pem => 2,
            KeyFormat::Es256X509Pem => 3,
        }
    }
}

impl fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_source_str())
    }
}

impl FromStr for KeyFormat {
    type Err = ParseKeyFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RSA_PEM" => Ok(KeyFormat::RsaPem),
            "RSA_X509_PEM" => Ok(KeyFormat::RsaX509Pem),
            "ES256_PEM" => Ok(KeyFormat::Es256Pem),
            "ES256_X509_PEM" => Ok(KeyFormat::Es256X509Pem),
            _ => Err(ParseKeyFormatError(s.to_string())),
        }
    }
}

// Sent as the destination's numeric code.
impl Serialize for KeyFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.destination_code())
    }
}

/// Error parsing a key format from its source name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKeyFormatError(pub String);

impl fmt::Display for ParseKeyFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unsupported key format '{}', expected one of: RSA_PEM, RSA_X509_PEM, ES256_PEM, ES256_X509_PEM",
            self.0
        )
    }
}

impl std::error::Error for ParseKeyFormatError {}

/// Permission granted on a role topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicPermission {
    /// Subscribe.
    Read,
    /// Publish.
    Create,
}

impl TopicPermission {
    #[must_use]
    pub fn code(&self) -> u8 {
        match self {
            TopicPermission::Read => 1,
            TopicPermission::Create => 2,
        }
    }
}

/// Destination device representation: field name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationDevice(Map<String, Value>);

impl DestinationDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Device name; the path segment used by destination calls.
    pub fn name(&self) -> &str {
        self.0.get("name").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// A credential to create on the destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCredential {
    pub public_key: String,
    pub key_format: KeyFormat,
    /// RFC 3339 expiration, or empty for none.
    pub expire_time: String,
}

/// One page of a paginated device listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DevicePage {
    #[serde(deserialize_with = "null_as_default")]
    pub devices: Vec<SourceDevice>,
    pub next_page_token: Option<String>,
}

impl DevicePage {
    /// True when another page should be requested.
    pub fn has_more(&self) -> bool {
        self.next_page_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }
}
