//! Column mapping
//!
//! Copies extra source fields onto the destination device. Source fields are
//! an explicit enumeration, so an unknown name is rejected while the mapping
//! is built, long before any device is touched.

use serde_json::Value;
use std::fmt;
use std::io::Read;
use std::path::Path;

use iotmig_connector::types::{format_timestamp, SourceDevice};

use crate::error::{MigrationError, MigrationResult};

/// Destination fields every migrated device carries. Mappings may not target them.
pub const FIXED_FIELDS: [&str; 5] = [
    "name",
    "enabled",
    "type",
    "allow_key_auth",
    "allow_certificate_auth",
];

/// A readable field of [`SourceDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceField {
    Id,
    NumId,
    Name,
    Blocked,
    LogLevel,
    LastHeartbeatTime,
    LastEventTime,
    LastStateTime,
    LastConfigAckTime,
    LastConfigSendTime,
    LastErrorTime,
    /// The whole metadata map, as a JSON object.
    Metadata,
    /// One metadata entry. Absent keys read as the empty string.
    MetadataKey(String),
}

impl SourceField {
    /// Resolve a field name, ignoring case.
    ///
    /// Both `LastHeartbeatTime` and `lastHeartbeatTime` spellings are
    /// accepted; `Metadata.<key>` selects a single metadata entry.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Some((prefix, key)) = name.split_once('.') {
            return (prefix.eq_ignore_ascii_case("metadata") && !key.is_empty())
                .then(|| SourceField::MetadataKey(key.to_string()));
        }

        let field = match name.to_ascii_lowercase().as_str() {
            "id" => SourceField::Id,
            "numid" => SourceField::NumId,
            "name" => SourceField::Name,
            "blocked" => SourceField::Blocked,
            "loglevel" => SourceField::LogLevel,
            "lastheartbeattime" => SourceField::LastHeartbeatTime,
            "lasteventtime" => SourceField::LastEventTime,
            "laststatetime" => SourceField::LastStateTime,
            "lastconfigacktime" => SourceField::LastConfigAckTime,
            "lastconfigsendtime" => SourceField::LastConfigSendTime,
            "lasterrortime" => SourceField::LastErrorTime,
            "metadata" => SourceField::Metadata,
            _ => return None,
        };
        Some(field)
    }

    /// Read this field from a device.
    pub fn extract(&self, device: &SourceDevice) -> Value {
        match self {
            SourceField::Id => Value::from(device.id.as_str()),
            SourceField::NumId => Value::from(device.num_id.as_str()),
            SourceField::Name => Value::from(device.name.as_str()),
            SourceField::Blocked => Value::Bool(device.blocked),
            SourceField::LogLevel => Value::from(device.log_level.as_str()),
            SourceField::LastHeartbeatTime => format_timestamp(device.last_heartbeat_time).into(),
            SourceField::LastEventTime => format_timestamp(device.last_event_time).into(),
            SourceField::LastStateTime => format_timestamp(device.last_state_time).into(),
            SourceField::LastConfigAckTime => format_timestamp(device.last_config_ack_time).into(),
            SourceField::LastConfigSendTime => {
                format_timestamp(device.last_config_send_time).into()
            }
            SourceField::LastErrorTime => format_timestamp(device.last_error_time).into(),
            SourceField::Metadata => Value::Object(
                device
                    .metadata
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                    .collect(),
            ),
            SourceField::MetadataKey(key) => Value::from(
                device.metadata.get(key).map(String::as_str).unwrap_or_default(),
            ),
        }
    }
}

impl fmt::Display for SourceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceField::MetadataKey(key) => write!(f, "Metadata.{key}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// One `source -> destination` copy rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRule {
    pub source: SourceField,
    pub destination: String,
}

/// Validated set of column rules, applied in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    rules: Vec<ColumnRule>,
}

impl ColumnMapping {
    /// Build from `(source, destination)` rows. Row numbers in errors are 1-based.
    pub fn from_rows<I, S, D>(rows: I) -> MigrationResult<Self>
    where
        I: IntoIterator<Item = (S, D)>,
        S: AsRef<str>,
        D: AsRef<str>,
    {
        let mut rules = Vec::new();
        for (index, (source, destination)) in rows.into_iter().enumerate() {
            rules.push(parse_rule(index + 1, source.as_ref(), destination.as_ref())?);
        }
        Ok(Self { rules })
    }

    /// Read a headerless two-column CSV.
    pub fn from_csv_reader<R: Read>(reader: R) -> MigrationResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rules = Vec::new();
        for (index, record) in csv_reader.records().enumerate() {
            let record = record.map_err(|e| MigrationError::InvalidColumnMapping {
                line: index + 1,
                message: e.to_string(),
            })?;
            let line = record
                .position()
                .map_or(index + 1, |pos| pos.line() as usize);

            if record.iter().all(str::is_empty) {
                continue;
            }
            if record.len() < 2 {
                return Err(MigrationError::InvalidColumnMapping {
                    line,
                    message: "expected two columns: source field, destination field".to_string(),
                });
            }
            rules.push(parse_rule(line, &record[0], &record[1])?);
        }

        Ok(Self { rules })
    }

    /// Read a column map file.
    pub fn from_csv_path(path: impl AsRef<Path>) -> MigrationResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| MigrationError::ColumnMapFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_csv_reader(file)
    }

    pub fn rules(&self) -> &[ColumnRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn parse_rule(line: usize, source: &str, destination: &str) -> MigrationResult<ColumnRule> {
    let field = SourceField::parse(source).ok_or_else(|| MigrationError::UnknownSourceField {
        field: source.trim().to_string(),
        line,
    })?;

    let destination = destination.trim();
    if destination.is_empty() {
        return Err(MigrationError::InvalidColumnMapping {
            line,
            message: "destination field is empty".to_string(),
        });
    }
    if FIXED_FIELDS.contains(&destination) {
        return Err(MigrationError::InvalidColumnMapping {
            line,
            message: format!("destination field '{destination}' is set by the migration"),
        });
    }

    Ok(ColumnRule {
        source: field,
        destination: destination.to_string(),
    })
}
