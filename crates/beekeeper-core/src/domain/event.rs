//! Metastore listener events.
//!
//! Only the fields the scheduler reads are modelled. Events arrive as JSON with
//! an `eventType` tag and camelCase fields:
//!
//! ```json
//! {
//!   "eventType": "ALTER_PARTITION",
//!   "dbName": "db",
//!   "tableName": "tbl",
//!   "tableParameters": { "beekeeper.remove.unreferenced.data": "true" },
//!   "oldPartitionLocation": "s3://bucket/tbl/v1/part=1",
//!   "partitionLocation": "s3://bucket/tbl/v2/part=1"
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of metastore change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    CreateTable,
    AlterTable,
    DropTable,
    AddPartition,
    AlterPartition,
    DropPartition,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::CreateTable => "CREATE_TABLE",
            EventType::AlterTable => "ALTER_TABLE",
            EventType::DropTable => "DROP_TABLE",
            EventType::AddPartition => "ADD_PARTITION",
            EventType::AlterPartition => "ALTER_PARTITION",
            EventType::DropPartition => "DROP_PARTITION",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type '{0}'")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    /// Accepts `ALTER_PARTITION` as well as `alter_partition`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE_TABLE" => Ok(EventType::CreateTable),
            "ALTER_TABLE" => Ok(EventType::AlterTable),
            "DROP_TABLE" => Ok(EventType::DropTable),
            "ADD_PARTITION" => Ok(EventType::AddPartition),
            "ALTER_PARTITION" => Ok(EventType::AlterPartition),
            "DROP_PARTITION" => Ok(EventType::DropPartition),
            _ => Err(UnknownEventType(s.to_string())),
        }
    }
}

/// Table coordinates shared by every event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTable {
    pub db_name: String,
    pub table_name: String,
    #[serde(default)]
    pub table_parameters: HashMap<String, String>,
    /// Current table location (the new one for ALTER_TABLE).
    #[serde(default)]
    pub table_location: Option<String>,
}

impl EventTable {
    pub fn new(db_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            table_name: table_name.into(),
            table_parameters: HashMap::new(),
            table_location: None,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.table_parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.table_location = Some(location.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlterTableEvent {
    #[serde(flatten)]
    pub table: EventTable,
    #[serde(default)]
    pub old_table_location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionEvent {
    #[serde(flatten)]
    pub table: EventTable,
    #[serde(default)]
    pub partition_location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlterPartitionEvent {
    #[serde(flatten)]
    pub table: EventTable,
    #[serde(default)]
    pub partition_location: Option<String>,
    #[serde(default)]
    pub old_partition_location: Option<String>,
}

/// A metastore change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListenerEvent {
    CreateTable(EventTable),
    AlterTable(AlterTableEvent),
    DropTable(EventTable),
    AddPartition(PartitionEvent),
    AlterPartition(AlterPartitionEvent),
    DropPartition(PartitionEvent),
}

impl ListenerEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            ListenerEvent::CreateTable(_) => EventType::CreateTable,
            ListenerEvent::AlterTable(_) => EventType::AlterTable,
            ListenerEvent::DropTable(_) => EventType::DropTable,
            ListenerEvent::AddPartition(_) => EventType::AddPartition,
            ListenerEvent::AlterPartition(_) => EventType::AlterPartition,
            ListenerEvent::DropPartition(_) => EventType::DropPartition,
        }
    }

    pub fn table(&self) -> &EventTable {
        match self {
            ListenerEvent::CreateTable(table) | ListenerEvent::DropTable(table) => table,
            ListenerEvent::AlterTable(event) => &event.table,
            ListenerEvent::AddPartition(event) | ListenerEvent::DropPartition(event) => {
                &event.table
            }
            ListenerEvent::AlterPartition(event) => &event.table,
        }
    }

    pub fn db_name(&self) -> &str {
        &self.table().db_name
    }

    pub fn table_name(&self) -> &str {
        &self.table().table_name
    }

    pub fn table_parameters(&self) -> &HashMap<String, String> {
        &self.table().table_parameters
    }

    pub fn table_parameter(&self, key: &str) -> Option<&str> {
        self.table_parameters().get(key).map(String::as_str)
    }

    /// `(old, new)` locations for events that move data, `None` otherwise.
    pub fn location_change(&self) -> Option<(Option<&str>, Option<&str>)> {
        match self {
            ListenerEvent::AlterTable(event) => Some((
                event.old_table_location.as_deref(),
                event.table.table_location.as_deref(),
            )),
            ListenerEvent::AlterPartition(event) => Some((
                event.old_partition_location.as_deref(),
                event.partition_location.as_deref(),
            )),
            _ => None,
        }
    }
}
