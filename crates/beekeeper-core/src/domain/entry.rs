//! Housekeeping entry: the persisted unit of cleanup work.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::duration::{format_iso8601_duration, parse_iso8601_duration};
use super::ids::EntryId;
use super::lifecycle::{EntityKind, LifecycleType};
use super::status::HousekeepingStatus;

/// What an entry will delete.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HousekeepingTarget {
    /// A physical location, e.g. `s3://bucket/warehouse/db/table/part=1`.
    Path { path: String },

    /// The table identified by the entry's database and table names.
    Table,
}

impl HousekeepingTarget {
    pub fn kind(&self) -> EntityKind {
        match self {
            HousekeepingTarget::Path { .. } => EntityKind::Path,
            HousekeepingTarget::Table => EntityKind::Table,
        }
    }
}

/// Error raised when an entry is built without its required fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryError {
    #[error("housekeeping entry requires a creation timestamp")]
    MissingCreationTimestamp,

    #[error("housekeeping entry requires a cleanup delay")]
    MissingCleanupDelay,

    #[error("housekeeping entry requires a lifecycle type")]
    MissingLifecycleType,

    #[error("housekeeping entry requires a {0}")]
    MissingField(&'static str),

    #[error("cleanup delay must not be negative, got {0}")]
    NegativeCleanupDelay(String),

    #[error("cleanup delay '{0}' is not an ISO-8601 duration")]
    InvalidCleanupDelay(String),

    #[error("cleanup delay {0} moves the due time out of range")]
    CleanupDelayOverflow(String),
}

/// Immutable snapshot of one housekeeping entry.
///
/// Design:
/// - Built only through [`HousekeepingEntryBuilder`], which validates eagerly.
/// - `cleanup_timestamp` is derived (`creation_timestamp + cleanup_delay`) and
///   has no setter.
/// - Every mutation consumes the snapshot and returns a new one; the caller
///   persists it explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EntryRecord", into = "EntryRecord")]
pub struct HousekeepingEntry {
    id: Option<EntryId>,
    database_name: String,
    table_name: String,
    target: HousekeepingTarget,
    status: HousekeepingStatus,
    creation_timestamp: DateTime<Utc>,
    modified_timestamp: DateTime<Utc>,
    cleanup_delay: Duration,
    cleanup_timestamp: DateTime<Utc>,
    cleanup_attempts: u32,
    client_id: Option<String>,
    lifecycle_type: LifecycleType,
}

/// Outcome of one cleanup attempt, as recorded on the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Deleted,
    Failed,
}

impl HousekeepingEntry {
    pub fn builder() -> HousekeepingEntryBuilder {
        HousekeepingEntryBuilder::default()
    }

    pub fn id(&self) -> Option<EntryId> {
        self.id
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// `database.table`
    pub fn qualified_table_name(&self) -> String {
        format!("{}.{}", self.database_name, self.table_name)
    }

    pub fn target(&self) -> &HousekeepingTarget {
        &self.target
    }

    pub fn kind(&self) -> EntityKind {
        self.target.kind()
    }

    /// The physical location for path-scoped entries.
    pub fn path(&self) -> Option<&str> {
        match &self.target {
            HousekeepingTarget::Path { path } => Some(path),
            HousekeepingTarget::Table => None,
        }
    }

    pub fn status(&self) -> HousekeepingStatus {
        self.status
    }

    pub fn creation_timestamp(&self) -> DateTime<Utc> {
        self.creation_timestamp
    }

    pub fn modified_timestamp(&self) -> DateTime<Utc> {
        self.modified_timestamp
    }

    pub fn cleanup_delay(&self) -> Duration {
        self.cleanup_delay
    }

    pub fn cleanup_timestamp(&self) -> DateTime<Utc> {
        self.cleanup_timestamp
    }

    pub fn cleanup_attempts(&self) -> u32 {
        self.cleanup_attempts
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn lifecycle_type(&self) -> LifecycleType {
        self.lifecycle_type
    }

    /// Human-readable location used in logs.
    pub fn location(&self) -> String {
        match &self.target {
            HousekeepingTarget::Path { path } => path.clone(),
            HousekeepingTarget::Table => self.qualified_table_name(),
        }
    }

    /// Is this entry due for cleanup at `now`?
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.status.is_retryable() && self.cleanup_timestamp <= now
    }

    /// Returns the snapshot with its repository-assigned identity.
    ///
    /// Identity is immutable: an entry that already has an id keeps it.
    pub fn with_id(mut self, id: EntryId) -> Self {
        if self.id.is_none() {
            self.id = Some(id);
        }
        self
    }

    /// Records one cleanup attempt.
    ///
    /// Attempts are counted regardless of the outcome.
    pub fn record_attempt(mut self, outcome: AttemptOutcome, at: DateTime<Utc>) -> Self {
        self.cleanup_attempts = self.cleanup_attempts.saturating_add(1);
        self.status = match outcome {
            AttemptOutcome::Deleted => HousekeepingStatus::Deleted,
            AttemptOutcome::Failed => HousekeepingStatus::Failed,
        };
        self.modified_timestamp = at;
        self
    }

    /// Replaces the cleanup delay; the due time moves with it.
    pub fn with_cleanup_delay(
        mut self,
        delay: Duration,
        at: DateTime<Utc>,
    ) -> Result<Self, EntryError> {
        self.cleanup_timestamp = due_time(self.creation_timestamp, delay)?;
        self.cleanup_delay = delay;
        self.modified_timestamp = at;
        Ok(self)
    }
}

fn due_time(created: DateTime<Utc>, delay: Duration) -> Result<DateTime<Utc>, EntryError> {
    if delay < Duration::zero() {
        return Err(EntryError::NegativeCleanupDelay(format_iso8601_duration(
            delay,
        )));
    }
    created
        .checked_add_signed(delay)
        .ok_or_else(|| EntryError::CleanupDelayOverflow(format_iso8601_duration(delay)))
}

/// Builder for [`HousekeepingEntry`].
///
/// `build()` fails fast when the creation timestamp, the cleanup delay, the
/// lifecycle type or the names are missing.
#[derive(Debug, Clone, Default)]
pub struct HousekeepingEntryBuilder {
    id: Option<EntryId>,
    database_name: Option<String>,
    table_name: Option<String>,
    target: Option<HousekeepingTarget>,
    status: Option<HousekeepingStatus>,
    creation_timestamp: Option<DateTime<Utc>>,
    modified_timestamp: Option<DateTime<Utc>>,
    cleanup_delay: Option<Duration>,
    cleanup_attempts: u32,
    client_id: Option<String>,
    lifecycle_type: Option<LifecycleType>,
}

impl HousekeepingEntryBuilder {
    pub fn id(mut self, id: EntryId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn database_name(mut self, database_name: impl Into<String>) -> Self {
        self.database_name = Some(database_name.into());
        self
    }

    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.target = Some(HousekeepingTarget::Path { path: path.into() });
        self
    }

    pub fn target(mut self, target: HousekeepingTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn status(mut self, status: HousekeepingStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn creation_timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.creation_timestamp = Some(at);
        self
    }

    pub fn modified_timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.modified_timestamp = Some(at);
        self
    }

    pub fn cleanup_delay(mut self, delay: Duration) -> Self {
        self.cleanup_delay = Some(delay);
        self
    }

    pub fn cleanup_attempts(mut self, attempts: u32) -> Self {
        self.cleanup_attempts = attempts;
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn lifecycle_type(mut self, lifecycle_type: LifecycleType) -> Self {
        self.lifecycle_type = Some(lifecycle_type);
        self
    }

    pub fn build(self) -> Result<HousekeepingEntry, EntryError> {
        let creation_timestamp = self
            .creation_timestamp
            .ok_or(EntryError::MissingCreationTimestamp)?;
        let cleanup_delay = self.cleanup_delay.ok_or(EntryError::MissingCleanupDelay)?;
        let lifecycle_type = self
            .lifecycle_type
            .ok_or(EntryError::MissingLifecycleType)?;
        let database_name = self
            .database_name
            .ok_or(EntryError::MissingField("database name"))?;
        let table_name = self
            .table_name
            .ok_or(EntryError::MissingField("table name"))?;
        let cleanup_timestamp = due_time(creation_timestamp, cleanup_delay)?;

        Ok(HousekeepingEntry {
            id: self.id,
            database_name,
            table_name,
            target: self.target.unwrap_or(HousekeepingTarget::Table),
            status: self.status.unwrap_or(HousekeepingStatus::Scheduled),
            creation_timestamp,
            modified_timestamp: self.modified_timestamp.unwrap_or(creation_timestamp),
            cleanup_delay,
            cleanup_timestamp,
            cleanup_attempts: self.cleanup_attempts,
            client_id: self.client_id,
            lifecycle_type,
        })
    }
}

/// Wire/storage shape of an entry.
///
/// `cleanup_timestamp` is written for readers of the store but ignored when
/// loading: it is always recomputed from the creation timestamp and delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<EntryId>,
    database_name: String,
    table_name: String,
    target: HousekeepingTarget,
    status: HousekeepingStatus,
    creation_timestamp: DateTime<Utc>,
    #[serde(default)]
    modified_timestamp: Option<DateTime<Utc>>,
    cleanup_delay: String,
    #[serde(default)]
    cleanup_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    cleanup_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    lifecycle_type: LifecycleType,
}

impl TryFrom<EntryRecord> for HousekeepingEntry {
    type Error = EntryError;

    fn try_from(record: EntryRecord) -> Result<Self, Self::Error> {
        let delay = parse_iso8601_duration(&record.cleanup_delay)
            .ok_or_else(|| EntryError::InvalidCleanupDelay(record.cleanup_delay.clone()))?;

        let mut builder = HousekeepingEntry::builder()
            .database_name(record.database_name)
            .table_name(record.table_name)
            .target(record.target)
            .status(record.status)
            .creation_timestamp(record.creation_timestamp)
            .cleanup_delay(delay)
            .cleanup_attempts(record.cleanup_attempts)
            .lifecycle_type(record.lifecycle_type);
        if let Some(id) = record.id {
            builder = builder.id(id);
        }
        if let Some(modified) = record.modified_timestamp {
            builder = builder.modified_timestamp(modified);
        }
        if let Some(client_id) = record.client_id {
            builder = builder.client_id(client_id);
        }
        builder.build()
    }
}

impl From<HousekeepingEntry> for EntryRecord {
    fn from(entry: HousekeepingEntry) -> Self {
        Self {
            id: entry.id,
            database_name: entry.database_name,
            table_name: entry.table_name,
            target: entry.target,
            status: entry.status,
            creation_timestamp: entry.creation_timestamp,
            modified_timestamp: Some(entry.modified_timestamp),
            cleanup_delay: format_iso8601_duration(entry.cleanup_delay),
            cleanup_timestamp: Some(entry.cleanup_timestamp),
            cleanup_attempts: entry.cleanup_attempts,
            client_id: entry.client_id,
            lifecycle_type: entry.lifecycle_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn path_entry() -> HousekeepingEntryBuilder {
        HousekeepingEntry::builder()
            .database_name("database")
            .table_name("table")
            .path("s3://bucket/table/part=1")
            .creation_timestamp(created())
            .cleanup_delay(Duration::days(3))
            .lifecycle_type(LifecycleType::Unreferenced)
    }

    #[test]
    fn new_entry_starts_scheduled_with_derived_cleanup_timestamp() {
        let entry = path_entry().build().unwrap();

        assert_eq!(entry.status(), HousekeepingStatus::Scheduled);
        assert_eq!(entry.cleanup_attempts(), 0);
        assert_eq!(entry.cleanup_timestamp(), created() + Duration::days(3));
        assert_eq!(entry.modified_timestamp(), created());
        assert_eq!(entry.kind(), EntityKind::Path);
        assert_eq!(entry.id(), None);
    }

    #[test]
    fn build_fails_without_creation_timestamp() {
        let err = HousekeepingEntry::builder()
            .database_name("database")
            .table_name("table")
            .cleanup_delay(Duration::days(3))
            .lifecycle_type(LifecycleType::Expired)
            .build()
            .unwrap_err();
        assert_eq!(err, EntryError::MissingCreationTimestamp);
    }

    #[test]
    fn build_fails_without_cleanup_delay() {
        let err = HousekeepingEntry::builder()
            .database_name("database")
            .table_name("table")
            .creation_timestamp(created())
            .lifecycle_type(LifecycleType::Expired)
            .build()
            .unwrap_err();
        assert_eq!(err, EntryError::MissingCleanupDelay);
    }

    #[test]
    fn build_rejects_negative_delay() {
        let err = path_entry()
            .cleanup_delay(Duration::seconds(-1))
            .build()
            .unwrap_err();
        assert!(matches!(err, EntryError::NegativeCleanupDelay(_)));
    }

    #[test]
    fn build_rejects_delay_past_the_calendar() {
        let err = path_entry()
            .cleanup_delay(Duration::days(100_000_000))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            EntryError::CleanupDelayOverflow("P100000000D".to_string())
        );
    }

    #[test]
    fn eligibility_requires_retryable_status_and_due_time() {
        let entry = path_entry().build().unwrap();
        let due = entry.cleanup_timestamp();

        assert!(!entry.is_eligible(due - Duration::seconds(1)));
        assert!(entry.is_eligible(due));

        let failed = path_entry()
            .status(HousekeepingStatus::Failed)
            .build()
            .unwrap();
        assert!(failed.is_eligible(due));

        let deleted = path_entry()
            .status(HousekeepingStatus::Deleted)
            .build()
            .unwrap();
        assert!(!deleted.is_eligible(due + Duration::days(365)));
    }

    #[test]
    fn record_attempt_counts_every_outcome() {
        let later = created() + Duration::days(4);
        let entry = path_entry().build().unwrap();

        let failed = entry.record_attempt(AttemptOutcome::Failed, later);
        assert_eq!(failed.status(), HousekeepingStatus::Failed);
        assert_eq!(failed.cleanup_attempts(), 1);
        assert_eq!(failed.modified_timestamp(), later);
        assert_eq!(failed.creation_timestamp(), created());

        let deleted = failed.record_attempt(AttemptOutcome::Deleted, later);
        assert_eq!(deleted.status(), HousekeepingStatus::Deleted);
        assert_eq!(deleted.cleanup_attempts(), 2);
    }

    #[test]
    fn changing_delay_moves_cleanup_timestamp() {
        let entry = path_entry().build().unwrap();
        let updated = entry
            .with_cleanup_delay(Duration::days(10), created())
            .unwrap();
        assert_eq!(updated.cleanup_timestamp(), created() + Duration::days(10));
    }

    #[test]
    fn identity_is_assigned_once() {
        let entry = path_entry().build().unwrap().with_id(EntryId::new(7));
        let entry = entry.with_id(EntryId::new(8));
        assert_eq!(entry.id(), Some(EntryId::new(7)));
    }

    #[test]
    fn deserialization_recomputes_cleanup_timestamp() {
        let json = r#"
        {
          "id": 5,
          "database_name": "db",
          "table_name": "tbl",
          "target": { "kind": "table" },
          "status": "FAILED",
          "creation_timestamp": "2024-01-01T12:00:00Z",
          "cleanup_delay": "P1D",
          "cleanup_timestamp": "1999-01-01T00:00:00Z",
          "cleanup_attempts": 2,
          "lifecycle_type": "EXPIRED"
        }"#;

        let entry: HousekeepingEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id(), Some(EntryId::new(5)));
        assert_eq!(entry.kind(), EntityKind::Table);
        assert_eq!(entry.cleanup_timestamp(), created() + Duration::days(1));
        assert_eq!(entry.cleanup_attempts(), 2);
        assert_eq!(entry.location(), "db.tbl");
    }

    #[test]
    fn deserialization_rejects_bad_delay() {
        let json = r#"
        {
          "database_name": "db",
          "table_name": "tbl",
          "target": { "kind": "path", "path": "s3://x" },
          "status": "SCHEDULED",
          "creation_timestamp": "2024-01-01T12:00:00Z",
          "cleanup_delay": "three days",
          "lifecycle_type": "UNREFERENCED"
        }"#;

        let err = serde_json::from_str::<HousekeepingEntry>(json).unwrap_err();
        assert!(err.to_string().contains("three days"));
    }
}
