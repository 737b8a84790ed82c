//! Event to schedule translation.
//!
//! Each lifecycle has its own translator. They share the pipeline in
//! [`ScheduleTranslator::translate`]: filter, derive the targets the event
//! implicates, resolve the delay, build `SCHEDULED` entries. Nothing here
//! touches storage.

use chrono::{DateTime, Utc};

use super::delay::DelayPolicy;
use super::filter::{
    EventFilter, EventTypeFilter, LocationOnlyUpdateFilter, TableParameterFilter, WhitelistFilter,
    is_filtered_out_by_any,
};
use crate::domain::{
    EntryError, EventType, HousekeepingEntry, HousekeepingStatus, HousekeepingTarget,
    LifecycleType, ListenerEvent,
};

/// Provenance recorded on every entry scheduled from a metastore event.
pub const CLIENT_ID: &str = "apiary-metastore-event";

/// Translates metastore events into pending entries for one lifecycle.
pub trait ScheduleTranslator: Send + Sync {
    fn lifecycle_type(&self) -> LifecycleType;

    fn filters(&self) -> &[Box<dyn EventFilter>];

    fn delay_policy(&self) -> &DelayPolicy;

    /// One target per path or table the event implicates.
    fn targets(&self, event: &ListenerEvent) -> Vec<HousekeepingTarget>;

    /// Runs the full pipeline. Returns no entries for filtered events.
    fn translate(
        &self,
        event: &ListenerEvent,
        now: DateTime<Utc>,
    ) -> Result<Vec<HousekeepingEntry>, EntryError> {
        let lifecycle_type = self.lifecycle_type();
        if is_filtered_out_by_any(self.filters(), event, lifecycle_type) {
            tracing::debug!(
                event_type = %event.event_type(),
                table = %format!("{}.{}", event.db_name(), event.table_name()),
                %lifecycle_type,
                "event filtered out"
            );
            return Ok(Vec::new());
        }

        let targets = self.targets(event);
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let delay = self.delay_policy().resolve(event, now);
        targets
            .into_iter()
            .map(|target| {
                HousekeepingEntry::builder()
                    .database_name(event.db_name())
                    .table_name(event.table_name())
                    .target(target)
                    .status(HousekeepingStatus::Scheduled)
                    .creation_timestamp(now)
                    .cleanup_delay(delay)
                    .client_id(CLIENT_ID)
                    .lifecycle_type(lifecycle_type)
                    .build()
            })
            .collect()
    }
}

fn path_target(location: Option<&str>) -> Option<HousekeepingTarget> {
    location
        .filter(|location| !location.trim().is_empty())
        .map(|location| HousekeepingTarget::Path {
            path: location.to_string(),
        })
}

/// Schedules data that a location change or a drop left behind.
pub struct UnreferencedTranslator {
    filters: Vec<Box<dyn EventFilter>>,
    delay: DelayPolicy,
}

impl UnreferencedTranslator {
    pub const EVENT_TYPES: [EventType; 4] = [
        EventType::AlterTable,
        EventType::AlterPartition,
        EventType::DropTable,
        EventType::DropPartition,
    ];

    pub fn new(
        delay: DelayPolicy,
        enabled_property: impl Into<String>,
        whitelist_property: impl Into<String>,
    ) -> Self {
        Self {
            filters: vec![
                Box::new(EventTypeFilter::new(Self::EVENT_TYPES)),
                Box::new(TableParameterFilter::new(enabled_property)),
                Box::new(WhitelistFilter::new(whitelist_property)),
                Box::new(LocationOnlyUpdateFilter),
            ],
            delay,
        }
    }
}

impl ScheduleTranslator for UnreferencedTranslator {
    fn lifecycle_type(&self) -> LifecycleType {
        LifecycleType::Unreferenced
    }

    fn filters(&self) -> &[Box<dyn EventFilter>] {
        &self.filters
    }

    fn delay_policy(&self) -> &DelayPolicy {
        &self.delay
    }

    fn targets(&self, event: &ListenerEvent) -> Vec<HousekeepingTarget> {
        let location = match event {
            ListenerEvent::AlterTable(event) => event.old_table_location.as_deref(),
            ListenerEvent::AlterPartition(event) => event.old_partition_location.as_deref(),
            ListenerEvent::DropTable(table) => table.table_location.as_deref(),
            ListenerEvent::DropPartition(event) => event.partition_location.as_deref(),
            ListenerEvent::CreateTable(_) | ListenerEvent::AddPartition(_) => None,
        };
        path_target(location).into_iter().collect()
    }
}

/// Schedules data whose table-level retention runs out.
pub struct ExpiredTranslator {
    filters: Vec<Box<dyn EventFilter>>,
    delay: DelayPolicy,
}

impl ExpiredTranslator {
    pub const EVENT_TYPES: [EventType; 4] = [
        EventType::CreateTable,
        EventType::AlterTable,
        EventType::AddPartition,
        EventType::AlterPartition,
    ];

    pub fn new(
        delay: DelayPolicy,
        enabled_property: impl Into<String>,
        whitelist_property: impl Into<String>,
    ) -> Self {
        Self {
            filters: vec![
                Box::new(EventTypeFilter::new(Self::EVENT_TYPES)),
                Box::new(TableParameterFilter::new(enabled_property)),
                Box::new(WhitelistFilter::new(whitelist_property)),
            ],
            delay,
        }
    }
}

impl ScheduleTranslator for ExpiredTranslator {
    fn lifecycle_type(&self) -> LifecycleType {
        LifecycleType::Expired
    }

    fn filters(&self) -> &[Box<dyn EventFilter>] {
        &self.filters
    }

    fn delay_policy(&self) -> &DelayPolicy {
        &self.delay
    }

    fn targets(&self, event: &ListenerEvent) -> Vec<HousekeepingTarget> {
        match event {
            ListenerEvent::CreateTable(_) | ListenerEvent::AlterTable(_) => {
                vec![HousekeepingTarget::Table]
            }
            ListenerEvent::AddPartition(event) => {
                path_target(event.partition_location.as_deref()).into_iter().collect()
            }
            ListenerEvent::AlterPartition(event) => {
                path_target(event.partition_location.as_deref()).into_iter().collect()
            }
            ListenerEvent::DropTable(_) | ListenerEvent::DropPartition(_) => Vec::new(),
        }
    }
}
