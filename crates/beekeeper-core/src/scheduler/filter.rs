//! Event filters.
//!
//! A filter answers one question: should this event be ignored for this
//! lifecycle? Filters are stateless and compose with OR: an event is dropped
//! as soon as any filter rejects it.

use std::collections::HashSet;

use crate::domain::{EventType, LifecycleType, ListenerEvent};

/// Stateless predicate over `(event, lifecycle)`.
pub trait EventFilter: Send + Sync {
    /// `true` means the event must not produce any entry.
    fn is_filtered_out(&self, event: &ListenerEvent, lifecycle_type: LifecycleType) -> bool;
}

/// `true` if any of `filters` rejects the event.
pub fn is_filtered_out_by_any(
    filters: &[Box<dyn EventFilter>],
    event: &ListenerEvent,
    lifecycle_type: LifecycleType,
) -> bool {
    filters
        .iter()
        .any(|filter| filter.is_filtered_out(event, lifecycle_type))
}

/// Drops ALTER events that did not move any data.
///
/// An ALTER_TABLE or ALTER_PARTITION is kept only when both the old and the
/// new location are known and they differ. Every other event type passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationOnlyUpdateFilter;

impl EventFilter for LocationOnlyUpdateFilter {
    fn is_filtered_out(&self, event: &ListenerEvent, _lifecycle_type: LifecycleType) -> bool {
        match event.location_change() {
            Some((Some(old), Some(new))) => old == new,
            Some(_) => true,
            None => false,
        }
    }
}

/// Keeps only the event types a lifecycle knows how to translate.
#[derive(Debug, Clone)]
pub struct EventTypeFilter {
    accepted: HashSet<EventType>,
}

impl EventTypeFilter {
    pub fn new(accepted: impl IntoIterator<Item = EventType>) -> Self {
        Self {
            accepted: accepted.into_iter().collect(),
        }
    }
}

impl EventFilter for EventTypeFilter {
    fn is_filtered_out(&self, event: &ListenerEvent, _lifecycle_type: LifecycleType) -> bool {
        !self.accepted.contains(&event.event_type())
    }
}

/// Requires the table to opt in with `<property>=true`.
#[derive(Debug, Clone)]
pub struct TableParameterFilter {
    property: String,
}

impl TableParameterFilter {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
        }
    }
}

impl EventFilter for TableParameterFilter {
    fn is_filtered_out(&self, event: &ListenerEvent, _lifecycle_type: LifecycleType) -> bool {
        !event
            .table_parameter(&self.property)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
    }
}

/// Per-table event whitelist.
///
/// When the table carries `<property>` (e.g. `alter_partition,drop_table`),
/// only the listed event types pass. Tables without the property are not
/// restricted.
#[derive(Debug, Clone)]
pub struct WhitelistFilter {
    property: String,
}

impl WhitelistFilter {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
        }
    }
}

impl EventFilter for WhitelistFilter {
    fn is_filtered_out(&self, event: &ListenerEvent, lifecycle_type: LifecycleType) -> bool {
        let Some(whitelist) = event.table_parameter(&self.property) else {
            return false;
        };
        let event_type = event.event_type();
        let listed = whitelist
            .split(',')
            .filter_map(|name| name.parse::<EventType>().ok())
            .any(|listed| listed == event_type);
        if !listed {
            tracing::debug!(
                table = %format!("{}.{}", event.db_name(), event.table_name()),
                %event_type,
                %lifecycle_type,
                "event type not whitelisted"
            );
        }
        !listed
    }
}
