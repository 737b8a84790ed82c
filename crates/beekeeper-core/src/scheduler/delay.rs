//! Cleanup delay resolution.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{ListenerEvent, format_iso8601_duration, parse_iso8601_duration};

/// Where a lifecycle reads its cleanup delay from.
///
/// The table may override the default through `property_key`. An override
/// that does not parse, or that pushes the due time past the calendar, is
/// ignored with a warning; it never fails scheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayPolicy {
    property_key: String,
    default_delay: Duration,
}

impl DelayPolicy {
    pub fn new(property_key: impl Into<String>, default_delay: Duration) -> Self {
        Self {
            property_key: property_key.into(),
            default_delay,
        }
    }

    pub fn property_key(&self) -> &str {
        &self.property_key
    }

    pub fn default_delay(&self) -> Duration {
        self.default_delay
    }

    /// Delay for an entry scheduled from `event` at `now`.
    pub fn resolve(&self, event: &ListenerEvent, now: DateTime<Utc>) -> Duration {
        let Some(raw) = event.table_parameter(&self.property_key) else {
            return self.default_delay;
        };
        match parse_iso8601_duration(raw) {
            Some(delay) if now.checked_add_signed(delay).is_some() => delay,
            Some(_) => {
                tracing::warn!(
                    value = raw,
                    property = %self.property_key,
                    table = %format!("{}.{}", event.db_name(), event.table_name()),
                    default = %format_iso8601_duration(self.default_delay),
                    "cleanup delay is out of range, using default"
                );
                self.default_delay
            }
            None => {
                tracing::warn!(
                    value = raw,
                    property = %self.property_key,
                    table = %format!("{}.{}", event.db_name(), event.table_name()),
                    default = %format_iso8601_duration(self.default_delay),
                    "cleanup delay cannot be parsed, using default"
                );
                self.default_delay
            }
        }
    }
}
