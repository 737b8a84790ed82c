//! Domain model (IDs, entries, statuses, lifecycle types, events).
//!
//! This module is architecture-agnostic: it does not assume a storage engine,
//! an event transport or a deletion mechanism.

pub mod duration;
pub mod entry;
pub mod event;
pub mod ids;
pub mod lifecycle;
pub mod status;

pub use duration::{format_iso8601_duration, parse_iso8601_duration};
pub use entry::{
    AttemptOutcome, EntryError, HousekeepingEntry, HousekeepingEntryBuilder, HousekeepingTarget,
};
pub use event::{
    AlterPartitionEvent, AlterTableEvent, EventTable, EventType, ListenerEvent, PartitionEvent,
};
pub use ids::{EntryId, RunId};
pub use lifecycle::{EntityKind, LifecycleType};
pub use status::HousekeepingStatus;
