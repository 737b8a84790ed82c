//! Scheduler service: translate an event and persist the resulting entries.

use std::sync::Arc;

use super::translator::ScheduleTranslator;
use crate::domain::{EntryError, HousekeepingEntry, ListenerEvent};
use crate::ports::{Clock, HousekeepingRepository, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("failed to build housekeeping entry: {0}")]
    Entry(#[from] EntryError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Producer side: every translator sees every event.
pub struct SchedulerService {
    translators: Vec<Box<dyn ScheduleTranslator>>,
    repository: Arc<dyn HousekeepingRepository>,
    clock: Arc<dyn Clock>,
}

impl SchedulerService {
    pub fn new(
        translators: Vec<Box<dyn ScheduleTranslator>>,
        repository: Arc<dyn HousekeepingRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            translators,
            repository,
            clock,
        }
    }

    /// Returns the persisted entries, ids included.
    ///
    /// All translations run before the first save, so a translation error
    /// leaves storage untouched.
    pub async fn schedule(
        &self,
        event: &ListenerEvent,
    ) -> Result<Vec<HousekeepingEntry>, SchedulerError> {
        let now = self.clock.now();
        let mut pending = Vec::new();
        for translator in &self.translators {
            pending.extend(translator.translate(event, now)?);
        }

        let mut saved = Vec::with_capacity(pending.len());
        for entry in pending {
            let entry = self.repository.save(entry).await?;
            tracing::info!(
                id = ?entry.id(),
                location = %entry.location(),
                lifecycle = %entry.lifecycle_type(),
                cleanup_timestamp = %entry.cleanup_timestamp(),
                "scheduled for cleanup"
            );
            saved.push(entry);
        }
        Ok(saved)
    }
}
