//! In-memory repository implementation.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{EntryId, HousekeepingEntry};
use crate::ports::{EligibleQuery, HousekeepingRepository, RepositoryError};

/// In-memory repository state.
struct InMemoryRepositoryState {
    /// All entries, keyed (and therefore ordered) by id.
    entries: BTreeMap<EntryId, HousekeepingEntry>,

    /// Next id to assign.
    next_id: u64,
}

impl InMemoryRepositoryState {
    fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Entries with ids first, so fresh ids never collide with stored ones.
    fn load(
        entries: impl IntoIterator<Item = HousekeepingEntry>,
    ) -> Result<Self, RepositoryError> {
        let mut state = Self::new();
        let (with_id, without_id): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|entry| entry.id().is_some());
        for entry in with_id.into_iter().chain(without_id) {
            state.upsert(entry)?;
        }
        Ok(state)
    }

    fn allocate_id(&mut self) -> Result<EntryId, RepositoryError> {
        let id = EntryId::new(self.next_id);
        self.next_id = successor(id)?;
        Ok(id)
    }

    fn upsert(&mut self, entry: HousekeepingEntry) -> Result<HousekeepingEntry, RepositoryError> {
        let (id, entry) = match entry.id() {
            Some(id) => {
                // Keep the allocator ahead of ids that came from outside.
                self.next_id = self.next_id.max(successor(id)?);
                (id, entry)
            }
            None => {
                let id = self.allocate_id()?;
                (id, entry.with_id(id))
            }
        };
        self.entries.insert(id, entry.clone());
        Ok(entry)
    }

    fn page(&self, query: &EligibleQuery) -> Vec<HousekeepingEntry> {
        let lower = match query.after {
            Some(after) => Bound::Excluded(after),
            None => Bound::Unbounded,
        };
        self.entries
            .range((lower, Bound::Unbounded))
            .map(|(_, entry)| entry)
            .filter(|entry| query.matches(entry))
            .take(query.limit)
            .cloned()
            .collect()
    }
}

fn successor(id: EntryId) -> Result<u64, RepositoryError> {
    id.value()
        .checked_add(1)
        .ok_or_else(|| {
            RepositoryError::OperationFailed(format!("entry id space exhausted at {id}"))
        })
}

/// In-memory repository.
///
/// Ids are assigned sequentially on first save, so ascending id order is
/// insertion order.
#[derive(Clone)]
pub struct InMemoryRepository {
    state: Arc<Mutex<InMemoryRepositoryState>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryRepositoryState::new())),
        }
    }

    /// Loads previously stored entries (e.g. from a JSON dump).
    ///
    /// Entries keep their ids; entries without one are assigned the next free
    /// id in iteration order.
    pub fn from_entries(
        entries: impl IntoIterator<Item = HousekeepingEntry>,
    ) -> Result<Self, RepositoryError> {
        Ok(Self {
            state: Arc::new(Mutex::new(InMemoryRepositoryState::load(entries)?)),
        })
    }

    /// Swaps the whole content for `entries`, loaded like [`Self::from_entries`].
    ///
    /// Clones share the state, so every holder sees the new content.
    pub async fn replace_all(
        &self,
        entries: impl IntoIterator<Item = HousekeepingEntry>,
    ) -> Result<(), RepositoryError> {
        let fresh = InMemoryRepositoryState::load(entries)?;
        *self.state.lock().await = fresh;
        Ok(())
    }

    /// Every stored entry, ascending by id.
    pub async fn snapshot(&self) -> Vec<HousekeepingEntry> {
        let state = self.state.lock().await;
        state.entries.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HousekeepingRepository for InMemoryRepository {
    async fn find_eligible(
        &self,
        query: &EligibleQuery,
    ) -> Result<Vec<HousekeepingEntry>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.page(query))
    }

    async fn save(&self, entry: HousekeepingEntry) -> Result<HousekeepingEntry, RepositoryError> {
        let mut state = self.state.lock().await;
        state.upsert(entry)
    }

    async fn find_all(&self) -> Result<Vec<HousekeepingEntry>, RepositoryError> {
        Ok(self.snapshot().await)
    }
}
