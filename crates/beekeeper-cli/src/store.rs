//! JSON file store.
//!
//! The CLI keeps entries in a single JSON array. `schedule` loads it into an
//! `InMemoryRepository` and writes it back when it finishes. Cleanup passes
//! go through [`StoreSync`], which reloads the file before a pass and merges
//! only the entries the pass changed, so entries scheduled in the meantime
//! survive.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use beekeeper_core::app::PassHooks;
use beekeeper_core::domain::HousekeepingEntry;
use beekeeper_core::impls::InMemoryRepository;
use beekeeper_core::ports::{HousekeepingRepository, RepositoryError};
use tokio::sync::Mutex;

/// A missing file is an empty store.
pub async fn read_entries(path: &Path) -> Result<Vec<HousekeepingEntry>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "store not found, starting empty");
            return Ok(Vec::new());
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read store {}", path.display()));
        }
    };
    serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse store {}", path.display()))
}

pub async fn load(path: &Path) -> Result<InMemoryRepository> {
    let entries = read_entries(path).await?;
    InMemoryRepository::from_entries(entries)
        .with_context(|| format!("failed to load store {}", path.display()))
}

pub async fn save(path: &Path, repository: &InMemoryRepository) -> Result<()> {
    write_entries(path, &repository.snapshot().await).await
}

/// Writes through a sibling temp file so a crash never leaves a torn store.
async fn write_entries(path: &Path, entries: &[HousekeepingEntry]) -> Result<()> {
    let json = serde_json::to_vec_pretty(entries).context("failed to serialize store")?;

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("failed to replace store {}", path.display()))?;
    Ok(())
}

/// Keeps a cleanup repository in step with the store file.
///
/// Cleanup only updates entries it loaded, so merging by id is enough. New
/// entries are never created here.
pub struct StoreSync {
    path: PathBuf,
    repository: InMemoryRepository,
    /// What the file held when the repository was last loaded or persisted.
    baseline: Mutex<Vec<HousekeepingEntry>>,
}

impl StoreSync {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = read_entries(&path).await?;
        let repository = InMemoryRepository::from_entries(entries.clone())
            .with_context(|| format!("failed to load store {}", path.display()))?;
        Ok(Self {
            path,
            repository,
            baseline: Mutex::new(entries),
        })
    }

    pub fn repository(&self) -> &InMemoryRepository {
        &self.repository
    }

    /// Picks up entries other processes wrote since the last load.
    pub async fn reload(&self) -> Result<()> {
        let mut baseline = self.baseline.lock().await;
        let entries = read_entries(&self.path).await?;
        self.repository
            .replace_all(entries.clone())
            .await
            .with_context(|| format!("failed to load store {}", self.path.display()))?;
        *baseline = entries;
        Ok(())
    }

    /// Merges the entries changed since the last load into the current file.
    ///
    /// Returns how many entries were written; nothing is written when no
    /// entry changed.
    pub async fn persist(&self) -> Result<usize> {
        let mut baseline = self.baseline.lock().await;
        let current = self.repository.snapshot().await;
        let before: HashMap<_, _> = baseline
            .iter()
            .filter_map(|entry| entry.id().map(|id| (id, entry)))
            .collect();
        let changed: Vec<_> = current
            .iter()
            .filter(|entry| entry.id().and_then(|id| before.get(&id)) != Some(entry))
            .cloned()
            .collect();
        if changed.is_empty() {
            return Ok(0);
        }

        let merged = load(&self.path).await?;
        for entry in &changed {
            merged
                .save(entry.clone())
                .await
                .context("failed to merge cleanup results")?;
        }
        save(&self.path, &merged).await?;
        tracing::debug!(path = %self.path.display(), changed = changed.len(), "store updated");

        *baseline = current;
        Ok(changed.len())
    }
}

fn unavailable(err: anyhow::Error) -> RepositoryError {
    RepositoryError::Unavailable(format!("{err:#}"))
}

#[async_trait]
impl PassHooks for StoreSync {
    async fn before_pass(&self) -> Result<(), RepositoryError> {
        self.reload().await.map_err(unavailable)
    }

    async fn after_pass(&self) -> Result<(), RepositoryError> {
        self.persist().await.map(|_| ()).map_err(unavailable)
    }
}
