//! CleanupHandler - 1 つの (kind, lifecycle) の entry を処理する
//!
//! # 責務
//! - Repository から due な entry のページを取得
//! - Cleaner を呼び、結果を entry に記録して 1 回だけ保存
//! - 削除失敗はログに残して握りつぶす（scan は続行）
//!
//! Repository の失敗だけは呼び出し元に伝播し、その実行全体を止めます。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::report::PageOutcome;
use crate::domain::{AttemptOutcome, EntityKind, EntryId, HousekeepingEntry, LifecycleType};
use crate::ports::{Cleaner, EligibleQuery, HousekeepingRepository, RepositoryError};

pub const UNREFERENCED_PATHS: &str = "unreferenced-paths";
pub const EXPIRED_TABLES: &str = "expired-tables";
pub const EXPIRED_PATHS: &str = "expired-paths";

/// Every handler name the catalogue knows.
pub const HANDLER_NAMES: [&str; 3] = [UNREFERENCED_PATHS, EXPIRED_TABLES, EXPIRED_PATHS];

/// CleanupHandler は 1 種類の artifact の削除を担当
///
/// # 契約
/// - `find_page` は id 昇順、`after` より大きい id のみ
/// - `process_page` はページ内の各 entry を高々 1 回だけ試行する
#[async_trait]
pub trait CleanupHandler: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> EntityKind;

    fn lifecycle_type(&self) -> LifecycleType;

    async fn find_page(
        &self,
        not_after: DateTime<Utc>,
        after: Option<EntryId>,
        limit: usize,
    ) -> Result<Vec<HousekeepingEntry>, RepositoryError>;

    async fn process_page(
        &self,
        page: Vec<HousekeepingEntry>,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> Result<PageOutcome, RepositoryError>;
}

/// Repository + Cleaner で構成する標準の handler
pub struct EntryCleanupHandler<C> {
    name: String,
    kind: EntityKind,
    lifecycle_type: LifecycleType,
    repository: Arc<dyn HousekeepingRepository>,
    cleaner: C,
}

impl<C: Cleaner> EntryCleanupHandler<C> {
    pub fn new(
        name: impl Into<String>,
        kind: EntityKind,
        lifecycle_type: LifecycleType,
        repository: Arc<dyn HousekeepingRepository>,
        cleaner: C,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            lifecycle_type,
            repository,
            cleaner,
        }
    }

    /// Paths left behind by location changes and drops.
    pub fn unreferenced_paths(repository: Arc<dyn HousekeepingRepository>, cleaner: C) -> Self {
        Self::new(
            UNREFERENCED_PATHS,
            EntityKind::Path,
            LifecycleType::Unreferenced,
            repository,
            cleaner,
        )
    }

    /// Tables whose retention ran out.
    pub fn expired_tables(repository: Arc<dyn HousekeepingRepository>, cleaner: C) -> Self {
        Self::new(
            EXPIRED_TABLES,
            EntityKind::Table,
            LifecycleType::Expired,
            repository,
            cleaner,
        )
    }

    /// Partitions whose retention ran out.
    pub fn expired_paths(repository: Arc<dyn HousekeepingRepository>, cleaner: C) -> Self {
        Self::new(
            EXPIRED_PATHS,
            EntityKind::Path,
            LifecycleType::Expired,
            repository,
            cleaner,
        )
    }

    async fn attempt(
        &self,
        entry: HousekeepingEntry,
        now: DateTime<Utc>,
    ) -> Result<AttemptOutcome, RepositoryError> {
        let outcome = match self.cleaner.cleanup(&entry).await {
            Ok(()) => {
                tracing::info!(
                    id = ?entry.id(),
                    location = %entry.location(),
                    "deleted"
                );
                AttemptOutcome::Deleted
            }
            Err(err) => {
                tracing::warn!(
                    id = ?entry.id(),
                    location = %entry.location(),
                    attempts = entry.cleanup_attempts().saturating_add(1),
                    error = %err,
                    "cleanup failed"
                );
                AttemptOutcome::Failed
            }
        };

        self.repository
            .save(entry.record_attempt(outcome, now))
            .await?;
        Ok(outcome)
    }
}

#[async_trait]
impl<C: Cleaner> CleanupHandler for EntryCleanupHandler<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EntityKind {
        self.kind
    }

    fn lifecycle_type(&self) -> LifecycleType {
        self.lifecycle_type
    }

    async fn find_page(
        &self,
        not_after: DateTime<Utc>,
        after: Option<EntryId>,
        limit: usize,
    ) -> Result<Vec<HousekeepingEntry>, RepositoryError> {
        let query = EligibleQuery {
            kind: self.kind,
            lifecycle_type: self.lifecycle_type,
            not_after,
            after,
            limit,
        };
        self.repository.find_eligible(&query).await
    }

    async fn process_page(
        &self,
        page: Vec<HousekeepingEntry>,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> Result<PageOutcome, RepositoryError> {
        let mut outcome = PageOutcome::default();
        for entry in page {
            outcome.scanned += 1;
            if dry_run {
                tracing::debug!(
                    id = ?entry.id(),
                    location = %entry.location(),
                    status = %entry.status(),
                    "dry run: would delete"
                );
                continue;
            }
            match self.attempt(entry, now).await? {
                AttemptOutcome::Deleted => outcome.deleted += 1,
                AttemptOutcome::Failed => outcome.failed += 1,
            }
        }
        Ok(outcome)
    }
}
