//! HousekeepingRepository port - 永続化された entry の正本（source of truth）
//!
//! Repository は以下を提供します：
//! - 期限切れ entry のカーソル型ページング（`find_eligible`）
//! - entry 単位の upsert（`save`）
//!
//! # 実装
//! - **InMemoryRepository**（`impls::memory_repository`）: テスト・CLI 用
//! - SQL 実装は別クレートの想定（スキーマ・接続プールはこのクレートの関心外）

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{EntityKind, EntryId, HousekeepingEntry, LifecycleType};

/// One page request over the eligible set.
///
/// Matches entries of `kind` and `lifecycle_type` whose status is retryable,
/// whose cleanup timestamp is `<= not_after` and whose id is strictly greater
/// than `after`. Results are ordered by ascending id and capped at `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibleQuery {
    pub kind: EntityKind,
    pub lifecycle_type: LifecycleType,
    pub not_after: DateTime<Utc>,
    pub after: Option<EntryId>,
    pub limit: usize,
}

impl EligibleQuery {
    /// Does `entry` belong to this query's result set (ignoring the limit)?
    pub fn matches(&self, entry: &HousekeepingEntry) -> bool {
        entry.kind() == self.kind
            && entry.lifecycle_type() == self.lifecycle_type
            && entry.is_eligible(self.not_after)
            && match (self.after, entry.id()) {
                (Some(after), Some(id)) => id > after,
                (None, _) => true,
                (Some(_), None) => false,
            }
    }
}

/// RepositoryError は永続化レイヤーの障害
///
/// cleanup の実行中に発生した場合は、その実行全体を中断します。
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),

    #[error("repository operation failed: {0}")]
    OperationFailed(String),
}

/// HousekeepingRepository は entry の永続化を抽象化
///
/// # 設計原則
/// - 各 `save` は 1 entry の read-modify-write として原子的
/// - 複数 entry にまたがるトランザクションは要求しない
/// - タイムアウト・リトライは実装側の責務
#[async_trait]
pub trait HousekeepingRepository: Send + Sync {
    /// Next page of eligible entries, ascending by id.
    async fn find_eligible(
        &self,
        query: &EligibleQuery,
    ) -> Result<Vec<HousekeepingEntry>, RepositoryError>;

    /// Upsert by identity. Entries without an id get one assigned.
    async fn save(&self, entry: HousekeepingEntry) -> Result<HousekeepingEntry, RepositoryError>;

    /// Every stored entry, ascending by id.
    async fn find_all(&self) -> Result<Vec<HousekeepingEntry>, RepositoryError>;
}
