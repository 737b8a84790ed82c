//! Cleaner port - 物理削除の抽象化
//!
//! 削除の仕組み（object store の delete、metastore の drop table など）は
//! このクレートの関心外です。core は「成功 or 失敗」の契約だけに依存します。
//!
//! # 実装
//! - **LocalPathCleaner**: ローカルファイルシステム上のパス
//! - **WarehouseTableCleaner**: ローカル warehouse 上のテーブルディレクトリ

use async_trait::async_trait;

use crate::domain::HousekeepingEntry;

/// CleanupError は 1 entry の削除失敗
///
/// handler はこのエラーを伝播せず、entry を FAILED にして次へ進みます。
#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error("unsupported location scheme in '{0}'")]
    UnsupportedScheme(String),

    #[error("entry {0} has no location this cleaner can delete")]
    MissingLocation(String),

    #[error("'{0}' does not name a single directory")]
    InvalidLocation(String),

    #[error("failed to delete '{location}': {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Cleaner は entry が指す artifact を削除する
///
/// # 契約
/// - 1 回の呼び出しで 1 entry
/// - 既に存在しない artifact の削除は成功扱い（冪等）
/// - 失敗は `Err(CleanupError)` で返す（panic しない）
#[async_trait]
pub trait Cleaner: Send + Sync {
    async fn cleanup(&self, entry: &HousekeepingEntry) -> Result<(), CleanupError>;
}

#[async_trait]
impl<C: Cleaner + ?Sized> Cleaner for std::sync::Arc<C> {
    async fn cleanup(&self, entry: &HousekeepingEntry) -> Result<(), CleanupError> {
        (**self).cleanup(entry).await
    }
}
