//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryRepository**: 開発用・テスト用の正本（CLI では JSON ファイルと往復）
//! - **LocalPathCleaner**: ローカルファイルシステム上のパスを削除
//! - **WarehouseTableCleaner**: `<warehouse>/<db>.db/<table>` を削除
//!
//! # 本番用実装
//! SQL リポジトリや S3 / metastore 向け Cleaner は別クレートに配置します。

pub mod local_path_cleaner;
pub mod memory_repository;
pub mod warehouse_table_cleaner;

// 主要な型を再エクスポート
pub use self::local_path_cleaner::LocalPathCleaner;
pub use self::memory_repository::InMemoryRepository;
pub use self::warehouse_table_cleaner::WarehouseTableCleaner;
