//! App - アプリケーション層（consumer side）
//!
//! このモジュールは、ports を組み合わせて cleanup を実装します。
//!
//! # 主要コンポーネント
//! - **CleanupHandler**: 1 つの (kind, lifecycle) の entry をページ単位で処理
//! - **PagingCleanupService**: 全 handler をカーソル型ページングで走査
//! - **CleanupServiceBuilder**: 起動時検証つきのワイヤリング
//! - **CleanupLoop**: 定期実行（interval + shutdown、pass 前後の PassHooks）

pub mod builder;
pub mod cleanup_loop;
pub mod cleanup_service;
pub mod handler;
pub mod report;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, CleanupServiceBuilder, DEFAULT_PAGE_SIZE};
pub use self::cleanup_loop::{CleanupLoop, PassHooks};
pub use self::cleanup_service::{CleanupServiceError, PagingCleanupService};
pub use self::handler::{
    CleanupHandler, EXPIRED_PATHS, EXPIRED_TABLES, EntryCleanupHandler, HANDLER_NAMES,
    UNREFERENCED_PATHS,
};
pub use self::report::{CleanupReport, HandlerReport, PageOutcome};
