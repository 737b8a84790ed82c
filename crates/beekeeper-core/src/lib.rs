//! beekeeper-core
//!
//! Core building blocks for beekeeper: data-lake housekeeping that deletes
//! unreferenced and expired paths and tables after a delay.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, entry, status, lifecycle, event, duration）
//! - **ports**: 抽象化レイヤー（HousekeepingRepository, Cleaner, Clock, IdGenerator）
//! - **impls**: 実装（InMemoryRepository, LocalPathCleaner, WarehouseTableCleaner）
//! - **scheduler**: producer side（EventFilter, ScheduleTranslator, SchedulerService）
//! - **app**: consumer side（CleanupHandler, PagingCleanupService, CleanupLoop）
//! - **config**: 設定（JSON + デフォルト値 + 起動時検証）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod scheduler;
