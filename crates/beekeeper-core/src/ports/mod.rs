//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（SQL ストレージ、object store、metastore など）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - Repository が source of truth（正本）
//! - Cleaner は成功/失敗だけを返す（削除アルゴリズムは関心外）
//! - 時刻と ID 生成は差し替え可能（テストの決定性）

pub mod cleaner;
pub mod clock;
pub mod id_generator;
pub mod repository;

// 主要な trait を再エクスポート
pub use self::cleaner::{Cleaner, CleanupError};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::repository::{EligibleQuery, HousekeepingRepository, RepositoryError};
