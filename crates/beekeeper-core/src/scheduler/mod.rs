//! Scheduler - producer side
//!
//! metastore のイベントを受け取り、削除予定（SCHEDULED な entry）に変換して
//! Repository に保存します。
//!
//! # フロー
//! 1. EventFilter で対象外のイベントを除外（いずれかが除外と判断すれば除外）
//! 2. ScheduleTranslator が lifecycle ごとに対象パス / テーブルを導出
//! 3. DelayPolicy がテーブルパラメータから遅延を解決（不正値は default）
//! 4. SchedulerService が entry を保存

pub mod delay;
pub mod filter;
pub mod service;
pub mod translator;

pub use self::delay::DelayPolicy;
pub use self::filter::{
    EventFilter, EventTypeFilter, LocationOnlyUpdateFilter, TableParameterFilter, WhitelistFilter,
    is_filtered_out_by_any,
};
pub use self::service::{SchedulerError, SchedulerService};
pub use self::translator::{
    CLIENT_ID, ExpiredTranslator, ScheduleTranslator, UnreferencedTranslator,
};
