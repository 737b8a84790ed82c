//! Domain identifiers (strongly-typed IDs).
//!
//! - `EntryId`: 永続化時に Repository が採番する連番。カーソル型ページングの
//!   安定したソートキーとして使う（昇順 = 登録順）。
//! - `RunId`: cleanup の 1 回の実行を表す ULID。ログの相関に使う。
//!
//! ## なぜ 2 種類なのか？
//! - EntryId は「順序」が本質なので単調増加の整数が適している
//! - RunId は分散環境でも調整なしに生成でき、時刻でソートできる ULID が適している

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identity of a persisted housekeeping entry.
///
/// Assigned on first save and never changed afterwards. Ordering follows
/// assignment order, which is what cursor pagination relies on.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(u64);

impl EntryId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for EntryId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry-{}", self.0)
    }
}

/// Identifier of one cleanup invocation.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Ulid);

impl RunId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for RunId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_ids_sort_by_assignment_order() {
        let mut ids = vec![EntryId::new(3), EntryId::new(1), EntryId::new(2)];
        ids.sort();
        assert_eq!(ids, vec![EntryId::new(1), EntryId::new(2), EntryId::new(3)]);
    }

    #[test]
    fn entry_id_serializes_as_plain_number() {
        let s = serde_json::to_string(&EntryId::new(42)).unwrap();
        assert_eq!(s, "42");
        assert_eq!(EntryId::new(42).to_string(), "entry-42");
    }

    #[test]
    fn run_id_display_has_prefix() {
        let ulid = Ulid::new();
        let run_id = RunId::from(ulid);
        assert_eq!(run_id.as_ulid(), ulid);
        assert!(run_id.to_string().starts_with("run-"));
    }
}
