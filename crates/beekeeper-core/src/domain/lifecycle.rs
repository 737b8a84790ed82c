//! Lifecycle types and entity kinds.
//!
//! The pair `(EntityKind, LifecycleType)` is what routes an entry to the
//! cleanup handler responsible for it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Why an entry was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleType {
    /// Data left behind after a location change or a drop.
    Unreferenced,

    /// Data whose retention period, set by table policy, has run out.
    Expired,
}

impl LifecycleType {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleType::Unreferenced => "UNREFERENCED",
            LifecycleType::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for LifecycleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown lifecycle type '{0}'")]
pub struct UnknownLifecycleType(pub String);

impl FromStr for LifecycleType {
    type Err = UnknownLifecycleType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UNREFERENCED" => Ok(LifecycleType::Unreferenced),
            "EXPIRED" => Ok(LifecycleType::Expired),
            _ => Err(UnknownLifecycleType(s.to_string())),
        }
    }
}

/// The kind of storage artifact an entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A physical location (object-store prefix, directory).
    Path,

    /// A whole metastore table.
    Table,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Path => "path",
            EntityKind::Table => "table",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_parses_case_insensitively() {
        assert_eq!(
            "unreferenced".parse::<LifecycleType>().unwrap(),
            LifecycleType::Unreferenced
        );
        assert_eq!(
            "EXPIRED".parse::<LifecycleType>().unwrap(),
            LifecycleType::Expired
        );
        assert!("orphaned".parse::<LifecycleType>().is_err());
    }

    #[test]
    fn display_matches_serialized_name() {
        let s = serde_json::to_string(&LifecycleType::Unreferenced).unwrap();
        assert_eq!(s, format!("\"{}\"", LifecycleType::Unreferenced));
    }
}
