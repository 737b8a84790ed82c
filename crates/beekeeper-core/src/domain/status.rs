//! Housekeeping status machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a housekeeping entry.
///
/// State transitions:
/// - Scheduled -> Deleted
/// - Scheduled -> Failed -> Failed ... -> Deleted
///
/// `Failed` is not terminal: the entry stays eligible and is retried on every
/// cleanup pass until the deletion succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HousekeepingStatus {
    /// Waiting for its cleanup timestamp.
    Scheduled,

    /// Last attempt failed; retried on the next pass.
    Failed,

    /// Artifact removed. Never eligible again.
    Deleted,
}

impl HousekeepingStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, HousekeepingStatus::Deleted)
    }

    /// Can an entry in this state be picked up by a cleanup pass?
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            HousekeepingStatus::Scheduled | HousekeepingStatus::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HousekeepingStatus::Scheduled => "SCHEDULED",
            HousekeepingStatus::Failed => "FAILED",
            HousekeepingStatus::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for HousekeepingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
