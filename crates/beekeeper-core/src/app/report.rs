//! Cleanup reports.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{EntityKind, LifecycleType, RunId};

/// What one handler did during one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerReport {
    pub handler: String,
    pub kind: EntityKind,
    pub lifecycle_type: LifecycleType,
    /// Non-empty pages fetched.
    pub pages: usize,
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl HandlerReport {
    pub fn new(
        handler: impl Into<String>,
        kind: EntityKind,
        lifecycle_type: LifecycleType,
    ) -> Self {
        Self {
            handler: handler.into(),
            kind,
            lifecycle_type,
            pages: 0,
            scanned: 0,
            deleted: 0,
            failed: 0,
        }
    }

    pub(crate) fn absorb(&mut self, page: PageOutcome) {
        self.pages += 1;
        self.scanned += page.scanned;
        self.deleted += page.deleted;
        self.failed += page.failed;
    }
}

/// Counters for one processed page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageOutcome {
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Result of one `clean_up` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    pub handlers: Vec<HandlerReport>,
}

impl CleanupReport {
    pub fn scanned(&self) -> usize {
        self.handlers.iter().map(|h| h.scanned).sum()
    }

    pub fn deleted(&self) -> usize {
        self.handlers.iter().map(|h| h.deleted).sum()
    }

    pub fn failed(&self) -> usize {
        self.handlers.iter().map(|h| h.failed).sum()
    }
}
