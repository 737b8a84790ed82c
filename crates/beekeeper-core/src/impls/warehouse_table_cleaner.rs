//! Cleaner for tables stored in a local warehouse directory.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::local_path_cleaner::remove_path;
use crate::domain::HousekeepingEntry;
use crate::ports::{Cleaner, CleanupError};

/// Drops a table by deleting `<warehouse>/<database>.db/<table>`.
///
/// This is the directory layout Hive uses for managed tables. The metastore
/// itself is not touched.
#[derive(Debug, Clone)]
pub struct WarehouseTableCleaner {
    warehouse: PathBuf,
}

impl WarehouseTableCleaner {
    pub fn new(warehouse: impl Into<PathBuf>) -> Self {
        Self {
            warehouse: warehouse.into(),
        }
    }

    /// Directory of `database_name.table_name` under the warehouse.
    ///
    /// Does not validate the names; [`Cleaner::cleanup`] does.
    pub fn table_dir(&self, database_name: &str, table_name: &str) -> PathBuf {
        self.warehouse
            .join(format!("{database_name}.db"))
            .join(table_name)
    }
}

/// A name must stay one directory level below its parent.
fn is_single_segment(name: &str) -> bool {
    if name.contains(&['/', '\\'][..]) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[async_trait]
impl Cleaner for WarehouseTableCleaner {
    async fn cleanup(&self, entry: &HousekeepingEntry) -> Result<(), CleanupError> {
        if entry.database_name().is_empty() || entry.table_name().is_empty() {
            return Err(CleanupError::MissingLocation(entry.location()));
        }
        for name in [entry.database_name(), entry.table_name()] {
            if !is_single_segment(name) {
                return Err(CleanupError::InvalidLocation(name.to_string()));
            }
        }
        let dir = self.table_dir(entry.database_name(), entry.table_name());
        tracing::debug!(
            table = %entry.qualified_table_name(),
            dir = %dir.display(),
            "dropping table directory"
        );
        remove_path(&dir, &entry.qualified_table_name()).await
    }
}
