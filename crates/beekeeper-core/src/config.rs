//! Configuration.
//!
//! Loaded from an optional JSON file. Every key has a default, and a file only
//! needs the keys it changes:
//!
//! ```json
//! { "cleanup": { "page_size": 100 }, "scheduler": { "expired": { "default_delay": "P7D" } } }
//! ```
//!
//! The file is merged over [`BeekeeperConfig::default`] before it is parsed, so
//! nested sections can be overridden partially.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::{
    BuildError, CleanupServiceBuilder, EXPIRED_PATHS, EXPIRED_TABLES, EntryCleanupHandler,
    HANDLER_NAMES, PagingCleanupService, UNREFERENCED_PATHS,
};
use crate::domain::{LifecycleType, parse_iso8601_duration};
use crate::ports::{Cleaner, HousekeepingRepository, IdGenerator};
use crate::scheduler::{DelayPolicy, ExpiredTranslator, ScheduleTranslator, UnreferencedTranslator};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("cleanup.page_size must be greater than zero")]
    ZeroPageSize,

    #[error("cleanup.interval_secs must be greater than zero")]
    ZeroInterval,

    #[error("cleanup.handlers must not be empty")]
    NoHandlers,

    #[error("cleanup handler '{0}' is listed more than once")]
    DuplicateHandler(String),

    #[error("unknown cleanup handler '{0}'")]
    UnknownHandler(String),

    #[error("scheduler.{lifecycle}.default_delay '{value}' is not an ISO-8601 duration")]
    InvalidDefaultDelay { lifecycle: &'static str, value: String },

    #[error(transparent)]
    Build(#[from] BuildError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BeekeeperConfig {
    pub cleanup: CleanupConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CleanupConfig {
    pub page_size: usize,
    pub dry_run: bool,
    pub parallel_handlers: bool,
    pub interval_secs: u64,
    pub handlers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    pub unreferenced: LifecycleConfig,
    pub expired: LifecycleConfig,
    /// Table parameter listing the event types a table accepts.
    pub whitelist_property: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LifecycleConfig {
    /// ISO-8601, e.g. `P3D`.
    pub default_delay: String,
    /// Table parameter overriding the default delay.
    pub delay_property: String,
    /// Table parameter that must be `true` for the table to be managed.
    pub enabled_property: String,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            page_size: crate::app::DEFAULT_PAGE_SIZE,
            dry_run: false,
            parallel_handlers: false,
            interval_secs: 300,
            handlers: HANDLER_NAMES.iter().map(|name| name.to_string()).collect(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            unreferenced: LifecycleConfig {
                default_delay: "P3D".to_string(),
                delay_property: "beekeeper.unreferenced.data.retention.period".to_string(),
                enabled_property: "beekeeper.remove.unreferenced.data".to_string(),
            },
            expired: LifecycleConfig {
                default_delay: "P30D".to_string(),
                delay_property: "beekeeper.expired.data.retention.period".to_string(),
                enabled_property: "beekeeper.remove.expired.data".to_string(),
            },
            whitelist_property: "beekeeper.hive.event.whitelist".to_string(),
        }
    }
}

impl Default for BeekeeperConfig {
    fn default() -> Self {
        Self {
            cleanup: CleanupConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl BeekeeperConfig {
    /// Reads and validates `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Parses `text` over the defaults and validates the result.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let overrides: Value = serde_json::from_str(text)?;
        let mut merged = serde_json::to_value(Self::default())?;
        merge(&mut merged, overrides);
        let config: Self = serde_json::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cleanup.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        if self.cleanup.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.cleanup.handlers.is_empty() {
            return Err(ConfigError::NoHandlers);
        }
        let mut seen = HashSet::new();
        for name in &self.cleanup.handlers {
            if !HANDLER_NAMES.contains(&name.as_str()) {
                return Err(ConfigError::UnknownHandler(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateHandler(name.clone()));
            }
        }
        self.delay_policy(LifecycleType::Unreferenced)?;
        self.delay_policy(LifecycleType::Expired)?;
        Ok(())
    }

    pub fn interval(&self) -> StdDuration {
        StdDuration::from_secs(self.cleanup.interval_secs)
    }

    pub fn lifecycle(&self, lifecycle_type: LifecycleType) -> &LifecycleConfig {
        match lifecycle_type {
            LifecycleType::Unreferenced => &self.scheduler.unreferenced,
            LifecycleType::Expired => &self.scheduler.expired,
        }
    }

    pub fn delay_policy(&self, lifecycle_type: LifecycleType) -> Result<DelayPolicy, ConfigError> {
        let lifecycle = self.lifecycle(lifecycle_type);
        let default_delay = parse_iso8601_duration(&lifecycle.default_delay).ok_or_else(|| {
            ConfigError::InvalidDefaultDelay {
                lifecycle: match lifecycle_type {
                    LifecycleType::Unreferenced => "unreferenced",
                    LifecycleType::Expired => "expired",
                },
                value: lifecycle.default_delay.clone(),
            }
        })?;
        Ok(DelayPolicy::new(lifecycle.delay_property.clone(), default_delay))
    }

    /// One translator per lifecycle.
    pub fn translators(&self) -> Result<Vec<Box<dyn ScheduleTranslator>>, ConfigError> {
        let whitelist = &self.scheduler.whitelist_property;
        let translators: Vec<Box<dyn ScheduleTranslator>> = vec![
            Box::new(UnreferencedTranslator::new(
                self.delay_policy(LifecycleType::Unreferenced)?,
                self.scheduler.unreferenced.enabled_property.clone(),
                whitelist.clone(),
            )),
            Box::new(ExpiredTranslator::new(
                self.delay_policy(LifecycleType::Expired)?,
                self.scheduler.expired.enabled_property.clone(),
                whitelist.clone(),
            )),
        ];
        Ok(translators)
    }

    /// Wires the configured handler set, in the configured order.
    pub fn cleanup_service(
        &self,
        repository: Arc<dyn HousekeepingRepository>,
        path_cleaner: Arc<dyn Cleaner>,
        table_cleaner: Arc<dyn Cleaner>,
        id_generator: Arc<dyn IdGenerator>,
    ) -> Result<PagingCleanupService, ConfigError> {
        let mut builder = CleanupServiceBuilder::new()
            .page_size(self.cleanup.page_size)
            .dry_run(self.cleanup.dry_run)
            .parallel(self.cleanup.parallel_handlers)
            .id_generator(id_generator);

        for name in &self.cleanup.handlers {
            let repository = Arc::clone(&repository);
            let handler = match name.as_str() {
                UNREFERENCED_PATHS => {
                    EntryCleanupHandler::unreferenced_paths(repository, Arc::clone(&path_cleaner))
                }
                EXPIRED_TABLES => {
                    EntryCleanupHandler::expired_tables(repository, Arc::clone(&table_cleaner))
                }
                EXPIRED_PATHS => {
                    EntryCleanupHandler::expired_paths(repository, Arc::clone(&path_cleaner))
                }
                other => return Err(ConfigError::UnknownHandler(other.to_string())),
            };
            builder = builder.handler(Arc::new(handler));
        }

        Ok(builder.build()?)
    }
}

/// Objects merge key by key; anything else replaces.
fn merge(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overrides) => *base = overrides,
    }
}
