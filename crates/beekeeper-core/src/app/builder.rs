//! CleanupServiceBuilder - cleanup service の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - page size 0 は起動時に拒否（カーソルが進まない）
//! - handler が 1 つもなければ拒否
//! - 同じ (kind, lifecycle) に 2 つの handler を登録したら拒否
//!   （同じ entry を 2 つの handler が取り合わないようにする）

use std::collections::HashSet;
use std::sync::Arc;

use super::cleanup_service::PagingCleanupService;
use super::handler::CleanupHandler;
use crate::domain::{EntityKind, LifecycleType};
use crate::ports::{IdGenerator, SystemClock, UlidGenerator};

pub const DEFAULT_PAGE_SIZE: usize = 500;

/// BuildError は cleanup service 構築時のエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("page size must be greater than zero")]
    ZeroPageSize,

    #[error("no cleanup handlers registered")]
    NoHandlers,

    #[error("handler '{handler}' duplicates the {kind}/{lifecycle_type} registration")]
    DuplicateHandler {
        handler: String,
        kind: EntityKind,
        lifecycle_type: LifecycleType,
    },
}

/// # 使用例
/// ```ignore
/// let service = CleanupServiceBuilder::new()
///     .page_size(500)
///     .handler(Arc::new(EntryCleanupHandler::unreferenced_paths(repo, cleaner)))
///     .build()?;
/// ```
pub struct CleanupServiceBuilder {
    handlers: Vec<Arc<dyn CleanupHandler>>,
    page_size: usize,
    dry_run: bool,
    parallel: bool,
    id_generator: Option<Arc<dyn IdGenerator>>,
}

impl CleanupServiceBuilder {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            dry_run: false,
            parallel: false,
            id_generator: None,
        }
    }

    /// Handler を登録（登録順に実行される）
    pub fn handler(mut self, handler: Arc<dyn CleanupHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// handler ごとに tokio task を立てて並行実行する
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// 省略時は `UlidGenerator<SystemClock>`
    pub fn id_generator(mut self, id_generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = Some(id_generator);
        self
    }

    pub fn build(self) -> Result<PagingCleanupService, BuildError> {
        if self.page_size == 0 {
            return Err(BuildError::ZeroPageSize);
        }
        if self.handlers.is_empty() {
            return Err(BuildError::NoHandlers);
        }

        let mut seen = HashSet::new();
        for handler in &self.handlers {
            let key = (handler.kind(), handler.lifecycle_type());
            if !seen.insert(key) {
                return Err(BuildError::DuplicateHandler {
                    handler: handler.name().to_string(),
                    kind: key.0,
                    lifecycle_type: key.1,
                });
            }
        }

        let id_generator = self
            .id_generator
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock)));

        Ok(PagingCleanupService {
            handlers: self.handlers,
            page_size: self.page_size,
            dry_run: self.dry_run,
            parallel: self.parallel,
            id_generator,
        })
    }
}

impl Default for CleanupServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::EntryCleanupHandler;
    use crate::impls::{InMemoryRepository, LocalPathCleaner};
    use crate::ports::HousekeepingRepository;

    fn repository() -> Arc<dyn HousekeepingRepository> {
        Arc::new(InMemoryRepository::new())
    }

    #[test]
    fn test_build_success() {
        let repo = repository();
        let service = CleanupServiceBuilder::new()
            .handler(Arc::new(EntryCleanupHandler::unreferenced_paths(
                Arc::clone(&repo),
                LocalPathCleaner,
            )))
            .handler(Arc::new(EntryCleanupHandler::expired_paths(repo, LocalPathCleaner)))
            .build()
            .unwrap();

        assert_eq!(service.page_size(), DEFAULT_PAGE_SIZE);
        assert!(!service.is_dry_run());
        assert_eq!(service.handler_names(), vec!["unreferenced-paths", "expired-paths"]);
    }

    #[test]
    fn test_build_zero_page_size() {
        let result = CleanupServiceBuilder::new()
            .page_size(0)
            .handler(Arc::new(EntryCleanupHandler::unreferenced_paths(
                repository(),
                LocalPathCleaner,
            )))
            .build();
        assert!(matches!(result, Err(BuildError::ZeroPageSize)));
    }

    #[test]
    fn test_build_no_handlers() {
        assert!(matches!(
            CleanupServiceBuilder::new().build(),
            Err(BuildError::NoHandlers)
        ));
    }

    #[test]
    fn test_build_duplicate_handler() {
        let repo = repository();
        let result = CleanupServiceBuilder::new()
            .handler(Arc::new(EntryCleanupHandler::unreferenced_paths(
                Arc::clone(&repo),
                LocalPathCleaner,
            )))
            .handler(Arc::new(EntryCleanupHandler::new(
                "custom",
                EntityKind::Path,
                LifecycleType::Unreferenced,
                repo,
                LocalPathCleaner,
            )))
            .build();

        assert!(matches!(
            result,
            Err(BuildError::DuplicateHandler {
                handler,
                kind: EntityKind::Path,
                lifecycle_type: LifecycleType::Unreferenced,
            }) if handler == "custom"
        ));
    }
}
