//! PagingCleanupService - 全 handler の backlog を 1 回ずつ走査する
//!
//! # カーソル型ページング
//! offset ではなく「最後に見た id」をカーソルにします。処理した entry は
//! DELETED / FAILED に変わるので offset だと結果集合がずれて取りこぼしが出ますが、
//! `id > cursor` で次ページを取れば、走査開始時に due だった entry は
//! 1 回の実行で高々 1 回だけ試行されます。FAILED が永続的に失敗しても
//! カーソルは必ず進むので、無限ループになりません。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::Instrument;

use super::handler::CleanupHandler;
use super::report::{CleanupReport, HandlerReport};
use crate::domain::EntryId;
use crate::ports::{IdGenerator, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum CleanupServiceError {
    #[error("handler '{handler}' aborted: {source}")]
    Repository {
        handler: String,
        #[source]
        source: RepositoryError,
    },

    #[error("handler '{handler}' task failed: {message}")]
    HandlerTask { handler: String, message: String },
}

/// Consumer side orchestrator.
///
/// Built through [`CleanupServiceBuilder`](super::CleanupServiceBuilder).
pub struct PagingCleanupService {
    pub(crate) handlers: Vec<Arc<dyn CleanupHandler>>,
    pub(crate) page_size: usize,
    pub(crate) dry_run: bool,
    pub(crate) parallel: bool,
    pub(crate) id_generator: Arc<dyn IdGenerator>,
}

impl PagingCleanupService {
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Runs every handler over the entries due at `now`.
    ///
    /// A repository error aborts the invocation. With parallel handlers the
    /// other handlers still run to completion before the error is returned.
    pub async fn clean_up(&self, now: DateTime<Utc>) -> Result<CleanupReport, CleanupServiceError> {
        let run_id = self.id_generator.generate_run_id();
        let span = tracing::info_span!("cleanup", %run_id, dry_run = self.dry_run);

        async move {
            tracing::info!(
                handlers = self.handlers.len(),
                page_size = self.page_size,
                "cleanup started"
            );
            let handlers = if self.parallel {
                self.run_parallel(now).await?
            } else {
                self.run_sequential(now).await?
            };

            let report = CleanupReport {
                run_id,
                started_at: now,
                dry_run: self.dry_run,
                handlers,
            };
            tracing::info!(
                scanned = report.scanned(),
                deleted = report.deleted(),
                failed = report.failed(),
                "cleanup finished"
            );
            Ok::<_, CleanupServiceError>(report)
        }
        .instrument(span)
        .await
    }

    async fn run_sequential(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<HandlerReport>, CleanupServiceError> {
        let mut reports = Vec::with_capacity(self.handlers.len());
        for handler in &self.handlers {
            let report = scan(handler.as_ref(), now, self.page_size, self.dry_run)
                .await
                .map_err(|source| CleanupServiceError::Repository {
                    handler: handler.name().to_string(),
                    source,
                })?;
            reports.push(report);
        }
        Ok(reports)
    }

    async fn run_parallel(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<HandlerReport>, CleanupServiceError> {
        let mut joins = Vec::with_capacity(self.handlers.len());
        for handler in &self.handlers {
            let handler = Arc::clone(handler);
            let (page_size, dry_run) = (self.page_size, self.dry_run);
            let join = tokio::spawn(
                async move { scan(handler.as_ref(), now, page_size, dry_run).await }
                    .in_current_span(),
            );
            joins.push(join);
        }

        // Join everything before reporting the first error.
        let mut reports = Vec::with_capacity(joins.len());
        let mut first_error = None;
        for (handler, join) in self.handlers.iter().zip(joins) {
            let error = match join.await {
                Ok(Ok(report)) => {
                    reports.push(report);
                    continue;
                }
                Ok(Err(source)) => CleanupServiceError::Repository {
                    handler: handler.name().to_string(),
                    source,
                },
                Err(join_error) => CleanupServiceError::HandlerTask {
                    handler: handler.name().to_string(),
                    message: join_error.to_string(),
                },
            };
            tracing::error!(handler = handler.name(), error = %error, "handler aborted");
            first_error.get_or_insert(error);
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(reports),
        }
    }
}

/// Pages through one handler's backlog until an empty page comes back.
async fn scan(
    handler: &dyn CleanupHandler,
    now: DateTime<Utc>,
    page_size: usize,
    dry_run: bool,
) -> Result<HandlerReport, RepositoryError> {
    let span = tracing::info_span!(
        "scan",
        handler = handler.name(),
        kind = %handler.kind(),
        lifecycle = %handler.lifecycle_type()
    );

    async move {
        let mut report =
            HandlerReport::new(handler.name(), handler.kind(), handler.lifecycle_type());
        let mut cursor: Option<EntryId> = None;

        loop {
            let page = handler.find_page(now, cursor, page_size).await?;
            let Some(last) = page.last() else {
                break;
            };
            let next = advance(cursor, last.id())?;

            tracing::info!(page = report.pages + 1, entries = page.len(), "processing page");
            let outcome = handler.process_page(page, now, dry_run).await?;
            report.absorb(outcome);
            cursor = Some(next);
        }

        tracing::info!(
            pages = report.pages,
            scanned = report.scanned,
            deleted = report.deleted,
            failed = report.failed,
            "scan finished"
        );
        Ok::<_, RepositoryError>(report)
    }
    .instrument(span)
    .await
}

/// The cursor must move strictly forward, otherwise the scan would not end.
fn advance(cursor: Option<EntryId>, last: Option<EntryId>) -> Result<EntryId, RepositoryError> {
    match (cursor, last) {
        (_, None) => Err(RepositoryError::OperationFailed(
            "eligible page contains an entry without id".to_string(),
        )),
        (Some(cursor), Some(last)) if last <= cursor => Err(RepositoryError::OperationFailed(
            format!("page cursor did not advance past {cursor}"),
        )),
        (_, Some(last)) => Ok(last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{CleanupServiceBuilder, EntryCleanupHandler};
    use crate::domain::{HousekeepingEntry, HousekeepingStatus, LifecycleType};
    use crate::impls::InMemoryRepository;
    use crate::ports::{
        Cleaner, CleanupError, EligibleQuery, FixedClock, HousekeepingRepository, UlidGenerator,
    };
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::collections::HashSet;
    use std::sync::Mutex;

    const FOO: &str = "s3://some_foo";
    const BAR: &str = "s3://some_bar";
    const FOOBAR: &str = "s3://some_foobar";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn due_path(path: &str) -> HousekeepingEntry {
        entry_with_status(path, HousekeepingStatus::Scheduled)
    }

    fn entry_with_status(path: &str, status: HousekeepingStatus) -> HousekeepingEntry {
        HousekeepingEntry::builder()
            .database_name("database")
            .table_name("table")
            .path(path)
            .status(status)
            .creation_timestamp(now() - Duration::days(3))
            .cleanup_delay(Duration::days(3))
            .lifecycle_type(LifecycleType::Unreferenced)
            .build()
            .unwrap()
    }

    /// Records every call and fails for the configured paths.
    #[derive(Clone, Default)]
    struct RecordingCleaner {
        calls: Arc<Mutex<Vec<String>>>,
        failing: Arc<HashSet<String>>,
    }

    impl RecordingCleaner {
        fn failing(paths: &[&str]) -> Self {
            Self {
                calls: Arc::default(),
                failing: Arc::new(paths.iter().map(|p| p.to_string()).collect()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Cleaner for RecordingCleaner {
        async fn cleanup(&self, entry: &HousekeepingEntry) -> Result<(), CleanupError> {
            let location = entry.location();
            self.calls.lock().unwrap().push(location.clone());
            if self.failing.contains(&location) {
                Err(CleanupError::Other(format!("cannot delete {location}")))
            } else {
                Ok(())
            }
        }
    }

    async fn repository_with(paths: &[&str]) -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        for path in paths {
            repo.save(due_path(path)).await.unwrap();
        }
        repo
    }

    fn service(
        repo: &InMemoryRepository,
        cleaner: RecordingCleaner,
        page_size: usize,
        dry_run: bool,
    ) -> PagingCleanupService {
        CleanupServiceBuilder::new()
            .page_size(page_size)
            .dry_run(dry_run)
            .id_generator(Arc::new(UlidGenerator::new(FixedClock::new(now()))))
            .handler(Arc::new(EntryCleanupHandler::unreferenced_paths(
                Arc::new(repo.clone()),
                cleaner,
            )))
            .build()
            .unwrap()
    }

    fn status_of(entries: &[HousekeepingEntry], path: &str) -> (HousekeepingStatus, u32) {
        let entry = entries
            .iter()
            .find(|e| e.path() == Some(path))
            .unwrap();
        (entry.status(), entry.cleanup_attempts())
    }

    #[tokio::test]
    async fn three_entries_over_two_pages_are_deleted_once() {
        let repo = repository_with(&[FOO, BAR, FOOBAR]).await;
        let cleaner = RecordingCleaner::default();
        let service = service(&repo, cleaner.clone(), 2, false);

        let report = service.clean_up(now()).await.unwrap();

        assert_eq!(cleaner.calls(), vec![FOO, BAR, FOOBAR]);
        let entries = repo.snapshot().await;
        for path in [FOO, BAR, FOOBAR] {
            assert_eq!(status_of(&entries, path), (HousekeepingStatus::Deleted, 1));
        }
        assert!(entries.iter().all(|e| e.modified_timestamp() == now()));
        assert_eq!(report.handlers[0].pages, 2);
        assert_eq!(report.deleted(), 3);

        service.clean_up(now()).await.unwrap();
        assert_eq!(cleaner.calls().len(), 3);
    }

    #[tokio::test]
    async fn failed_entries_are_retried_in_stable_order() {
        let repo = InMemoryRepository::new();
        repo.save(entry_with_status(FOO, HousekeepingStatus::Scheduled))
            .await
            .unwrap();
        repo.save(entry_with_status(BAR, HousekeepingStatus::Failed))
            .await
            .unwrap();
        let cleaner = RecordingCleaner::default();

        service(&repo, cleaner.clone(), 1, false)
            .clean_up(now())
            .await
            .unwrap();

        assert_eq!(cleaner.calls(), vec![FOO, BAR]);
        let entries = repo.snapshot().await;
        assert_eq!(status_of(&entries, FOO), (HousekeepingStatus::Deleted, 1));
        assert_eq!(status_of(&entries, BAR), (HousekeepingStatus::Deleted, 1));
    }

    #[tokio::test]
    async fn deleted_entries_are_skipped() {
        let repo = InMemoryRepository::new();
        repo.save(entry_with_status(FOO, HousekeepingStatus::Scheduled))
            .await
            .unwrap();
        repo.save(entry_with_status(BAR, HousekeepingStatus::Failed))
            .await
            .unwrap();
        repo.save(entry_with_status(FOOBAR, HousekeepingStatus::Deleted))
            .await
            .unwrap();
        let cleaner = RecordingCleaner::default();

        service(&repo, cleaner.clone(), 2, false)
            .clean_up(now() + Duration::days(365))
            .await
            .unwrap();

        assert_eq!(cleaner.calls(), vec![FOO, BAR]);
        let entries = repo.snapshot().await;
        assert_eq!(status_of(&entries, FOOBAR), (HousekeepingStatus::Deleted, 0));
    }

    #[tokio::test]
    async fn failure_does_not_stop_the_scan() {
        let repo = repository_with(&[FOO, BAR]).await;
        let cleaner = RecordingCleaner::failing(&[FOO]);

        let report = service(&repo, cleaner.clone(), 1, false)
            .clean_up(now())
            .await
            .unwrap();

        assert_eq!(cleaner.calls(), vec![FOO, BAR]);
        let entries = repo.snapshot().await;
        assert_eq!(status_of(&entries, FOO), (HousekeepingStatus::Failed, 1));
        assert_eq!(status_of(&entries, BAR), (HousekeepingStatus::Deleted, 1));
        assert_eq!(report.deleted(), 1);
        assert_eq!(report.failed(), 1);
    }

    #[tokio::test]
    async fn permanent_failures_get_one_attempt_per_invocation() {
        let repo = repository_with(&[FOO, BAR, FOOBAR]).await;
        let cleaner = RecordingCleaner::failing(&[FOO, BAR, FOOBAR]);
        let service = service(&repo, cleaner.clone(), 1, false);

        for invocation in 1..=5u32 {
            let report = service.clean_up(now()).await.unwrap();
            assert_eq!(report.failed(), 3);

            let entries = repo.snapshot().await;
            for path in [FOO, BAR, FOOBAR] {
                assert_eq!(
                    status_of(&entries, path),
                    (HousekeepingStatus::Failed, invocation)
                );
            }
        }
        assert_eq!(cleaner.calls().len(), 15);
    }

    #[tokio::test]
    async fn dry_run_never_mutates() {
        let repo = repository_with(&[FOO, BAR, FOOBAR]).await;
        let before = repo.snapshot().await;
        let cleaner = RecordingCleaner::default();
        let service = service(&repo, cleaner.clone(), 1, true);

        for _ in 0..3 {
            let report = service.clean_up(now()).await.unwrap();
            assert!(report.dry_run);
            assert_eq!(report.scanned(), 3);
            assert_eq!(report.handlers[0].pages, 3);
        }

        assert!(cleaner.calls().is_empty());
        let entries = repo.snapshot().await;
        assert_eq!(entries, before);
        for path in [FOO, BAR, FOOBAR] {
            assert_eq!(status_of(&entries, path), (HousekeepingStatus::Scheduled, 0));
        }
    }

    #[tokio::test]
    async fn entries_not_yet_due_are_skipped() {
        let repo = repository_with(&[FOO]).await;
        let later = HousekeepingEntry::builder()
            .database_name("database")
            .table_name("table")
            .path(BAR)
            .creation_timestamp(now())
            .cleanup_delay(Duration::days(3))
            .lifecycle_type(LifecycleType::Unreferenced)
            .build()
            .unwrap();
        repo.save(later).await.unwrap();
        let cleaner = RecordingCleaner::default();

        service(&repo, cleaner.clone(), 10, false)
            .clean_up(now())
            .await
            .unwrap();

        assert_eq!(cleaner.calls(), vec![FOO]);
    }

    #[tokio::test]
    async fn parallel_handlers_are_isolated() {
        let repo = repository_with(&[FOO]).await;
        let table = HousekeepingEntry::builder()
            .database_name("database")
            .table_name("table")
            .creation_timestamp(now() - Duration::days(30))
            .cleanup_delay(Duration::days(30))
            .lifecycle_type(LifecycleType::Expired)
            .build()
            .unwrap();
        repo.save(table).await.unwrap();

        let paths = RecordingCleaner::failing(&[FOO]);
        let tables = RecordingCleaner::default();
        let service = CleanupServiceBuilder::new()
            .page_size(5)
            .parallel(true)
            .handler(Arc::new(EntryCleanupHandler::unreferenced_paths(
                Arc::new(repo.clone()),
                paths.clone(),
            )))
            .handler(Arc::new(EntryCleanupHandler::expired_tables(
                Arc::new(repo.clone()),
                tables.clone(),
            )))
            .build()
            .unwrap();

        let report = service.clean_up(now()).await.unwrap();

        assert_eq!(paths.calls(), vec![FOO]);
        assert_eq!(tables.calls(), vec!["database.table"]);
        assert_eq!(report.handlers.len(), 2);
        assert_eq!(report.handlers[0].failed, 1);
        assert_eq!(report.handlers[1].deleted, 1);
    }

    /// Serves pages normally but refuses every write.
    struct ReadOnlyRepository(InMemoryRepository);

    #[async_trait]
    impl HousekeepingRepository for ReadOnlyRepository {
        async fn find_eligible(
            &self,
            query: &EligibleQuery,
        ) -> Result<Vec<HousekeepingEntry>, RepositoryError> {
            self.0.find_eligible(query).await
        }

        async fn save(
            &self,
            _entry: HousekeepingEntry,
        ) -> Result<HousekeepingEntry, RepositoryError> {
            Err(RepositoryError::Unavailable("read-only".into()))
        }

        async fn find_all(&self) -> Result<Vec<HousekeepingEntry>, RepositoryError> {
            self.0.find_all().await
        }
    }

    #[tokio::test]
    async fn repository_error_aborts_the_invocation() {
        let repo = repository_with(&[FOO, BAR]).await;
        let cleaner = RecordingCleaner::default();
        let service = CleanupServiceBuilder::new()
            .page_size(1)
            .handler(Arc::new(EntryCleanupHandler::unreferenced_paths(
                Arc::new(ReadOnlyRepository(repo.clone())),
                cleaner.clone(),
            )))
            .build()
            .unwrap();

        let err = service.clean_up(now()).await.unwrap_err();

        assert!(matches!(
            err,
            CleanupServiceError::Repository {
                ref handler,
                source: RepositoryError::Unavailable(_),
            } if handler == "unreferenced-paths"
        ));
        assert_eq!(cleaner.calls(), vec![FOO]);
    }

    #[tokio::test]
    async fn parallel_handlers_all_finish_before_an_error_is_returned() {
        let repo = repository_with(&[FOO]).await;
        let table = HousekeepingEntry::builder()
            .database_name("database")
            .table_name("table")
            .creation_timestamp(now() - Duration::days(30))
            .cleanup_delay(Duration::days(30))
            .lifecycle_type(LifecycleType::Expired)
            .build()
            .unwrap();
        repo.save(table).await.unwrap();

        let paths = RecordingCleaner::default();
        let tables = RecordingCleaner::default();
        let service = CleanupServiceBuilder::new()
            .page_size(5)
            .parallel(true)
            .handler(Arc::new(EntryCleanupHandler::unreferenced_paths(
                Arc::new(ReadOnlyRepository(repo.clone())),
                paths.clone(),
            )))
            .handler(Arc::new(EntryCleanupHandler::expired_tables(
                Arc::new(repo.clone()),
                tables.clone(),
            )))
            .build()
            .unwrap();

        let err = service.clean_up(now()).await.unwrap_err();

        assert!(matches!(
            err,
            CleanupServiceError::Repository { ref handler, .. } if handler == "unreferenced-paths"
        ));
        assert_eq!(paths.calls(), vec![FOO]);
        assert_eq!(tables.calls(), vec!["database.table"]);
        let entries = repo.snapshot().await;
        let table = entries.iter().find(|e| e.path().is_none()).unwrap();
        assert_eq!(table.status(), HousekeepingStatus::Deleted);
        assert_eq!(status_of(&entries, FOO), (HousekeepingStatus::Scheduled, 0));
    }

    #[test]
    fn cursor_must_advance() {
        assert_eq!(advance(None, Some(EntryId::new(1))).unwrap(), EntryId::new(1));
        assert_eq!(
            advance(Some(EntryId::new(1)), Some(EntryId::new(4))).unwrap(),
            EntryId::new(4)
        );
        assert!(advance(Some(EntryId::new(4)), Some(EntryId::new(4))).is_err());
        assert!(advance(None, None).is_err());
    }
}
