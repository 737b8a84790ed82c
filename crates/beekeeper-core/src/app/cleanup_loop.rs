//! CleanupLoop - 定期的に cleanup を実行する
//!
//! - `tokio::time::interval` で tick ごとに `clean_up(clock.now())`
//! - 失敗（Repository エラー）はログに残して次の tick へ
//! - `shutdown` は実行中の cleanup を中断しない（次の tick を待たないだけ）
//! - `PassHooks` があれば各 pass の前後で呼ぶ（外部ストアとの同期など）

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::cleanup_service::PagingCleanupService;
use crate::ports::{Clock, RepositoryError};

/// PassHooks は各 cleanup pass の前後に呼ばれる
///
/// # 契約
/// - `before_pass` が失敗した tick は cleanup を実行しない
/// - `after_pass` は pass が abort した場合も呼ばれる（記録済みの attempt も本物）
/// - どちらの失敗もログに残してループは継続
#[async_trait]
pub trait PassHooks: Send + Sync {
    async fn before_pass(&self) -> Result<(), RepositoryError>;

    async fn after_pass(&self) -> Result<(), RepositoryError>;
}

/// Loop handle.
/// - `request_shutdown()` で次の tick を待たずに止まる
/// - `shutdown_and_join()` で実行中の cleanup の完了を待つ
pub struct CleanupLoop {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl CleanupLoop {
    /// The first invocation runs immediately.
    pub fn spawn(
        service: Arc<PagingCleanupService>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self::start(service, clock, interval, None)
    }

    /// Like [`CleanupLoop::spawn`], with `hooks` around every pass.
    pub fn spawn_with_hooks(
        service: Arc<PagingCleanupService>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        hooks: Arc<dyn PassHooks>,
    ) -> Self {
        Self::start(service, clock, interval, Some(hooks))
    }

    fn start(
        service: Arc<PagingCleanupService>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        hooks: Option<Arc<dyn PassHooks>>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(cleanup_loop(service, clock, interval, hooks, shutdown_rx));
        Self { shutdown_tx, join }
    }

    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(err) = self.join.await {
            tracing::error!(error = %err, "cleanup loop task failed");
        }
    }
}

async fn cleanup_loop(
    service: Arc<PagingCleanupService>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    hooks: Option<Arc<dyn PassHooks>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    // sender dropped
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        if let Some(hooks) = &hooks {
            if let Err(err) = hooks.before_pass().await {
                tracing::error!(error = %err, "cleanup pass skipped");
                continue;
            }
        }

        match service.clean_up(clock.now()).await {
            Ok(report) => tracing::debug!(
                run_id = %report.run_id,
                deleted = report.deleted(),
                failed = report.failed(),
                "cleanup pass complete"
            ),
            Err(err) => tracing::error!(error = %err, "cleanup pass aborted"),
        }

        if let Some(hooks) = &hooks {
            if let Err(err) = hooks.after_pass().await {
                tracing::error!(error = %err, "failed to persist cleanup pass");
            }
        }
    }
    tracing::info!("cleanup loop stopped");
}
