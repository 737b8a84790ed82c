//! `beekeeper` - schedule and clean up data-lake leftovers from the command line.
//!
//! State lives in a JSON store file. Paths are deleted on the local
//! filesystem and tables under a local warehouse directory. Cleanup passes
//! reload the store first and merge their results back when they finish.

mod store;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use beekeeper_core::app::{CleanupLoop, PagingCleanupService};
use beekeeper_core::config::BeekeeperConfig;
use beekeeper_core::domain::{
    EntityKind, HousekeepingEntry, HousekeepingStatus, LifecycleType, ListenerEvent,
};
use beekeeper_core::impls::{InMemoryRepository, LocalPathCleaner, WarehouseTableCleaner};
use beekeeper_core::ports::{Clock, SystemClock, UlidGenerator};
use beekeeper_core::scheduler::SchedulerService;

use crate::store::StoreSync;

/// Data-lake housekeeping.
#[derive(Debug, Parser)]
#[command(name = "beekeeper")]
#[command(about = "Schedules and deletes unreferenced and expired data")]
#[command(version)]
struct Cli {
    /// JSON config file. Defaults apply when omitted.
    #[arg(long, env = "BEEKEEPER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// JSON store holding the housekeeping entries.
    #[arg(long, env = "BEEKEEPER_STORE", default_value = "beekeeper-store.json", global = true)]
    store: PathBuf,

    /// Warehouse directory holding `<db>.db/<table>` table directories.
    #[arg(long, env = "BEEKEEPER_WAREHOUSE", default_value = "warehouse", global = true)]
    warehouse: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Translate metastore events (JSON lines) into scheduled entries.
    Schedule {
        /// File with one listener event per line.
        #[arg(long)]
        events: PathBuf,
    },

    /// Run a single cleanup pass and print its report.
    Cleanup(CleanupArgs),

    /// Run cleanup passes periodically until Ctrl-C.
    Run {
        #[command(flatten)]
        cleanup: CleanupArgs,

        /// Seconds between passes.
        #[arg(long, env = "BEEKEEPER_INTERVAL_SECS")]
        interval_secs: Option<u64>,
    },

    /// Print entry counts by lifecycle, kind and status.
    Status,
}

#[derive(Debug, Args)]
struct CleanupArgs {
    /// Log what would be deleted without deleting or updating anything.
    #[arg(long, env = "BEEKEEPER_DRY_RUN")]
    dry_run: bool,

    /// Entries per page.
    #[arg(long, env = "BEEKEEPER_PAGE_SIZE")]
    page_size: Option<usize>,

    /// Run handlers concurrently.
    #[arg(long, env = "BEEKEEPER_PARALLEL_HANDLERS")]
    parallel: bool,
}

impl CleanupArgs {
    fn apply(&self, config: &mut BeekeeperConfig) {
        if self.dry_run {
            config.cleanup.dry_run = true;
        }
        if let Some(page_size) = self.page_size {
            config.cleanup.page_size = page_size;
        }
        if self.parallel {
            config.cleanup.parallel_handlers = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => BeekeeperConfig::load(path)?,
        None => BeekeeperConfig::default(),
    };

    match &cli.command {
        Commands::Schedule { events } => schedule(&cli, &config, events).await,
        Commands::Cleanup(args) => {
            args.apply(&mut config);
            config.validate().context("invalid cleanup options")?;
            cleanup(&cli, &config).await
        }
        Commands::Run {
            cleanup,
            interval_secs,
        } => {
            cleanup.apply(&mut config);
            if let Some(interval_secs) = interval_secs {
                config.cleanup.interval_secs = *interval_secs;
            }
            config.validate().context("invalid cleanup options")?;
            run(&cli, &config).await
        }
        Commands::Status => status(&cli).await,
    }
}

async fn schedule(cli: &Cli, config: &BeekeeperConfig, events: &Path) -> Result<()> {
    let repository = store::load(&cli.store).await?;
    let scheduler = SchedulerService::new(
        config.translators()?,
        Arc::new(repository.clone()),
        Arc::new(SystemClock),
    );

    let text = tokio::fs::read_to_string(events)
        .await
        .with_context(|| format!("failed to read events from {}", events.display()))?;

    let mut summary = ScheduleSummary::default();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = index + 1;
        let event: ListenerEvent = serde_json::from_str(line)
            .with_context(|| format!("{}:{line_no}: invalid listener event", events.display()))?;
        summary.events += 1;
        let saved = scheduler
            .schedule(&event)
            .await
            .with_context(|| format!("{}:{line_no}: scheduling failed", events.display()))?;
        summary.scheduled += saved.len();
    }

    store::save(&cli.store, &repository).await?;
    print_json(&summary)
}

async fn cleanup(cli: &Cli, config: &BeekeeperConfig) -> Result<()> {
    let sync = StoreSync::open(&cli.store).await?;
    let service = cleanup_service(cli, config, sync.repository())?;

    let outcome = service.clean_up(SystemClock.now()).await;
    // Attempts recorded before an abort are still real.
    sync.persist().await?;
    let report = outcome.context("cleanup pass aborted")?;
    print_json(&report)
}

async fn run(cli: &Cli, config: &BeekeeperConfig) -> Result<()> {
    let sync = Arc::new(StoreSync::open(&cli.store).await?);
    let service = cleanup_service(cli, config, sync.repository())?;

    tracing::info!(
        interval_secs = config.cleanup.interval_secs,
        store = %cli.store.display(),
        "starting cleanup loop"
    );
    let cleanup_loop = CleanupLoop::spawn_with_hooks(
        Arc::new(service),
        Arc::new(SystemClock),
        config.interval(),
        sync,
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("shutdown requested");
    cleanup_loop.shutdown_and_join().await;
    Ok(())
}

async fn status(cli: &Cli) -> Result<()> {
    let repository = store::load(&cli.store).await?;
    print_json(&StatusSummary::from_entries(&repository.snapshot().await))
}

fn cleanup_service(
    cli: &Cli,
    config: &BeekeeperConfig,
    repository: &InMemoryRepository,
) -> Result<PagingCleanupService> {
    let service = config
        .cleanup_service(
            Arc::new(repository.clone()),
            Arc::new(LocalPathCleaner::new()),
            Arc::new(WarehouseTableCleaner::new(&cli.warehouse)),
            Arc::new(UlidGenerator::new(SystemClock)),
        )
        .context("failed to build cleanup service")?;
    Ok(service)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{json}");
    Ok(())
}

#[derive(Debug, Default, Serialize)]
struct ScheduleSummary {
    events: usize,
    scheduled: usize,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
struct StatusRow {
    lifecycle_type: LifecycleType,
    kind: EntityKind,
    status: HousekeepingStatus,
    count: usize,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
struct StatusSummary {
    total: usize,
    rows: Vec<StatusRow>,
}

impl StatusSummary {
    fn from_entries(entries: &[HousekeepingEntry]) -> Self {
        type Key = (LifecycleType, EntityKind, &'static str);
        let mut counts: BTreeMap<Key, (HousekeepingStatus, usize)> = BTreeMap::new();
        for entry in entries {
            let key = (entry.lifecycle_type(), entry.kind(), entry.status().as_str());
            counts.entry(key).or_insert((entry.status(), 0)).1 += 1;
        }
        Self {
            total: entries.len(),
            rows: counts
                .into_iter()
                .map(|((lifecycle_type, kind, _), (status, count))| StatusRow {
                    lifecycle_type,
                    kind,
                    status,
                    count,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beekeeper_core::domain::AttemptOutcome;
    use chrono::{Duration, TimeZone, Utc};

    fn entry(path: &str, lifecycle_type: LifecycleType) -> HousekeepingEntry {
        HousekeepingEntry::builder()
            .database_name("database")
            .table_name("table")
            .path(path)
            .creation_timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .cleanup_delay(Duration::days(3))
            .lifecycle_type(lifecycle_type)
            .build()
            .unwrap()
    }

    #[test]
    fn cli_parses_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "beekeeper",
            "cleanup",
            "--dry-run",
            "--page-size",
            "10",
            "--store",
            "/tmp/store.json",
        ])
        .unwrap();

        assert_eq!(cli.store, PathBuf::from("/tmp/store.json"));
        let Commands::Cleanup(args) = cli.command else {
            panic!("expected cleanup");
        };
        let mut config = BeekeeperConfig::default();
        args.apply(&mut config);
        assert!(config.cleanup.dry_run);
        assert_eq!(config.cleanup.page_size, 10);
        assert!(!config.cleanup.parallel_handlers);
    }

    #[test]
    fn status_counts_by_lifecycle_kind_and_status() {
        let at = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        let entries = vec![
            entry("s3://some_foo", LifecycleType::Unreferenced),
            entry("s3://some_bar", LifecycleType::Unreferenced)
                .record_attempt(AttemptOutcome::Deleted, at),
            entry("s3://some_foobar", LifecycleType::Unreferenced),
            entry("s3://expired", LifecycleType::Expired),
        ];

        let summary = StatusSummary::from_entries(&entries);

        assert_eq!(summary.total, 4);
        assert_eq!(
            summary.rows,
            vec![
                StatusRow {
                    lifecycle_type: LifecycleType::Unreferenced,
                    kind: EntityKind::Path,
                    status: HousekeepingStatus::Deleted,
                    count: 1,
                },
                StatusRow {
                    lifecycle_type: LifecycleType::Unreferenced,
                    kind: EntityKind::Path,
                    status: HousekeepingStatus::Scheduled,
                    count: 2,
                },
                StatusRow {
                    lifecycle_type: LifecycleType::Expired,
                    kind: EntityKind::Path,
                    status: HousekeepingStatus::Scheduled,
                    count: 1,
                },
            ]
        );
    }
}
