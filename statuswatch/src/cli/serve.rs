//! serve サブコマンド
//!
//! 監視デーモンを起動します。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use tracing::{info, warn};

use crate::catalog::MonitorCatalog;
use crate::config::{self, SchedulerConfig};
use crate::db::{MonitorStore, SqliteStore};
use crate::events::{self, MonitorEventBus};
use crate::health::EndpointChecker;
use crate::scheduler::ticker::IntervalTicker;
use crate::scheduler::BatchScheduler;
use crate::shutdown::{self, ShutdownController};

/// serve サブコマンドの引数
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Monitor catalog (YAML) to register at startup
    #[arg(short, long, env = "STATUSWATCH_CHECKS_FILE")]
    pub checks: Option<PathBuf>,

    /// Database URL (overrides STATUSWATCH_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,
}

impl ServeArgs {
    /// サブコマンド省略時の引数（環境変数のみから構築）
    pub fn from_env() -> Self {
        Self {
            checks: config::env_var("STATUSWATCH_CHECKS_FILE").map(PathBuf::from),
            database_url: None,
        }
    }
}

/// デーモンを実行
///
/// シグナルを受けるまで戻らない。
pub async fn execute(args: ServeArgs) -> anyhow::Result<()> {
    let config = SchedulerConfig::from_env();
    let database_url = args.database_url.unwrap_or_else(config::database_url);
    info!(database_url = %database_url, "Opening database");

    let store = Arc::new(
        SqliteStore::connect(&database_url)
            .await
            .context("failed to open database")?,
    );

    if let Some(path) = &args.checks {
        let catalog = MonitorCatalog::load(path)
            .with_context(|| format!("failed to load monitor catalog {}", path.display()))?;
        catalog
            .apply(store.as_ref())
            .await
            .context("failed to register monitor catalog")?;
    }

    let registered = store.list_checks().await?.len();
    if registered == 0 {
        warn!("No checks registered; pass --checks to load a monitor catalog");
    }

    let bus = MonitorEventBus::new();
    let listener = events::spawn_log_listener(&bus);

    let prober = Arc::new(EndpointChecker::new()?);
    let scheduler = BatchScheduler::new(store, prober, Arc::new(bus), config.clone());

    let shutdown_controller = ShutdownController::default();
    let signal_task = {
        let controller = shutdown_controller.clone();
        tokio::spawn(async move {
            shutdown::shutdown_signal(controller.clone()).await;
            controller.request_shutdown();
        })
    };

    info!(
        checks = registered,
        policy = %config.maintenance_policy,
        "statuswatch started"
    );
    scheduler
        .clone()
        .run(
            IntervalTicker::new(config.tick_interval),
            IntervalTicker::delayed(config.overdue_sweep_interval),
            shutdown_controller,
        )
        .await;

    signal_task.abort();
    // スケジューラと一緒にバスの送信側が破棄されると購読者は終了する
    drop(scheduler);
    if tokio::time::timeout(std::time::Duration::from_secs(1), listener)
        .await
        .is_err()
    {
        warn!("Event listener did not stop in time");
    }
    info!("statuswatch stopped");
    Ok(())
}
