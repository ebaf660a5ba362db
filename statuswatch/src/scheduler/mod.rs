//! バッチスケジューラ
//!
//! 一定周期でdueなチェックを取り出し、`concurrency_limit`件ずつのチャンクに
//! 分けてプローブする。チャンク内は並列、チャンク同士は逐次に実行する。
//!
//! サイクルは再入しない。前のサイクルが終わっていない間に来たtickは
//! キューに積まずに読み捨てる。overdueスイープも同じガードを共有する。

pub mod due;
pub mod ticker;

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, TimeZone, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::aggregator::StatusAggregator;
use crate::common::error::{MonitorError, MonitorResult};
use crate::config::SchedulerConfig;
use crate::db::MonitorStore;
use crate::health::Probe;
use crate::notifier::{ChangeNotifier, Notifier};
use crate::shutdown::ShutdownController;
use crate::types::check::{CheckRecord, CheckSpec, CheckStatus, CheckStatusUpdate};
use crate::types::probe::{FailureKind, ProbeResult};

use self::ticker::Ticker;

/// 1サイクル分の集計
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// 対象チェック数
    pub due: usize,
    /// プローブを実行したチェック数
    pub processed: usize,
    /// upになったチェック数
    pub up: usize,
    /// downになったチェック数
    pub down: usize,
    /// 記録・集約・通知のいずれかで失敗したチェック数
    pub errors: usize,
    /// 実行したチャンクのサイズ（実行順）
    pub chunk_sizes: Vec<usize>,
}

/// サイクルの実行結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// 前のサイクルが実行中、または停止処理中のため実行しなかった
    Skipped,
    /// 実行した
    Completed(CycleReport),
    /// 対象チェックを取得できなかった
    Failed(String),
}

impl CycleOutcome {
    /// スキップされたか
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    /// 実行した場合の集計
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// スケジューラ自身の稼働状況
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerHealth {
    /// 実行ループが動作中か
    pub running: bool,
    /// サイクル実行中か
    pub cycle_in_flight: bool,
    /// プローブを実行したチェックの累計
    pub checks_processed: u64,
    /// チェック単位の失敗の累計
    pub check_errors: u64,
    /// 完了したサイクル数
    pub cycles_completed: u64,
    /// スキップされたtick数
    pub cycles_skipped: u64,
    /// 直近サイクルの開始日時
    pub last_cycle_started_at: Option<DateTime<Utc>>,
    /// 直近サイクルの終了日時
    pub last_cycle_finished_at: Option<DateTime<Utc>>,
    /// チャンクサイズ
    pub concurrency_limit: usize,
}

/// バッチスケジューラ
#[derive(Clone)]
pub struct BatchScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn MonitorStore>,
    prober: Arc<dyn Probe>,
    aggregator: StatusAggregator,
    notifier: ChangeNotifier,
    config: SchedulerConfig,
    cycle_in_flight: AtomicBool,
    running: AtomicBool,
    stopping: AtomicBool,
    idle: Notify,
    checks_processed: AtomicU64,
    check_errors: AtomicU64,
    cycles_completed: AtomicU64,
    cycles_skipped: AtomicU64,
    last_cycle_started_ms: AtomicI64,
    last_cycle_finished_ms: AtomicI64,
}

/// サイクル実行中フラグを保持し、dropで解放する
struct CycleGuard<'a> {
    inner: &'a Inner,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.inner.cycle_in_flight.store(false, Ordering::SeqCst);
        self.inner.idle.notify_waiters();
    }
}

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    (ms > 0)
        .then(|| Utc.timestamp_millis_opt(ms).single())
        .flatten()
}

impl BatchScheduler {
    /// 新しいスケジューラを作成
    pub fn new(
        store: Arc<dyn MonitorStore>,
        prober: Arc<dyn Probe>,
        notifier: Arc<dyn Notifier>,
        config: SchedulerConfig,
    ) -> Self {
        let aggregator = StatusAggregator::new(store.clone(), config.maintenance_policy);
        let notifier = ChangeNotifier::new(store.clone(), notifier);
        Self {
            inner: Arc::new(Inner {
                store,
                prober,
                aggregator,
                notifier,
                config,
                cycle_in_flight: AtomicBool::new(false),
                running: AtomicBool::new(false),
                stopping: AtomicBool::new(false),
                idle: Notify::new(),
                checks_processed: AtomicU64::new(0),
                check_errors: AtomicU64::new(0),
                cycles_completed: AtomicU64::new(0),
                cycles_skipped: AtomicU64::new(0),
                last_cycle_started_ms: AtomicI64::new(0),
                last_cycle_finished_ms: AtomicI64::new(0),
            }),
        }
    }

    /// 設定への参照
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// 稼働状況を取得
    pub fn health_status(&self) -> SchedulerHealth {
        let inner = &self.inner;
        SchedulerHealth {
            running: inner.running.load(Ordering::SeqCst),
            cycle_in_flight: inner.cycle_in_flight.load(Ordering::SeqCst),
            checks_processed: inner.checks_processed.load(Ordering::Relaxed),
            check_errors: inner.check_errors.load(Ordering::Relaxed),
            cycles_completed: inner.cycles_completed.load(Ordering::Relaxed),
            cycles_skipped: inner.cycles_skipped.load(Ordering::Relaxed),
            last_cycle_started_at: millis_to_datetime(
                inner.last_cycle_started_ms.load(Ordering::Relaxed),
            ),
            last_cycle_finished_at: millis_to_datetime(
                inner.last_cycle_finished_ms.load(Ordering::Relaxed),
            ),
            concurrency_limit: inner.config.concurrency_limit.max(1),
        }
    }

    /// 実行中のサイクルが終わるまで待機
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.inner.cycle_in_flight.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    fn try_begin_cycle(&self, kind: &'static str) -> Option<CycleGuard<'_>> {
        if self.inner.stopping.load(Ordering::SeqCst) {
            debug!(kind, "Scheduler stopping, not starting a new cycle");
            return None;
        }
        if self
            .inner
            .cycle_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.inner.cycles_skipped.fetch_add(1, Ordering::Relaxed);
            warn!(kind, "Previous cycle still in flight, skipping tick");
            return None;
        }
        Some(CycleGuard { inner: &self.inner })
    }

    /// dueなチェックを1サイクル分処理
    ///
    /// 前のサイクルが実行中の場合は何もせず[`CycleOutcome::Skipped`]を返す。
    /// パニック以外のエラーを呼び出し元に伝播させない。
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Some(_guard) = self.try_begin_cycle("cycle") else {
            return CycleOutcome::Skipped;
        };
        let started = Instant::now();
        let now = Utc::now();
        self.inner
            .last_cycle_started_ms
            .store(now.timestamp_millis(), Ordering::Relaxed);

        let due = match self.inner.store.list_due_checks(now).await {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "Failed to list due checks");
                self.finish_cycle();
                return CycleOutcome::Failed(e.to_string());
            }
        };

        if due.is_empty() {
            debug!("No checks due");
        }
        let report = self.process_checks(due, now).await;
        self.finish_cycle();

        info!(
            due = report.due,
            processed = report.processed,
            up = report.up,
            down = report.down,
            errors = report.errors,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Cycle completed"
        );
        CycleOutcome::Completed(report)
    }

    /// overdueなチェックを検出して即時処理
    ///
    /// 遅延はチェックごとに警告ログとして残す。保持期間を過ぎた
    /// プローブログの削除もここで行う。
    pub async fn run_overdue_sweep(&self) -> CycleOutcome {
        let Some(_guard) = self.try_begin_cycle("overdue_sweep") else {
            return CycleOutcome::Skipped;
        };
        let now = Utc::now();
        self.inner
            .last_cycle_started_ms
            .store(now.timestamp_millis(), Ordering::Relaxed);
        let grace = self.inner.config.overdue_grace();

        let overdue = match self.inner.store.list_overdue_checks(now, grace).await {
            Ok(overdue) => overdue,
            Err(e) => {
                error!(error = %e, "Failed to list overdue checks");
                self.finish_cycle();
                return CycleOutcome::Failed(e.to_string());
            }
        };

        for record in &overdue {
            let late_secs = due::overdue_by(record, now)
                .map(|d| d.num_seconds())
                .unwrap_or_default();
            warn!(
                check_id = %record.spec.id,
                check_name = %record.spec.name,
                overdue_secs = late_secs,
                grace_secs = grace.num_seconds(),
                "Check is overdue, scheduler is lagging"
            );
        }

        let report = self.process_checks(overdue, now).await;
        if report.due > 0 {
            info!(
                processed = report.processed,
                errors = report.errors,
                "Overdue sweep completed"
            );
        }

        if let Some(retention) = self.inner.config.log_retention() {
            match self.inner.store.cleanup_old_logs(now - retention).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Cleaned up old probe logs"),
                Err(e) => error!(error = %e, "Failed to cleanup old probe logs"),
            }
        }

        self.finish_cycle();
        CycleOutcome::Completed(report)
    }

    fn finish_cycle(&self) {
        self.inner.cycles_completed.fetch_add(1, Ordering::Relaxed);
        self.inner
            .last_cycle_finished_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// チェックをチャンク単位で処理
    ///
    /// `scheduled_at`はチェックを選んだ時刻。次回の期限はここから数えるため、
    /// プローブ所要時間の分だけ周期がずれることはない。
    async fn process_checks(
        &self,
        checks: Vec<CheckRecord>,
        scheduled_at: DateTime<Utc>,
    ) -> CycleReport {
        let limit = self.inner.config.concurrency_limit.max(1);
        let mut report = CycleReport {
            due: checks.len(),
            ..CycleReport::default()
        };

        for chunk in checks.chunks(limit) {
            report.chunk_sizes.push(chunk.len());

            let handles: Vec<_> = chunk
                .iter()
                .map(|record| {
                    let inner = self.inner.clone();
                    let spec = record.spec.clone();
                    tokio::spawn(async move { inner.probe_and_record(spec, scheduled_at).await })
                })
                .collect();

            // チャンク全体の完了を待ってから次へ進む
            let results = join_all(handles).await;

            for (record, joined) in chunk.iter().zip(results) {
                report.processed += 1;
                let (status, outcome) = match joined {
                    Ok(done) => done,
                    Err(e) => {
                        error!(check_id = %record.spec.id, error = %e, "Probe task failed");
                        let result = ProbeResult::failure(
                            record.spec.id,
                            FailureKind::Internal,
                            format!("Probe task failed: {e}"),
                            None,
                            None,
                        );
                        if let Err(record_err) =
                            self.inner.record(&record.spec, &result, scheduled_at).await
                        {
                            error!(
                                check_id = %record.spec.id,
                                error = %record_err,
                                "Failed to record probe task failure"
                            );
                        }
                        (CheckStatus::Down, Err(MonitorError::Internal(e.to_string())))
                    }
                };
                match status {
                    CheckStatus::Up => report.up += 1,
                    CheckStatus::Down => report.down += 1,
                }
                if let Err(e) = outcome {
                    report.errors += 1;
                    self.inner.check_errors.fetch_add(1, Ordering::Relaxed);
                    error!(
                        check_id = %record.spec.id,
                        check_name = %record.spec.name,
                        error = %e,
                        kind = e.kind(),
                        "Failed to process check"
                    );
                }
                self.inner.checks_processed.fetch_add(1, Ordering::Relaxed);
            }
        }

        report
    }

    /// ティッカーに従ってサイクルを回す
    ///
    /// 停止要求を受けると新しいサイクルを開始せず、実行中のサイクルの
    /// 完了を待ってからストアを解放して戻る。
    pub async fn run<T, S>(self, mut ticker: T, mut sweep_ticker: S, shutdown: ShutdownController)
    where
        T: Ticker,
        S: Ticker,
    {
        self.inner.running.store(true, Ordering::SeqCst);
        info!(
            tick_secs = self.inner.config.tick_interval.as_secs(),
            sweep_secs = self.inner.config.overdue_sweep_interval.as_secs(),
            concurrency_limit = self.inner.config.concurrency_limit,
            "Scheduler started"
        );

        let mut tasks = JoinSet::new();
        let mut sweep_open = true;
        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                more = ticker.tick() => {
                    if !more {
                        break;
                    }
                    let scheduler = self.clone();
                    tasks.spawn(async move {
                        scheduler.run_cycle().await;
                    });
                }
                more = sweep_ticker.tick(), if sweep_open => {
                    if !more {
                        sweep_open = false;
                        continue;
                    }
                    let scheduler = self.clone();
                    tasks.spawn(async move {
                        scheduler.run_overdue_sweep().await;
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Cycle task panicked");
                    }
                }
            }
        }

        self.inner.stopping.store(true, Ordering::SeqCst);
        self.inner.running.store(false, Ordering::SeqCst);
        info!("Scheduler stopping, waiting for in-flight work");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Cycle task panicked");
            }
        }

        if let Err(e) = self.inner.store.close().await {
            error!(error = %e, "Failed to close store");
        }
        info!("Scheduler stopped");
    }
}

impl Inner {
    async fn probe_and_record(
        self: Arc<Self>,
        spec: CheckSpec,
        scheduled_at: DateTime<Utc>,
    ) -> (CheckStatus, MonitorResult<()>) {
        let result = self.prober.probe(&spec).await;
        debug!(
            check_id = %spec.id,
            success = result.is_success(),
            response_time_ms = ?result.response_time_ms,
            "Probe finished"
        );
        let status = result.status();
        (status, self.record(&spec, &result, scheduled_at).await)
    }

    /// プローブ結果の記録から通知までを順に行う
    ///
    /// ログにはプローブ完了時刻、チェックの最終チェック日時には選択時刻を残す。
    async fn record(
        &self,
        spec: &CheckSpec,
        result: &ProbeResult,
        scheduled_at: DateTime<Utc>,
    ) -> MonitorResult<()> {
        self.store.append_probe_log(result).await?;
        self.store
            .update_check_status(spec.id, CheckStatusUpdate::scheduled(result, scheduled_at))
            .await?;
        if let Some(component_id) = spec.component_id {
            if let Some(transition) = self.aggregator.recompute(component_id, result).await? {
                self.notifier.on_component_status_changed(transition);
            }
        }
        self.notifier.on_potential_change(spec).await?;
        Ok(())
    }
}
