//! 統合テスト用ユーティリティ

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use statuswatch::config::SchedulerConfig;
use statuswatch::db::{InMemoryStore, MonitorStore, SqliteStore};
use statuswatch::events::{MonitorEvent, MonitorEventBus};
use statuswatch::health::EndpointChecker;
use statuswatch::scheduler::BatchScheduler;
use statuswatch::types::check::{CheckInterval, CheckSpec, CheckStatusUpdate};
use tempfile::TempDir;
use tokio::sync::broadcast;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// テスト用のスケジューラ設定
pub fn scheduler_config(concurrency_limit: usize) -> SchedulerConfig {
    SchedulerConfig {
        concurrency_limit,
        ..SchedulerConfig::default()
    }
}

/// 監視対象一式
pub struct Harness {
    pub store: Arc<dyn MonitorStore>,
    pub bus: Arc<MonitorEventBus>,
    pub scheduler: BatchScheduler,
}

impl Harness {
    /// 実HTTPプローブを使うスケジューラを組み立てる
    pub fn new(store: Arc<dyn MonitorStore>, concurrency_limit: usize) -> Self {
        let bus = Arc::new(MonitorEventBus::new());
        let prober = Arc::new(EndpointChecker::new().expect("failed to build http client"));
        let scheduler = BatchScheduler::new(
            store.clone(),
            prober,
            bus.clone(),
            scheduler_config(concurrency_limit),
        );
        Self {
            store,
            bus,
            scheduler,
        }
    }

    pub fn in_memory(concurrency_limit: usize) -> Self {
        Self::new(Arc::new(InMemoryStore::new()), concurrency_limit)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.bus.subscribe()
    }

    /// 前回チェック日時を1間隔以上前に戻し、次のサイクルで再びdueにする
    pub async fn make_due(&self, check_id: Uuid) {
        let record = self
            .store
            .get_check(check_id)
            .await
            .unwrap()
            .expect("check not registered");
        let status = record.last_status.expect("check never probed");
        let past = Utc::now()
            - chrono::Duration::seconds(record.spec.interval.as_secs() as i64 + 1);
        self.store
            .update_check_status(
                check_id,
                CheckStatusUpdate {
                    last_status: status,
                    last_checked_at: past,
                },
            )
            .await
            .unwrap();
    }
}

/// 一時ディレクトリ上のSQLiteストアを作成
pub async fn sqlite_store() -> (TempDir, Arc<SqliteStore>) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let url = format!("sqlite:{}", dir.path().join("statuswatch.db").display());
    let store = SqliteStore::connect(&url)
        .await
        .expect("failed to open sqlite store");
    (dir, Arc::new(store))
}

/// 指定パスに固定レスポンスを返すモックを登録
pub async fn mount_response(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

/// 1分間隔・短いタイムアウトのチェック設定
pub fn check(name: &str, url: String) -> CheckSpec {
    let mut spec = CheckSpec::new(name, url);
    spec.interval = CheckInterval::OneMinute;
    spec.timeout_ms = 2_000;
    spec
}

/// 受信済みイベントをすべて取り出す
pub fn drain(rx: &mut broadcast::Receiver<MonitorEvent>) -> Vec<MonitorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// 条件を満たすまでポーリングする
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
