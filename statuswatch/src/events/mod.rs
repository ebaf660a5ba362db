//! 監視イベントバス
//!
//! チェック単位のアラートとコンポーネントのステータス遷移を
//! 購読者にブロードキャストするための基盤。配送手段（メール・Webhook等）は
//! 購読者側の責務。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::notifier::Notifier;
use crate::types::check::CheckStatus;
use crate::types::component::ComponentStatus;
use crate::types::probe::FailureKind;

/// イベントバスのチャネル容量
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// チェック単位のアラート（up⇄downの反転）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckAlert {
    /// チェックID
    pub check_id: Uuid,
    /// チェック名
    pub check_name: String,
    /// 所属コンポーネントID
    pub component_id: Option<Uuid>,
    /// 直前のステータス
    pub previous: CheckStatus,
    /// 現在のステータス
    pub current: CheckStatus,
    /// 応答時間（ミリ秒）
    pub response_time_ms: Option<u64>,
    /// 受信したステータスコード
    pub status_code: Option<u16>,
    /// 失敗分類
    pub failure_kind: Option<FailureKind>,
    /// エラーメッセージ
    pub error_message: Option<String>,
    /// 発生日時（最新プローブのチェック日時）
    pub occurred_at: DateTime<Utc>,
}

/// コンポーネントのステータス遷移
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusTransition {
    /// コンポーネントID
    pub component_id: Uuid,
    /// 旧ステータス
    pub previous: ComponentStatus,
    /// 新ステータス
    pub next: ComponentStatus,
    /// 再計算のきっかけとなったチェックID
    pub triggering_check_id: Uuid,
    /// きっかけとなったプローブの応答時間
    pub response_time_ms: Option<u64>,
    /// きっかけとなったプローブのエラーメッセージ
    pub error_message: Option<String>,
    /// 発生日時
    pub occurred_at: DateTime<Utc>,
}

/// 監視イベント
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum MonitorEvent {
    /// チェックのup/down反転
    CheckAlert(CheckAlert),
    /// コンポーネントのステータス変化
    ComponentStatusChanged(StatusTransition),
}

/// 監視イベントバス
#[derive(Clone)]
pub struct MonitorEventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl Default for MonitorEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorEventBus {
    /// 新しいイベントバスを作成
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// イベントバスを購読
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    /// イベントを発行
    ///
    /// 購読者がいない場合でもエラーにはならない
    pub fn publish(&self, event: MonitorEvent) {
        // 購読者がいない場合は送信に失敗するが、無視する
        let _ = self.sender.send(event);
    }

    /// 現在の購読者数を取得
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Notifier for MonitorEventBus {
    fn dispatch(&self, event: MonitorEvent) {
        self.publish(event);
    }
}

/// Arc でラップされたイベントバス
pub type SharedEventBus = Arc<MonitorEventBus>;

/// 共有可能なイベントバスを作成
pub fn create_shared_event_bus() -> SharedEventBus {
    Arc::new(MonitorEventBus::new())
}

/// イベントをログに書き出す購読者を起動
///
/// バスが閉じられるまで動作する。
pub fn spawn_log_listener(bus: &MonitorEventBus) -> tokio::task::JoinHandle<()> {
    let mut receiver = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event listener lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &MonitorEvent) {
    match event {
        MonitorEvent::CheckAlert(alert) if alert.current == CheckStatus::Down => {
            tracing::warn!(
                check_id = %alert.check_id,
                check_name = %alert.check_name,
                failure_kind = ?alert.failure_kind,
                error = alert.error_message.as_deref().unwrap_or(""),
                "Check went down"
            );
        }
        MonitorEvent::CheckAlert(alert) => {
            tracing::info!(
                check_id = %alert.check_id,
                check_name = %alert.check_name,
                response_time_ms = ?alert.response_time_ms,
                "Check recovered"
            );
        }
        MonitorEvent::ComponentStatusChanged(transition) if transition.next.is_outage() => {
            tracing::warn!(
                component_id = %transition.component_id,
                previous = %transition.previous,
                next = %transition.next,
                triggering_check_id = %transition.triggering_check_id,
                "Component status changed"
            );
        }
        MonitorEvent::ComponentStatusChanged(transition) => {
            tracing::info!(
                component_id = %transition.component_id,
                previous = %transition.previous,
                next = %transition.next,
                triggering_check_id = %transition.triggering_check_id,
                "Component status changed"
            );
        }
    }
}
