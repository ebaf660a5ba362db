//! 変化検知と通知
//!
//! チェックのup/down反転とコンポーネントのステータス遷移を検知し、
//! 1回の変化につき1件のイベントを配送側に渡す。配送の再試行は行わない。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::common::error::MonitorResult;
use crate::db::MonitorStore;
use crate::events::{CheckAlert, MonitorEvent, StatusTransition};
use crate::types::check::{CheckSpec, CheckStatus};
use crate::types::probe::ProbeResult;

/// 通知の配送先
///
/// 呼び出しは投げっぱなしで、失敗を呼び出し元に返さない。
pub trait Notifier: Send + Sync {
    /// イベントを配送側に渡す
    fn dispatch(&self, event: MonitorEvent);
}

/// 新しい順の履歴から直近の反転を検出
///
/// 履歴が2件未満の場合や、直近2件のステータスが同じ場合は`None`。
pub fn detect_flip(history: &[ProbeResult]) -> Option<(CheckStatus, CheckStatus)> {
    let [current, previous, ..] = history else {
        return None;
    };
    let (previous, current) = (previous.status(), current.status());
    (previous != current).then_some((previous, current))
}

/// 変化検知器
#[derive(Clone)]
pub struct ChangeNotifier {
    store: Arc<dyn MonitorStore>,
    notifier: Arc<dyn Notifier>,
    /// チェックごとに評価済みの最新ログ日時
    last_evaluated: Arc<Mutex<HashMap<Uuid, DateTime<Utc>>>>,
}

impl ChangeNotifier {
    /// 新しい検知器を作成
    pub fn new(store: Arc<dyn MonitorStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            last_evaluated: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// チェックの反転を評価し、反転していればアラートを発行
    ///
    /// 同じログ履歴に対して再評価しても再発行しない。
    pub async fn on_potential_change(&self, spec: &CheckSpec) -> MonitorResult<Option<CheckAlert>> {
        let history = self.store.get_recent_logs(spec.id, 2).await?;
        let Some(latest) = history.first() else {
            return Ok(None);
        };

        {
            let mut evaluated = self.last_evaluated.lock().await;
            if evaluated.get(&spec.id) == Some(&latest.checked_at) {
                tracing::debug!(check_id = %spec.id, "Log history already evaluated");
                return Ok(None);
            }
            evaluated.insert(spec.id, latest.checked_at);
        }

        let Some((previous, current)) = detect_flip(&history) else {
            return Ok(None);
        };

        let alert = CheckAlert {
            check_id: spec.id,
            check_name: spec.name.clone(),
            component_id: spec.component_id,
            previous,
            current,
            response_time_ms: latest.response_time_ms,
            status_code: latest.status_code,
            failure_kind: latest.failure_kind(),
            error_message: latest.error_message().map(str::to_string),
            occurred_at: latest.checked_at,
        };
        tracing::info!(
            check_id = %spec.id,
            check_name = %spec.name,
            previous = %previous,
            current = %current,
            "Check status flipped"
        );
        self.notifier
            .dispatch(MonitorEvent::CheckAlert(alert.clone()));
        Ok(Some(alert))
    }

    /// コンポーネントのステータス遷移を通知
    ///
    /// アグリゲーターが実際に書き込んだ遷移だけが渡される。
    pub fn on_component_status_changed(&self, transition: StatusTransition) {
        tracing::info!(
            component_id = %transition.component_id,
            previous = %transition.previous,
            next = %transition.next,
            "Component status transition"
        );
        self.notifier
            .dispatch(MonitorEvent::ComponentStatusChanged(transition));
    }
}
