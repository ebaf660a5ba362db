//! ステータス集約
//!
//! コンポーネントに属する各チェックの最新ステータス（二値）から、
//! コンポーネントの集約ステータスを導出する。
//!
//! 判定順（最初に一致したものを採用）:
//! 1. チェックなし → `unknown`
//! 2. どのチェックもまだ結果なし → `unknown`
//! 3. 全チェック `up` → `operational`
//! 4. 全チェック `down` → `major_outage`
//! 5. 一部が `down` → `partial_outage`
//! 6. それ以外（`up` と未チェックの混在） → `degraded`
//!
//! `maintenance` は外部から設定されるもので、導出されることはない。

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::common::error::{MonitorError, MonitorResult};
use crate::db::MonitorStore;
use crate::events::StatusTransition;
use crate::types::check::CheckStatus;
use crate::types::component::{ComponentHealth, ComponentStatus};
use crate::types::probe::ProbeResult;

/// チェックステータスの集合からコンポーネントステータスを導出
pub fn derive_status(statuses: &[Option<CheckStatus>]) -> ComponentStatus {
    if statuses.is_empty() {
        return ComponentStatus::Unknown;
    }

    let total = statuses.len();
    let up = statuses
        .iter()
        .filter(|s| **s == Some(CheckStatus::Up))
        .count();
    let down = statuses
        .iter()
        .filter(|s| **s == Some(CheckStatus::Down))
        .count();

    if up + down == 0 {
        ComponentStatus::Unknown
    } else if up == total {
        ComponentStatus::Operational
    } else if down == total {
        ComponentStatus::MajorOutage
    } else if down > 0 {
        ComponentStatus::PartialOutage
    } else {
        ComponentStatus::Degraded
    }
}

/// メンテナンス中のコンポーネントに対する扱い
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaintenancePolicy {
    /// メンテナンス中は導出結果で上書きしない
    #[default]
    Respect,
    /// 全チェック停止（`major_outage`）のときだけメンテナンスを上書きする
    MajorOutageOverrides,
}

impl MaintenancePolicy {
    /// 保存済みステータスと導出結果から、保存すべきステータスを決める
    pub fn resolve(self, previous: ComponentStatus, derived: ComponentStatus) -> ComponentStatus {
        match (previous, self) {
            (ComponentStatus::Maintenance, Self::MajorOutageOverrides)
                if derived == ComponentStatus::MajorOutage =>
            {
                derived
            }
            (ComponentStatus::Maintenance, _) => ComponentStatus::Maintenance,
            _ => derived,
        }
    }

    /// MaintenancePolicyを文字列に変換
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Respect => "respect",
            Self::MajorOutageOverrides => "major_outage_overrides",
        }
    }
}

impl FromStr for MaintenancePolicy {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "respect" => Ok(Self::Respect),
            "major_outage_overrides" | "override" => Ok(Self::MajorOutageOverrides),
            other => Err(MonitorError::Config(format!(
                "unknown maintenance policy: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for MaintenancePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// コンポーネントヘルスの再計算
///
/// ヘルスを書き換える唯一の経路。保存値と異なる場合だけ書き込み、
/// そのときに限り遷移を返す。読み取りから書き込みまでは直列化される。
#[derive(Clone)]
pub struct StatusAggregator {
    store: Arc<dyn MonitorStore>,
    policy: MaintenancePolicy,
    write_lock: Arc<Mutex<()>>,
}

impl StatusAggregator {
    /// 新しいアグリゲーターを作成
    pub fn new(store: Arc<dyn MonitorStore>, policy: MaintenancePolicy) -> Self {
        Self {
            store,
            policy,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// 適用中のメンテナンスポリシー
    pub fn policy(&self) -> MaintenancePolicy {
        self.policy
    }

    /// コンポーネントのヘルスを再計算
    pub async fn recompute(
        &self,
        component_id: Uuid,
        trigger: &ProbeResult,
    ) -> MonitorResult<Option<StatusTransition>> {
        let _write = self.write_lock.lock().await;
        let current = self
            .store
            .get_component_health(component_id)
            .await?
            .ok_or(MonitorError::ComponentNotFound(component_id))?;
        let statuses = self.store.get_component_check_statuses(component_id).await?;
        let derived = derive_status(&statuses);
        let next = self.policy.resolve(current.status, derived);

        if next == current.status {
            if derived != next {
                tracing::debug!(
                    component_id = %component_id,
                    derived = %derived,
                    "Component in maintenance, derived status not applied"
                );
            }
            return Ok(None);
        }

        let health = ComponentHealth {
            component_id,
            status: next,
            updated_at: Utc::now(),
        };
        self.store.set_component_health(&health).await?;

        Ok(Some(StatusTransition {
            component_id,
            previous: current.status,
            next,
            triggering_check_id: trigger.check_id,
            response_time_ms: trigger.response_time_ms,
            error_message: trigger.error_message().map(str::to_string),
            occurred_at: health.updated_at,
        }))
    }
}
