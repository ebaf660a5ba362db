//! Repository traitパターン定義
//!
//! 監視コアが永続化層に求める操作を抽象化する。
//! SQLite実装とインメモリ実装がこのtraitを実装する。

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::common::error::MonitorResult;
use crate::scheduler::due;
use crate::types::check::{CheckRecord, CheckSpec, CheckStatus, CheckStatusUpdate};
use crate::types::component::{Component, ComponentHealth};
use crate::types::probe::ProbeResult;

/// 監視データストア
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// コンポーネントを登録（同名があれば既存IDを返す）
    async fn register_component(&self, component: &Component) -> MonitorResult<Uuid>;

    /// チェックを登録（同名があれば設定を更新し既存IDを返す）
    ///
    /// 最新ステータスと最終チェック日時は保持される。
    async fn register_check(&self, spec: &CheckSpec) -> MonitorResult<Uuid>;

    /// コンポーネント一覧を取得
    async fn list_components(&self) -> MonitorResult<Vec<Component>>;

    /// チェック一覧を取得
    async fn list_checks(&self) -> MonitorResult<Vec<CheckRecord>>;

    /// IDでチェックを取得
    async fn get_check(&self, check_id: Uuid) -> MonitorResult<Option<CheckRecord>>;

    /// dueなチェックを取得
    async fn list_due_checks(&self, now: DateTime<Utc>) -> MonitorResult<Vec<CheckRecord>> {
        let checks = self.list_checks().await?;
        Ok(due::select_due(now, &checks).into_iter().cloned().collect())
    }

    /// 予定時刻から`grace`以上遅れているチェックを取得
    async fn list_overdue_checks(
        &self,
        now: DateTime<Utc>,
        grace: Duration,
    ) -> MonitorResult<Vec<CheckRecord>> {
        let checks = self.list_checks().await?;
        Ok(due::select_overdue(now, &checks, grace)
            .into_iter()
            .cloned()
            .collect())
    }

    /// プローブ結果をログに追記
    async fn append_probe_log(&self, result: &ProbeResult) -> MonitorResult<()>;

    /// チェックの最新ステータスを更新
    async fn update_check_status(
        &self,
        check_id: Uuid,
        update: CheckStatusUpdate,
    ) -> MonitorResult<()>;

    /// 直近のプローブログを新しい順に取得
    async fn get_recent_logs(&self, check_id: Uuid, limit: usize)
        -> MonitorResult<Vec<ProbeResult>>;

    /// コンポーネントに属する有効なチェックの最新ステータスを取得
    ///
    /// 未チェックのものは`None`。
    async fn get_component_check_statuses(
        &self,
        component_id: Uuid,
    ) -> MonitorResult<Vec<Option<CheckStatus>>>;

    /// コンポーネントの現在ヘルスを取得（未登録なら`None`）
    async fn get_component_health(
        &self,
        component_id: Uuid,
    ) -> MonitorResult<Option<ComponentHealth>>;

    /// コンポーネントのヘルスを保存
    async fn set_component_health(&self, health: &ComponentHealth) -> MonitorResult<()>;

    /// `before`より古いプローブログを削除し、削除件数を返す
    async fn cleanup_old_logs(&self, before: DateTime<Utc>) -> MonitorResult<u64>;

    /// ストアを解放
    async fn close(&self) -> MonitorResult<()> {
        Ok(())
    }
}
