//! インメモリストア
//!
//! テストや一時的な実行向けの[`MonitorStore`]実装。プロセス終了で内容は失われる。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::traits::MonitorStore;
use crate::common::error::{MonitorError, MonitorResult};
use crate::types::check::{CheckRecord, CheckSpec, CheckStatus, CheckStatusUpdate};
use crate::types::component::{Component, ComponentHealth, ComponentStatus};
use crate::types::probe::ProbeResult;

#[derive(Default)]
struct State {
    components: Vec<(Component, ComponentHealth)>,
    checks: Vec<CheckRecord>,
    logs: HashMap<Uuid, Vec<ProbeResult>>,
}

impl State {
    fn component_mut(&mut self, id: Uuid) -> Option<&mut (Component, ComponentHealth)> {
        self.components.iter_mut().find(|(c, _)| c.id == id)
    }

    fn check_mut(&mut self, id: Uuid) -> Option<&mut CheckRecord> {
        self.checks.iter_mut().find(|c| c.spec.id == id)
    }
}

/// インメモリの監視データストア
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// 空のストアを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 保持しているプローブログの総数
    pub async fn log_count(&self) -> usize {
        self.state.read().await.logs.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl MonitorStore for InMemoryStore {
    async fn register_component(&self, component: &Component) -> MonitorResult<Uuid> {
        let mut state = self.state.write().await;
        if let Some((existing, _)) = state
            .components
            .iter()
            .find(|(c, _)| c.name == component.name)
        {
            return Ok(existing.id);
        }
        let health = ComponentHealth::new(component.id, ComponentStatus::Unknown);
        state.components.push((component.clone(), health));
        Ok(component.id)
    }

    async fn register_check(&self, spec: &CheckSpec) -> MonitorResult<Uuid> {
        spec.validate()?;
        let mut state = self.state.write().await;
        if let Some(component_id) = spec.component_id {
            if state.component_mut(component_id).is_none() {
                return Err(MonitorError::ComponentNotFound(component_id));
            }
        }
        if let Some(existing) = state.checks.iter_mut().find(|c| c.spec.name == spec.name) {
            let id = existing.spec.id;
            existing.spec = CheckSpec {
                id,
                ..spec.clone()
            };
            return Ok(id);
        }
        state.checks.push(CheckRecord::new(spec.clone()));
        Ok(spec.id)
    }

    async fn list_components(&self) -> MonitorResult<Vec<Component>> {
        let state = self.state.read().await;
        Ok(state.components.iter().map(|(c, _)| c.clone()).collect())
    }

    async fn list_checks(&self) -> MonitorResult<Vec<CheckRecord>> {
        Ok(self.state.read().await.checks.clone())
    }

    async fn get_check(&self, check_id: Uuid) -> MonitorResult<Option<CheckRecord>> {
        let state = self.state.read().await;
        Ok(state.checks.iter().find(|c| c.spec.id == check_id).cloned())
    }

    async fn append_probe_log(&self, result: &ProbeResult) -> MonitorResult<()> {
        let mut state = self.state.write().await;
        if state.check_mut(result.check_id).is_none() {
            return Err(MonitorError::CheckNotFound(result.check_id));
        }
        state
            .logs
            .entry(result.check_id)
            .or_default()
            .push(result.clone());
        Ok(())
    }

    async fn update_check_status(
        &self,
        check_id: Uuid,
        update: CheckStatusUpdate,
    ) -> MonitorResult<()> {
        let mut state = self.state.write().await;
        let record = state
            .check_mut(check_id)
            .ok_or(MonitorError::CheckNotFound(check_id))?;
        record.last_status = Some(update.last_status);
        record.last_checked_at = Some(update.last_checked_at);
        Ok(())
    }

    async fn get_recent_logs(
        &self,
        check_id: Uuid,
        limit: usize,
    ) -> MonitorResult<Vec<ProbeResult>> {
        let state = self.state.read().await;
        Ok(state
            .logs
            .get(&check_id)
            .map(|logs| logs.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn get_component_check_statuses(
        &self,
        component_id: Uuid,
    ) -> MonitorResult<Vec<Option<CheckStatus>>> {
        let state = self.state.read().await;
        let mut checks: Vec<&CheckRecord> = state
            .checks
            .iter()
            .filter(|c| c.spec.enabled && c.spec.component_id == Some(component_id))
            .collect();
        checks.sort_by(|a, b| a.spec.name.cmp(&b.spec.name));
        Ok(checks.into_iter().map(|c| c.last_status).collect())
    }

    async fn get_component_health(
        &self,
        component_id: Uuid,
    ) -> MonitorResult<Option<ComponentHealth>> {
        let state = self.state.read().await;
        Ok(state
            .components
            .iter()
            .find(|(c, _)| c.id == component_id)
            .map(|(_, health)| *health))
    }

    async fn set_component_health(&self, health: &ComponentHealth) -> MonitorResult<()> {
        let mut state = self.state.write().await;
        let entry = state
            .component_mut(health.component_id)
            .ok_or(MonitorError::ComponentNotFound(health.component_id))?;
        entry.1 = *health;
        Ok(())
    }

    async fn cleanup_old_logs(&self, before: DateTime<Utc>) -> MonitorResult<u64> {
        let mut state = self.state.write().await;
        let mut removed = 0u64;
        for logs in state.logs.values_mut() {
            let len = logs.len();
            logs.retain(|log| log.checked_at >= before);
            removed += (len - logs.len()) as u64;
        }
        Ok(removed)
    }
}
