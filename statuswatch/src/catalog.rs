//! 監視対象カタログ
//!
//! YAMLファイルで宣言されたコンポーネントとチェックを読み込み、
//! 名前をキーにストアへ登録（upsert）する。
//!
//! ```yaml
//! components:
//!   - name: Website
//! checks:
//!   - name: homepage
//!     url: https://example.com/
//!     keyword: Welcome
//!     interval: 60
//!     component: Website
//! ```

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::common::error::{MonitorError, MonitorResult};
use crate::db::MonitorStore;
use crate::types::check::{CheckInterval, CheckSpec, HttpMethod};
use crate::types::component::{Component, ComponentHealth, ComponentStatus};

/// カタログ上のコンポーネント
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CatalogComponent {
    /// 表示名
    pub name: String,
    /// メンテナンス中として扱うか
    #[serde(default)]
    pub maintenance: bool,
}

/// カタログ上のチェック
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CatalogCheck {
    /// 表示名
    pub name: String,
    /// プローブ先URL
    pub url: String,
    /// HTTPメソッド
    #[serde(default)]
    pub method: HttpMethod,
    /// タイムアウト（ミリ秒）
    #[serde(default = "crate::types::check::default_timeout_ms")]
    pub timeout_ms: u64,
    /// 成功とみなすステータスコード
    #[serde(default = "crate::types::check::default_expected_status_codes")]
    pub expected_status_codes: Vec<u16>,
    /// 必須キーワード
    #[serde(default)]
    pub keyword: Option<String>,
    /// 追加ヘッダー
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// リクエストボディ
    #[serde(default)]
    pub body: Option<String>,
    /// チェック間隔（秒）
    #[serde(default)]
    pub interval: CheckInterval,
    /// 所属コンポーネント名
    #[serde(default)]
    pub component: Option<String>,
    /// 有効フラグ
    #[serde(default = "crate::types::check::default_enabled")]
    pub enabled: bool,
}

/// 監視対象カタログ
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct MonitorCatalog {
    /// コンポーネント
    #[serde(default)]
    pub components: Vec<CatalogComponent>,
    /// チェック
    #[serde(default)]
    pub checks: Vec<CatalogCheck>,
}

/// 登録結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogSummary {
    /// 登録したコンポーネント数
    pub components: usize,
    /// 登録したチェック数
    pub checks: usize,
}

impl MonitorCatalog {
    /// YAMLファイルから読み込む
    pub fn load(path: impl AsRef<Path>) -> MonitorResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            MonitorError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    /// YAML文字列から読み込み、名前の重複と参照を検証する
    pub fn from_yaml_str(text: &str) -> MonitorResult<Self> {
        let catalog: Self = serde_yaml::from_str(text)?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> MonitorResult<()> {
        let mut components = HashSet::new();
        for component in &self.components {
            if component.name.trim().is_empty() {
                return Err(MonitorError::Config(
                    "component name must not be empty".to_string(),
                ));
            }
            if !components.insert(component.name.as_str()) {
                return Err(MonitorError::Config(format!(
                    "duplicate component '{}'",
                    component.name
                )));
            }
        }

        let mut checks = HashSet::new();
        for check in &self.checks {
            if !checks.insert(check.name.as_str()) {
                return Err(MonitorError::Config(format!(
                    "duplicate check '{}'",
                    check.name
                )));
            }
            if let Some(component) = &check.component {
                if !components.contains(component.as_str()) {
                    return Err(MonitorError::Config(format!(
                        "check '{}' references unknown component '{}'",
                        check.name, component
                    )));
                }
            }
        }
        Ok(())
    }

    /// ストアに登録する
    ///
    /// `maintenance: true` のコンポーネントはメンテナンス状態にし、
    /// `false` に戻されたものは次のプローブで再計算されるよう`unknown`に戻す。
    pub async fn apply(&self, store: &dyn MonitorStore) -> MonitorResult<CatalogSummary> {
        let mut component_ids: HashMap<&str, Uuid> = HashMap::new();
        for entry in &self.components {
            let id = store
                .register_component(&Component::new(entry.name.clone()))
                .await?;
            component_ids.insert(entry.name.as_str(), id);

            let current = store
                .get_component_health(id)
                .await?
                .map(|h| h.status)
                .unwrap_or_default();
            let wanted = match (entry.maintenance, current) {
                (true, ComponentStatus::Maintenance) => None,
                (true, _) => Some(ComponentStatus::Maintenance),
                (false, ComponentStatus::Maintenance) => Some(ComponentStatus::Unknown),
                (false, _) => None,
            };
            if let Some(status) = wanted {
                info!(component = %entry.name, status = %status, "Applying maintenance flag");
                store
                    .set_component_health(&ComponentHealth::new(id, status))
                    .await?;
            }
        }

        for entry in &self.checks {
            let component_id = match &entry.component {
                Some(name) => Some(component_ids.get(name.as_str()).copied().ok_or_else(|| {
                    MonitorError::Config(format!("unknown component '{name}'"))
                })?),
                None => None,
            };
            let spec = CheckSpec {
                id: Uuid::new_v4(),
                name: entry.name.clone(),
                url: entry.url.clone(),
                method: entry.method,
                timeout_ms: entry.timeout_ms,
                expected_status_codes: entry.expected_status_codes.clone(),
                keyword: entry.keyword.clone(),
                headers: entry.headers.clone(),
                body: entry.body.clone(),
                interval: entry.interval,
                component_id,
                enabled: entry.enabled,
            };
            store.register_check(&spec).await?;
        }

        let summary = CatalogSummary {
            components: self.components.len(),
            checks: self.checks.len(),
        };
        info!(
            components = summary.components,
            checks = summary.checks,
            "Monitor catalog applied"
        );
        Ok(summary)
    }
}
