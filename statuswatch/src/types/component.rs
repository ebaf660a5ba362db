//! コンポーネント型定義
//!
//! 複数のチェックから構成される論理サービスと、その集約ヘルス

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// コンポーネントの集約ステータス
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    /// 全チェック正常
    Operational,
    /// 一部状態不明を含む
    Degraded,
    /// 一部チェック停止
    PartialOutage,
    /// 全チェック停止
    MajorOutage,
    /// メンテナンス中（外部から設定される）
    Maintenance,
    /// 判定不能
    #[default]
    Unknown,
}

impl ComponentStatus {
    /// ComponentStatusを文字列に変換
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Operational => "operational",
            Self::Degraded => "degraded",
            Self::PartialOutage => "partial_outage",
            Self::MajorOutage => "major_outage",
            Self::Maintenance => "maintenance",
            Self::Unknown => "unknown",
        }
    }

    /// 障害扱いのステータスか
    pub fn is_outage(&self) -> bool {
        matches!(self, Self::PartialOutage | Self::MajorOutage)
    }
}

impl FromStr for ComponentStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "operational" => Self::Operational,
            "degraded" => Self::Degraded,
            "partial_outage" => Self::PartialOutage,
            "major_outage" => Self::MajorOutage,
            "maintenance" => Self::Maintenance,
            _ => Self::Unknown,
        })
    }
}

impl std::fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// コンポーネント
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Component {
    /// コンポーネントID
    pub id: Uuid,
    /// 表示名（一意）
    pub name: String,
}

impl Component {
    /// 新しいコンポーネントを作成
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// コンポーネントの現在ヘルス
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentHealth {
    /// コンポーネントID
    pub component_id: Uuid,
    /// 集約ステータス
    pub status: ComponentStatus,
    /// 最終再計算日時
    pub updated_at: DateTime<Utc>,
}

impl ComponentHealth {
    /// 現在時刻でヘルスを作成
    pub fn new(component_id: Uuid, status: ComponentStatus) -> Self {
        Self {
            component_id,
            status,
            updated_at: Utc::now(),
        }
    }
}
