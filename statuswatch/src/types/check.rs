//! チェック型定義
//!
//! 監視対象エンドポイント1件分の設定（[`CheckSpec`]）と、
//! ストアが保持するスケジューリング状態（[`CheckRecord`]）

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::common::error::MonitorError;
use crate::types::probe::ProbeResult;

/// デフォルトのプローブタイムアウト（ミリ秒）
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// プローブタイムアウトの上限（ミリ秒）
pub const MAX_TIMEOUT_MS: u64 = 120_000;

pub(crate) fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

pub(crate) fn default_expected_status_codes() -> Vec<u16> {
    vec![200]
}

pub(crate) fn default_enabled() -> bool {
    true
}

/// HTTPメソッド
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    #[default]
    Get,
    /// HEAD
    Head,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// OPTIONS
    Options,
}

impl HttpMethod {
    /// HttpMethodを文字列に変換
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }

    /// reqwestのメソッドに変換
    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Head => reqwest::Method::HEAD,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
            Self::Options => reqwest::Method::OPTIONS,
        }
    }
}

impl FromStr for HttpMethod {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            other => Err(MonitorError::Validation(format!(
                "unsupported HTTP method: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// チェック間隔
///
/// 許可された固定値（30秒/1分/5分/10分/30分/1時間）のみ。
/// シリアライズ時は秒数で表現する。
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(try_from = "u64", into = "u64")]
pub enum CheckInterval {
    /// 30秒
    ThirtySeconds,
    /// 1分
    #[default]
    OneMinute,
    /// 5分
    FiveMinutes,
    /// 10分
    TenMinutes,
    /// 30分
    ThirtyMinutes,
    /// 1時間
    OneHour,
}

impl CheckInterval {
    /// 許可されている全間隔（短い順）
    pub const ALL: [CheckInterval; 6] = [
        Self::ThirtySeconds,
        Self::OneMinute,
        Self::FiveMinutes,
        Self::TenMinutes,
        Self::ThirtyMinutes,
        Self::OneHour,
    ];

    /// 秒数を取得
    pub fn as_secs(self) -> u64 {
        match self {
            Self::ThirtySeconds => 30,
            Self::OneMinute => 60,
            Self::FiveMinutes => 300,
            Self::TenMinutes => 600,
            Self::ThirtyMinutes => 1_800,
            Self::OneHour => 3_600,
        }
    }

    /// std::time::Durationとして取得
    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.as_secs())
    }

    /// chrono::Durationとして取得（時刻計算用）
    pub fn as_chrono(self) -> chrono::Duration {
        chrono::Duration::seconds(self.as_secs() as i64)
    }

    /// 秒数から間隔を取得（許可外の値は`None`）
    pub fn from_secs(secs: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.as_secs() == secs)
    }
}

impl TryFrom<u64> for CheckInterval {
    type Error = MonitorError;

    fn try_from(secs: u64) -> Result<Self, Self::Error> {
        Self::from_secs(secs).ok_or_else(|| {
            MonitorError::Validation(format!(
                "interval must be one of 30, 60, 300, 600, 1800, 3600 seconds (got {secs})"
            ))
        })
    }
}

impl From<CheckInterval> for u64 {
    fn from(interval: CheckInterval) -> Self {
        interval.as_secs()
    }
}

/// チェックの最新ステータス（二値）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// 稼働中
    Up,
    /// 停止中
    Down,
}

impl CheckStatus {
    /// プローブの成否から変換
    pub fn from_success(success: bool) -> Self {
        if success {
            Self::Up
        } else {
            Self::Down
        }
    }

    /// CheckStatusを文字列に変換
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl FromStr for CheckStatus {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(MonitorError::Validation(format!(
                "unknown check status: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 監視対象エンドポイントの設定
///
/// 設定管理側で作成され、監視コアからは読み取り専用として扱う。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckSpec {
    /// チェックID
    pub id: Uuid,
    /// 表示名（一意）
    pub name: String,
    /// プローブ先URL
    pub url: String,
    /// HTTPメソッド
    #[serde(default)]
    pub method: HttpMethod,
    /// タイムアウト（ミリ秒）
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// 成功とみなすステータスコード
    #[serde(default = "default_expected_status_codes")]
    pub expected_status_codes: Vec<u16>,
    /// レスポンスボディに含まれるべきキーワード
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    /// 追加リクエストヘッダー
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// リクエストボディ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// チェック間隔
    #[serde(default)]
    pub interval: CheckInterval,
    /// 所属コンポーネントID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<Uuid>,
    /// 有効フラグ
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl CheckSpec {
    /// デフォルト設定（GET、10秒、200のみ成功、1分間隔）で作成
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            url: url.into(),
            method: HttpMethod::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            expected_status_codes: default_expected_status_codes(),
            keyword: None,
            headers: BTreeMap::new(),
            body: None,
            interval: CheckInterval::default(),
            component_id: None,
            enabled: true,
        }
    }

    /// HTTPメソッドを設定
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// タイムアウトを設定
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// 成功とみなすステータスコードを設定
    pub fn with_expected_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.expected_status_codes = codes.into_iter().collect();
        self
    }

    /// 必須キーワードを設定
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    /// リクエストヘッダーを追加
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// リクエストボディを設定
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// チェック間隔を設定
    pub fn with_interval(mut self, interval: CheckInterval) -> Self {
        self.interval = interval;
        self
    }

    /// 所属コンポーネントを設定
    pub fn with_component(mut self, component_id: Uuid) -> Self {
        self.component_id = Some(component_id);
        self
    }

    /// タイムアウトをDurationで取得
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// ステータスコードが期待値に含まれるか
    pub fn expects_status(&self, code: u16) -> bool {
        self.expected_status_codes.contains(&code)
    }

    /// 設定値を検証
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.name.trim().is_empty() {
            return Err(MonitorError::Validation(
                "check name must not be empty".to_string(),
            ));
        }

        let url = reqwest::Url::parse(&self.url).map_err(|e| {
            MonitorError::Validation(format!("check '{}' has invalid url: {e}", self.name))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(MonitorError::Validation(format!(
                "check '{}' must use http or https (got {})",
                self.name,
                url.scheme()
            )));
        }

        if self.timeout_ms == 0 || self.timeout_ms > MAX_TIMEOUT_MS {
            return Err(MonitorError::Validation(format!(
                "check '{}' timeout must be between 1 and {MAX_TIMEOUT_MS} ms",
                self.name
            )));
        }

        if self.expected_status_codes.is_empty() {
            return Err(MonitorError::Validation(format!(
                "check '{}' must expect at least one status code",
                self.name
            )));
        }
        if let Some(code) = self
            .expected_status_codes
            .iter()
            .find(|c| !(100..=599).contains(*c))
        {
            return Err(MonitorError::Validation(format!(
                "check '{}' expects invalid status code {code}",
                self.name
            )));
        }

        Ok(())
    }
}

/// ストアが保持するチェックの状態
///
/// 設定（[`CheckSpec`]）に最新ステータスと最終チェック日時を加えたもの。
/// Due判定はこの型に対して行う。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckRecord {
    /// チェック設定
    pub spec: CheckSpec,
    /// 最新ステータス（未チェックの場合は`None`）
    pub last_status: Option<CheckStatus>,
    /// 最終チェック日時
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl CheckRecord {
    /// 未チェック状態のレコードを作成
    pub fn new(spec: CheckSpec) -> Self {
        Self {
            spec,
            last_status: None,
            last_checked_at: None,
        }
    }

    /// 次回チェック予定日時（未チェックの場合は`None`）
    pub fn next_due_at(&self) -> Option<DateTime<Utc>> {
        self.last_checked_at
            .map(|last| last + self.spec.interval.as_chrono())
    }
}

/// チェック状態の更新内容
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckStatusUpdate {
    /// 最新ステータス
    pub last_status: CheckStatus,
    /// 最終チェック日時
    pub last_checked_at: DateTime<Utc>,
}

impl CheckStatusUpdate {
    /// サイクルがチェックを選んだ時刻を最終チェック日時として更新内容を作成
    pub fn scheduled(result: &ProbeResult, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            last_status: result.status(),
            last_checked_at: scheduled_at,
        }
    }
}
