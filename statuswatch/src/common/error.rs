//! エラー型定義
//!
//! 統一エラー型（thiserror使用）
//!
//! プローブ単位の失敗（接続拒否・タイムアウト・ステータス不一致など）は
//! [`crate::types::probe::CheckOutcome::Failure`] として値で表現されるため、
//! ここには含まれない。`MonitorError` はストア操作や設定読み込みなど、
//! サイクル処理そのものが失敗したケースを表す。

use thiserror::Error;
use uuid::Uuid;

/// statuswatch error type
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Check not found
    #[error("Check not found: {0}")]
    CheckNotFound(Uuid),

    /// Component not found
    #[error("Component not found: {0}")]
    ComponentNotFound(Uuid),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    Http(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MonitorError {
    /// Returns a short machine-readable label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Validation(_) => "validation",
            Self::CheckNotFound(_) => "check_not_found",
            Self::ComponentNotFound(_) => "component_not_found",
            Self::Database(_) => "database",
            Self::Http(_) => "http",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<sqlx::Error> for MonitorError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for MonitorError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Database(format!("migration failed: {err}"))
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for MonitorError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// statuswatch result type
pub type MonitorResult<T> = Result<T, MonitorError>;
