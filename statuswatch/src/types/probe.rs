//! プローブ結果型定義
//!
//! エンドポイントチェッカー1回分の出力。ログとして追記されるのみで、
//! 作成後に変更されることはない。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::common::error::MonitorError;
use crate::types::check::CheckStatus;

/// プローブ失敗の分類
///
/// アラート文面がこの分類に依存するため、種別を増やす場合も既存の
/// 文字列表現は変更しないこと。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 接続拒否
    ConnectionRefused,
    /// 名前解決失敗
    DnsResolution,
    /// 接続リセット
    ConnectionReset,
    /// タイムアウト
    Timeout,
    /// TLS証明書の期限切れ
    CertificateExpired,
    /// TLS検証失敗
    TlsVerification,
    /// 期待外のステータスコード
    UnexpectedStatus,
    /// キーワード不一致
    KeywordNotFound,
    /// ステータスコードとキーワードの両方が不一致
    UnexpectedStatusAndKeyword,
    /// レスポンスなし（その他の通信エラー）
    NoResponse,
    /// プローブ自体を実行できなかった
    Internal,
}

impl FailureKind {
    /// FailureKindを文字列に変換
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionRefused => "connection_refused",
            Self::DnsResolution => "dns_resolution",
            Self::ConnectionReset => "connection_reset",
            Self::Timeout => "timeout",
            Self::CertificateExpired => "certificate_expired",
            Self::TlsVerification => "tls_verification",
            Self::UnexpectedStatus => "unexpected_status",
            Self::KeywordNotFound => "keyword_not_found",
            Self::UnexpectedStatusAndKeyword => "unexpected_status_and_keyword",
            Self::NoResponse => "no_response",
            Self::Internal => "internal",
        }
    }

    /// エンドポイントが応答した上での判定失敗か
    pub fn is_response_mismatch(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedStatus | Self::KeywordNotFound | Self::UnexpectedStatusAndKeyword
        )
    }
}

impl FromStr for FailureKind {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "connection_refused" => Self::ConnectionRefused,
            "dns_resolution" => Self::DnsResolution,
            "connection_reset" => Self::ConnectionReset,
            "timeout" => Self::Timeout,
            "certificate_expired" => Self::CertificateExpired,
            "tls_verification" => Self::TlsVerification,
            "unexpected_status" => Self::UnexpectedStatus,
            "keyword_not_found" => Self::KeywordNotFound,
            "unexpected_status_and_keyword" => Self::UnexpectedStatusAndKeyword,
            "no_response" => Self::NoResponse,
            "internal" => Self::Internal,
            other => {
                return Err(MonitorError::Validation(format!(
                    "unknown failure kind: {other}"
                )))
            }
        })
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// プローブの判定結果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// 成功
    Success,
    /// 失敗
    Failure {
        /// 失敗分類
        kind: FailureKind,
        /// エラーメッセージ
        message: String,
    },
}

/// プローブ結果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProbeResult {
    /// チェックID
    pub check_id: Uuid,
    /// 判定結果
    pub outcome: CheckOutcome,
    /// 応答時間（ミリ秒）。レスポンスを受信できなかった場合は`None`
    pub response_time_ms: Option<u64>,
    /// 受信したステータスコード
    pub status_code: Option<u16>,
    /// チェック日時
    pub checked_at: DateTime<Utc>,
}

impl ProbeResult {
    /// 成功結果を作成
    pub fn success(check_id: Uuid, status_code: u16, response_time_ms: u64) -> Self {
        Self {
            check_id,
            outcome: CheckOutcome::Success,
            response_time_ms: Some(response_time_ms),
            status_code: Some(status_code),
            checked_at: Utc::now(),
        }
    }

    /// 失敗結果を作成
    pub fn failure(
        check_id: Uuid,
        kind: FailureKind,
        message: impl Into<String>,
        status_code: Option<u16>,
        response_time_ms: Option<u64>,
    ) -> Self {
        Self {
            check_id,
            outcome: CheckOutcome::Failure {
                kind,
                message: message.into(),
            },
            response_time_ms,
            status_code,
            checked_at: Utc::now(),
        }
    }

    /// チェック日時を上書き（履歴の再構築用）
    pub fn with_checked_at(mut self, checked_at: DateTime<Utc>) -> Self {
        self.checked_at = checked_at;
        self
    }

    /// 成功したか
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CheckOutcome::Success)
    }

    /// 二値ステータス
    pub fn status(&self) -> CheckStatus {
        CheckStatus::from_success(self.is_success())
    }

    /// 失敗分類（成功時は`None`）
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            CheckOutcome::Success => None,
            CheckOutcome::Failure { kind, .. } => Some(*kind),
        }
    }

    /// エラーメッセージ（成功時は`None`）
    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            CheckOutcome::Success => None,
            CheckOutcome::Failure { message, .. } => Some(message.as_str()),
        }
    }
}
