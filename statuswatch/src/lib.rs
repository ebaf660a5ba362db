//! statuswatch
//!
//! HTTPエンドポイントを定期的にプローブし、結果を記録して
//! コンポーネント単位の稼働状態を集約する監視エンジン

#![warn(missing_docs)]

/// 共通定義（エラー型）
pub mod common;

/// 型定義
pub mod types;

/// 設定管理（環境変数ヘルパー）
pub mod config;

/// ロギング初期化ユーティリティ
pub mod logging;

/// データベースアクセス
pub mod db;

/// エンドポイントプローブ
pub mod health;

/// コンポーネント状態の集約
pub mod aggregator;

/// 状態変化の検出と通知
pub mod notifier;

/// 監視イベントバス
pub mod events;

/// 期限判定とバッチスケジューラ
pub mod scheduler;

/// 監視対象カタログ（YAML）
pub mod catalog;

/// Shutdown controller
pub mod shutdown;

/// CLIインターフェース
pub mod cli;
