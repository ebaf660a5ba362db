//! 型定義

/// チェック設定・状態
pub mod check;
/// コンポーネント・集約ヘルス
pub mod component;
/// プローブ結果
pub mod probe;

pub use check::{CheckInterval, CheckRecord, CheckSpec, CheckStatus, CheckStatusUpdate, HttpMethod};
pub use component::{Component, ComponentHealth, ComponentStatus};
pub use probe::{CheckOutcome, FailureKind, ProbeResult};
