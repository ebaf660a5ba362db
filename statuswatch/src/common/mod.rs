//! 共通定義

/// エラー型
pub mod error;

pub use error::{MonitorError, MonitorResult};
