//! エンドポイントプローブ
//!
//! 1件のチェック設定に対するHTTPプローブと、その結果の分類

pub mod endpoint_checker;

pub use endpoint_checker::{EndpointChecker, Probe};
