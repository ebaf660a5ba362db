//! probe サブコマンド
//!
//! 1つのエンドポイントを即時にプローブし、結果をJSONで標準出力へ書き出す。
//! ストアへの記録は行わない。

use std::collections::BTreeMap;

use clap::Args;

use crate::health::EndpointChecker;
use crate::types::check::{CheckSpec, HttpMethod, DEFAULT_TIMEOUT_MS};

/// probe サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    /// Target URL (http or https)
    #[arg(long)]
    pub url: String,

    /// HTTP method
    #[arg(long, default_value = "GET", value_parser = parse_method)]
    pub method: HttpMethod,

    /// Status code counted as success (repeatable, default: 200)
    #[arg(long)]
    pub expect: Vec<u16>,

    /// Keyword the response body must contain
    #[arg(long)]
    pub keyword: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,

    /// Extra request header as "Name: value" (repeatable)
    #[arg(long)]
    pub header: Vec<String>,

    /// Request body
    #[arg(long)]
    pub body: Option<String>,
}

fn parse_method(s: &str) -> Result<HttpMethod, String> {
    s.parse().map_err(|e: crate::common::error::MonitorError| e.to_string())
}

/// "Name: value" 形式のヘッダーを分解
fn parse_header(raw: &str) -> anyhow::Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("header must look like 'Name: value', got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("header name must not be empty in '{raw}'");
    }
    Ok((name.to_string(), value.trim().to_string()))
}

impl ProbeArgs {
    /// 引数からチェック設定を組み立てる
    pub fn to_spec(&self) -> anyhow::Result<CheckSpec> {
        let headers = self
            .header
            .iter()
            .map(|raw| parse_header(raw))
            .collect::<anyhow::Result<BTreeMap<_, _>>>()?;

        let mut spec = CheckSpec::new("cli-probe", self.url.clone()).with_method(self.method);
        spec.timeout_ms = self.timeout_ms;
        if !self.expect.is_empty() {
            spec.expected_status_codes = self.expect.clone();
        }
        spec.keyword = self.keyword.clone();
        spec.headers = headers;
        spec.body = self.body.clone();
        spec.validate()?;
        Ok(spec)
    }
}

/// プローブを実行して結果を出力
///
/// 失敗判定でもコマンド自体は成功扱い（終了コードは`outcome`で判断しない）。
pub async fn execute(args: ProbeArgs) -> anyhow::Result<()> {
    let spec = args.to_spec()?;
    let checker = EndpointChecker::new()?;
    let result = checker.check(&spec).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
