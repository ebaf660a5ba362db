//! エンドポイントチェッカー
//!
//! 1件のチェック設定に対してHTTPリクエストを1回実行し、
//! 成功/失敗と失敗分類を[`ProbeResult`]として返す。
//! プローブは例外を返さず、あらゆる失敗を結果として表現する。

use async_trait::async_trait;
use reqwest::Client;
use std::error::Error as _;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::common::error::MonitorError;
use crate::types::check::CheckSpec;
use crate::types::probe::{FailureKind, ProbeResult};

/// クライアント側タイムアウトに上乗せする猶予
///
/// reqwestのタイムアウトが発火しなかった場合の最終的な打ち切り時刻。
const DEADLINE_SLACK: Duration = Duration::from_millis(250);

/// キーワード判定のために読み込むレスポンスボディの上限
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// プローブ実行の抽象
///
/// スケジューラはこのトレイト越しにプローブを呼び出す。
#[async_trait]
pub trait Probe: Send + Sync {
    /// チェックを1回実行する
    async fn probe(&self, spec: &CheckSpec) -> ProbeResult;
}

/// HTTPエンドポイントチェッカー
#[derive(Clone)]
pub struct EndpointChecker {
    client: Client,
}

impl EndpointChecker {
    /// 新しいチェッカーを作成
    pub fn new() -> Result<Self, MonitorError> {
        let client = Client::builder()
            .user_agent(concat!("statuswatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MonitorError::Http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// 既存のHTTPクライアントを使って作成
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// チェックを実行
    ///
    /// チェックのタイムアウトに猶予を加えた時刻で必ず打ち切る。
    pub async fn check(&self, spec: &CheckSpec) -> ProbeResult {
        let deadline = spec.timeout() + DEADLINE_SLACK;
        match tokio::time::timeout(deadline, self.execute(spec)).await {
            Ok(result) => result,
            Err(_) => ProbeResult::failure(
                spec.id,
                FailureKind::Timeout,
                timeout_message(spec.timeout_ms),
                None,
                None,
            ),
        }
    }

    async fn execute(&self, spec: &CheckSpec) -> ProbeResult {
        let mut request = self
            .client
            .request(spec.method.to_reqwest(), &spec.url)
            .timeout(spec.timeout());
        for (name, value) in &spec.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &spec.body {
            request = request.body(body.clone());
        }

        let started = Instant::now();
        let mut response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let kind = classify_transport_error(&e);
                debug!(check_id = %spec.id, url = %spec.url, error = %e, kind = %kind, "Probe transport error");
                return ProbeResult::failure(
                    spec.id,
                    kind,
                    failure_message(kind, spec),
                    None,
                    None,
                );
            }
        };
        let response_time_ms = started.elapsed().as_millis() as u64;
        let status_code = response.status().as_u16();

        let body = match &spec.keyword {
            Some(_) => match read_body(&mut response).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    let kind = classify_transport_error(&e);
                    return ProbeResult::failure(
                        spec.id,
                        kind,
                        failure_message(kind, spec),
                        Some(status_code),
                        Some(response_time_ms),
                    );
                }
            },
            None => None,
        };

        evaluate_response(spec, status_code, body.as_deref(), response_time_ms)
    }
}

#[async_trait]
impl Probe for EndpointChecker {
    async fn probe(&self, spec: &CheckSpec) -> ProbeResult {
        self.check(spec).await
    }
}

/// ボディを先頭から[`MAX_BODY_BYTES`]まで読む（文字コードの解釈はしない）
async fn read_body(response: &mut reqwest::Response) -> Result<Vec<u8>, reqwest::Error> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = MAX_BODY_BYTES - body.len();
        body.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if body.len() >= MAX_BODY_BYTES {
            break;
        }
    }
    Ok(body)
}

/// バイト列に部分列が含まれるか
fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}

/// 受信済みレスポンスを判定
///
/// ステータスコードとキーワードの両方を評価し、両方失敗した場合は
/// メッセージを連結する。
pub fn evaluate_response(
    spec: &CheckSpec,
    status_code: u16,
    body: Option<&[u8]>,
    response_time_ms: u64,
) -> ProbeResult {
    let status_ok = spec.expects_status(status_code);
    let keyword_missing = match (&spec.keyword, body) {
        (Some(keyword), Some(body)) => !contains_bytes(body, keyword.as_bytes()),
        (Some(_), None) => true,
        (None, _) => false,
    };

    let status_message = format!("Unexpected status code {status_code}");
    let keyword_message = spec
        .keyword
        .as_deref()
        .map(|kw| format!("Keyword \"{kw}\" not found in response body"));

    let failure = match (status_ok, keyword_missing) {
        (true, false) => None,
        (false, false) => Some((FailureKind::UnexpectedStatus, status_message)),
        (true, true) => Some((
            FailureKind::KeywordNotFound,
            keyword_message.unwrap_or_default(),
        )),
        (false, true) => Some((
            FailureKind::UnexpectedStatusAndKeyword,
            format!("{status_message}; {}", keyword_message.unwrap_or_default()),
        )),
    };

    match failure {
        None => ProbeResult::success(spec.id, status_code, response_time_ms),
        Some((kind, message)) => ProbeResult::failure(
            spec.id,
            kind,
            message,
            Some(status_code),
            Some(response_time_ms),
        ),
    }
}

/// 通信エラーを失敗分類に変換
///
/// 最上位のメッセージはリクエストURLを含むため判定に使わず、
/// `source()`の連鎖だけを見る。
pub fn classify_transport_error(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        return FailureKind::Timeout;
    }
    if err.is_builder() {
        return FailureKind::Internal;
    }

    let mut chain = String::new();
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionRefused => return FailureKind::ConnectionRefused,
                std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe => return FailureKind::ConnectionReset,
                std::io::ErrorKind::TimedOut => return FailureKind::Timeout,
                _ => {}
            }
        }
        if !chain.is_empty() {
            chain.push_str(": ");
        }
        chain.push_str(&cause.to_string());
        source = cause.source();
    }

    classify_error_text(&chain)
}

/// エラー原因の連鎖の文字列表現から失敗分類を推定
///
/// TLSの判定は名前解決・接続拒否・リセットより後に行う。
pub fn classify_error_text(text: &str) -> FailureKind {
    let text = text.to_lowercase();
    if text.contains("dns error")
        || text.contains("failed to lookup address")
        || text.contains("name or service not known")
        || text.contains("no such host")
    {
        FailureKind::DnsResolution
    } else if text.contains("connection refused") {
        FailureKind::ConnectionRefused
    } else if text.contains("connection reset") || text.contains("broken pipe") {
        FailureKind::ConnectionReset
    } else if text.contains("certificate") && text.contains("expired") {
        FailureKind::CertificateExpired
    } else if text.contains("certificate")
        || text.contains("tls")
        || text.contains("ssl")
        || text.contains("handshake")
    {
        FailureKind::TlsVerification
    } else if text.contains("timed out") {
        FailureKind::Timeout
    } else {
        FailureKind::NoResponse
    }
}

fn timeout_message(timeout_ms: u64) -> String {
    format!("Request timed out after {timeout_ms}ms")
}

fn failure_message(kind: FailureKind, spec: &CheckSpec) -> String {
    let host = reqwest::Url::parse(&spec.url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| spec.url.clone());
    match kind {
        FailureKind::ConnectionRefused => format!("Connection refused by {host}"),
        FailureKind::DnsResolution => format!("DNS resolution failed for {host}"),
        FailureKind::ConnectionReset => format!("Connection reset by {host}"),
        FailureKind::Timeout => timeout_message(spec.timeout_ms),
        FailureKind::CertificateExpired => format!("TLS certificate for {host} has expired"),
        FailureKind::TlsVerification => format!("TLS verification failed for {host}"),
        FailureKind::Internal => format!("Invalid request for {}", spec.url),
        _ => format!("No response from {host}"),
    }
}
