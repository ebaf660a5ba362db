//! SQLiteストア
//!
//! `components` / `checks` / `probe_logs` テーブルに対する[`MonitorStore`]実装。

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::migrations;
use super::traits::MonitorStore;
use crate::common::error::{MonitorError, MonitorResult};
use crate::types::check::{CheckInterval, CheckRecord, CheckSpec, CheckStatus, CheckStatusUpdate};
use crate::types::component::{Component, ComponentHealth};
use crate::types::probe::{CheckOutcome, FailureKind, ProbeResult};

/// SQLiteベースの監視データストア
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// データベースに接続し、マイグレーションを実行
    pub async fn connect(database_url: &str) -> MonitorResult<Self> {
        let pool = migrations::initialize_database(database_url).await?;
        Ok(Self { pool })
    }

    /// マイグレーション済みのプールから作成
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 接続プールへの参照
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn component_exists(&self, id: Uuid) -> MonitorResult<bool> {
        let row: Option<(String,)> = sqlx::query_as("SELECT id FROM components WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

fn to_db_time(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_id(s: &str) -> MonitorResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| MonitorError::Database(format!("Invalid id '{s}': {e}")))
}

#[async_trait]
impl MonitorStore for SqliteStore {
    async fn register_component(&self, component: &Component) -> MonitorResult<Uuid> {
        let (id,): (String,) = sqlx::query_as(
            r#"
            INSERT INTO components (id, name, status, status_updated_at)
            VALUES (?, ?, 'unknown', ?)
            ON CONFLICT(name) DO UPDATE SET name = excluded.name
            RETURNING id
            "#,
        )
        .bind(component.id.to_string())
        .bind(&component.name)
        .bind(to_db_time(Utc::now()))
        .fetch_one(&self.pool)
        .await?;
        parse_id(&id)
    }

    async fn register_check(&self, spec: &CheckSpec) -> MonitorResult<Uuid> {
        spec.validate()?;
        if let Some(component_id) = spec.component_id {
            if !self.component_exists(component_id).await? {
                return Err(MonitorError::ComponentNotFound(component_id));
            }
        }

        let expected = serde_json::to_string(&spec.expected_status_codes)?;
        let headers = serde_json::to_string(&spec.headers)?;
        let (id,): (String,) = sqlx::query_as(
            r#"
            INSERT INTO checks (
                id, name, url, method, timeout_ms, expected_status_codes,
                keyword, headers, body, interval_secs, component_id, enabled
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                url = excluded.url,
                method = excluded.method,
                timeout_ms = excluded.timeout_ms,
                expected_status_codes = excluded.expected_status_codes,
                keyword = excluded.keyword,
                headers = excluded.headers,
                body = excluded.body,
                interval_secs = excluded.interval_secs,
                component_id = excluded.component_id,
                enabled = excluded.enabled
            RETURNING id
            "#,
        )
        .bind(spec.id.to_string())
        .bind(&spec.name)
        .bind(&spec.url)
        .bind(spec.method.as_str())
        .bind(spec.timeout_ms as i64)
        .bind(&expected)
        .bind(&spec.keyword)
        .bind(&headers)
        .bind(&spec.body)
        .bind(spec.interval.as_secs() as i64)
        .bind(spec.component_id.map(|id| id.to_string()))
        .bind(spec.enabled)
        .fetch_one(&self.pool)
        .await?;
        parse_id(&id)
    }

    async fn list_components(&self) -> MonitorResult<Vec<Component>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT id, name FROM components ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter()
            .map(|(id, name)| Ok(Component { id: parse_id(&id)?, name }))
            .collect()
    }

    async fn list_checks(&self) -> MonitorResult<Vec<CheckRecord>> {
        let rows = sqlx::query_as::<_, CheckRow>(
            r#"
            SELECT id, name, url, method, timeout_ms, expected_status_codes, keyword,
                   headers, body, interval_secs, component_id, enabled,
                   last_status, last_checked_at
            FROM checks
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(CheckRecord::try_from).collect()
    }

    async fn get_check(&self, check_id: Uuid) -> MonitorResult<Option<CheckRecord>> {
        let row = sqlx::query_as::<_, CheckRow>(
            r#"
            SELECT id, name, url, method, timeout_ms, expected_status_codes, keyword,
                   headers, body, interval_secs, component_id, enabled,
                   last_status, last_checked_at
            FROM checks
            WHERE id = ?
            "#,
        )
        .bind(check_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(CheckRecord::try_from).transpose()
    }

    async fn append_probe_log(&self, result: &ProbeResult) -> MonitorResult<()> {
        sqlx::query(
            r#"
            INSERT INTO probe_logs (
                check_id, status, failure_kind, error_message,
                response_time_ms, status_code, checked_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(result.check_id.to_string())
        .bind(result.status().as_str())
        .bind(result.failure_kind().map(|k| k.as_str()))
        .bind(result.error_message())
        .bind(result.response_time_ms.map(|v| v as i64))
        .bind(result.status_code.map(i64::from))
        .bind(to_db_time(result.checked_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_check_status(
        &self,
        check_id: Uuid,
        update: CheckStatusUpdate,
    ) -> MonitorResult<()> {
        let result =
            sqlx::query("UPDATE checks SET last_status = ?, last_checked_at = ? WHERE id = ?")
                .bind(update.last_status.as_str())
                .bind(to_db_time(update.last_checked_at))
                .bind(check_id.to_string())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(MonitorError::CheckNotFound(check_id));
        }
        Ok(())
    }

    async fn get_recent_logs(
        &self,
        check_id: Uuid,
        limit: usize,
    ) -> MonitorResult<Vec<ProbeResult>> {
        let rows = sqlx::query_as::<_, ProbeLogRow>(
            r#"
            SELECT check_id, status, failure_kind, error_message,
                   response_time_ms, status_code, checked_at
            FROM probe_logs
            WHERE check_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(check_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ProbeResult::try_from).collect()
    }

    async fn get_component_check_statuses(
        &self,
        component_id: Uuid,
    ) -> MonitorResult<Vec<Option<CheckStatus>>> {
        let rows: Vec<(Option<String>,)> = sqlx::query_as(
            "SELECT last_status FROM checks WHERE component_id = ? AND enabled = 1 ORDER BY name",
        )
        .bind(component_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(status,)| status.map(|s| s.parse::<CheckStatus>()).transpose())
            .collect()
    }

    async fn get_component_health(
        &self,
        component_id: Uuid,
    ) -> MonitorResult<Option<ComponentHealth>> {
        let row: Option<(String, Option<String>)> =
            sqlx::query_as("SELECT status, status_updated_at FROM components WHERE id = ?")
                .bind(component_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(status, updated_at)| ComponentHealth {
            component_id,
            status: status.parse().unwrap_or_default(),
            updated_at: updated_at
                .as_deref()
                .and_then(parse_db_time)
                .unwrap_or_else(Utc::now),
        }))
    }

    async fn set_component_health(&self, health: &ComponentHealth) -> MonitorResult<()> {
        let result =
            sqlx::query("UPDATE components SET status = ?, status_updated_at = ? WHERE id = ?")
                .bind(health.status.as_str())
                .bind(to_db_time(health.updated_at))
                .bind(health.component_id.to_string())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(MonitorError::ComponentNotFound(health.component_id));
        }
        Ok(())
    }

    async fn cleanup_old_logs(&self, before: DateTime<Utc>) -> MonitorResult<u64> {
        let result = sqlx::query("DELETE FROM probe_logs WHERE checked_at < ?")
            .bind(to_db_time(before))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn close(&self) -> MonitorResult<()> {
        self.pool.close().await;
        tracing::debug!("SQLite pool closed");
        Ok(())
    }
}

// --- Internal Row Types ---

#[derive(sqlx::FromRow)]
struct CheckRow {
    id: String,
    name: String,
    url: String,
    method: String,
    timeout_ms: i64,
    expected_status_codes: String,
    keyword: Option<String>,
    headers: String,
    body: Option<String>,
    interval_secs: i64,
    component_id: Option<String>,
    enabled: bool,
    last_status: Option<String>,
    last_checked_at: Option<String>,
}

impl TryFrom<CheckRow> for CheckRecord {
    type Error = MonitorError;

    fn try_from(row: CheckRow) -> Result<Self, Self::Error> {
        let headers: BTreeMap<String, String> = serde_json::from_str(&row.headers)?;
        let spec = CheckSpec {
            id: parse_id(&row.id)?,
            name: row.name,
            url: row.url,
            method: row.method.parse().unwrap_or_default(),
            timeout_ms: row.timeout_ms.max(0) as u64,
            expected_status_codes: serde_json::from_str(&row.expected_status_codes)?,
            keyword: row.keyword,
            headers,
            body: row.body,
            interval: CheckInterval::from_secs(row.interval_secs.max(0) as u64)
                .unwrap_or_default(),
            component_id: row.component_id.as_deref().map(parse_id).transpose()?,
            enabled: row.enabled,
        };
        Ok(CheckRecord {
            spec,
            last_status: row
                .last_status
                .map(|s| s.parse::<CheckStatus>())
                .transpose()?,
            last_checked_at: row.last_checked_at.as_deref().and_then(parse_db_time),
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProbeLogRow {
    check_id: String,
    status: String,
    failure_kind: Option<String>,
    error_message: Option<String>,
    response_time_ms: Option<i64>,
    status_code: Option<i64>,
    checked_at: String,
}

impl TryFrom<ProbeLogRow> for ProbeResult {
    type Error = MonitorError;

    fn try_from(row: ProbeLogRow) -> Result<Self, Self::Error> {
        let outcome = match row.status.parse::<CheckStatus>()? {
            CheckStatus::Up => CheckOutcome::Success,
            CheckStatus::Down => CheckOutcome::Failure {
                kind: row
                    .failure_kind
                    .as_deref()
                    .map(str::parse)
                    .transpose()?
                    .unwrap_or(FailureKind::NoResponse),
                message: row.error_message.unwrap_or_default(),
            },
        };
        let checked_at = parse_db_time(&row.checked_at).ok_or_else(|| {
            MonitorError::Database(format!("Invalid timestamp '{}'", row.checked_at))
        })?;
        Ok(ProbeResult {
            check_id: parse_id(&row.check_id)?,
            outcome,
            response_time_ms: row.response_time_ms.map(|v| v.max(0) as u64),
            status_code: row.status_code.and_then(|v| u16::try_from(v).ok()),
            checked_at,
        })
    }
}
