//! SQLiteストアを使ったエンドツーエンドの記録

use chrono::Utc;
use statuswatch::catalog::MonitorCatalog;
use statuswatch::db::{MonitorStore, SqliteStore};
use statuswatch::types::check::CheckStatus;
use statuswatch::types::component::ComponentStatus;
use wiremock::MockServer;

use crate::support::{self, Harness};

#[tokio::test]
async fn test_cycle_persists_logs_and_status() {
    let server = MockServer::start().await;
    support::mount_response(&server, "/health", 200, "ok").await;
    support::mount_response(&server, "/db", 502, "bad gateway").await;

    let (_dir, store) = support::sqlite_store().await;
    let catalog = MonitorCatalog::from_yaml_str(&format!(
        r#"
components:
  - name: Backend
checks:
  - name: health
    url: {uri}/health
    timeout_ms: 2000
    component: Backend
  - name: database
    url: {uri}/db
    timeout_ms: 2000
    component: Backend
"#,
        uri = server.uri()
    ))
    .unwrap();
    catalog.apply(store.as_ref()).await.unwrap();

    let harness = Harness::new(store.clone(), 10);
    let report = harness.scheduler.run_cycle().await;
    assert_eq!(report.report().unwrap().processed, 2);

    let checks = store.list_checks().await.unwrap();
    let database = checks.iter().find(|c| c.spec.name == "database").unwrap();
    assert_eq!(database.last_status, Some(CheckStatus::Down));
    let health = checks.iter().find(|c| c.spec.name == "health").unwrap();
    assert_eq!(health.last_status, Some(CheckStatus::Up));

    let backend = store.list_components().await.unwrap()[0].id;
    assert_eq!(
        store
            .get_component_health(backend)
            .await
            .unwrap()
            .unwrap()
            .status,
        ComponentStatus::PartialOutage
    );

    harness.make_due(database.spec.id).await;
    harness.scheduler.run_cycle().await;
    let logs = store.get_recent_logs(database.spec.id, 10).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs[0].checked_at >= logs[1].checked_at);
    assert_eq!(logs[0].status_code, Some(502));
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let server = MockServer::start().await;
    support::mount_response(&server, "/ok", 200, "ok").await;

    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("statuswatch.db").display());

    let check_id = {
        let store = std::sync::Arc::new(SqliteStore::connect(&url).await.unwrap());
        let id = store
            .register_check(&support::check("ok", format!("{}/ok", server.uri())))
            .await
            .unwrap();
        let harness = Harness::new(store.clone(), 10);
        harness.scheduler.run_cycle().await;
        store.close().await.unwrap();
        id
    };

    let reopened = SqliteStore::connect(&url).await.unwrap();
    let record = reopened.get_check(check_id).await.unwrap().unwrap();
    assert_eq!(record.last_status, Some(CheckStatus::Up));
    assert!(reopened.list_due_checks(Utc::now()).await.unwrap().is_empty());
    assert_eq!(reopened.get_recent_logs(check_id, 5).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cleanup_old_logs_removes_expired_entries() {
    let server = MockServer::start().await;
    support::mount_response(&server, "/ok", 200, "ok").await;

    let (_dir, store) = support::sqlite_store().await;
    let id = store
        .register_check(&support::check("ok", format!("{}/ok", server.uri())))
        .await
        .unwrap();
    let harness = Harness::new(store.clone(), 10);
    harness.scheduler.run_cycle().await;

    let removed = store
        .cleanup_old_logs(Utc::now() - chrono::Duration::days(1))
        .await
        .unwrap();
    assert_eq!(removed, 0);

    let removed = store
        .cleanup_old_logs(Utc::now() + chrono::Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(store.get_recent_logs(id, 5).await.unwrap().is_empty());
}
