//! 実HTTPエンドポイントに対するサイクル実行

use std::time::Duration;

use statuswatch::types::check::CheckStatus;
use statuswatch::types::component::{Component, ComponentStatus};
use statuswatch::types::probe::FailureKind;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::{self, Harness};

#[tokio::test]
async fn test_cycle_probes_due_checks_and_aggregates_component() {
    let server = MockServer::start().await;
    support::mount_response(&server, "/ok", 200, "all systems go").await;
    support::mount_response(&server, "/broken", 500, "boom").await;

    let harness = Harness::in_memory(10);
    let web = harness
        .store
        .register_component(&Component::new("Web"))
        .await
        .unwrap();
    let ok_id = harness
        .store
        .register_check(&support::check("ok", format!("{}/ok", server.uri())).with_component(web))
        .await
        .unwrap();
    let broken_id = harness
        .store
        .register_check(
            &support::check("broken", format!("{}/broken", server.uri())).with_component(web),
        )
        .await
        .unwrap();

    let outcome = harness.scheduler.run_cycle().await;
    let report = outcome.report().expect("cycle should run");
    assert_eq!(report.due, 2);
    assert_eq!(report.processed, 2);
    assert_eq!(report.up, 1);
    assert_eq!(report.down, 1);
    assert_eq!(report.errors, 0);

    let ok = harness.store.get_check(ok_id).await.unwrap().unwrap();
    assert_eq!(ok.last_status, Some(CheckStatus::Up));
    assert!(ok.last_checked_at.is_some());

    let logs = harness.store.get_recent_logs(broken_id, 10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status_code, Some(500));
    assert_eq!(logs[0].failure_kind(), Some(FailureKind::UnexpectedStatus));
    assert!(logs[0].response_time_ms.is_some());

    let health = harness
        .store
        .get_component_health(web)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(health.status, ComponentStatus::PartialOutage);
}

#[tokio::test]
async fn test_recently_checked_checks_are_not_due() {
    let server = MockServer::start().await;
    support::mount_response(&server, "/ok", 200, "fine").await;

    let harness = Harness::in_memory(10);
    let id = harness
        .store
        .register_check(&support::check("ok", format!("{}/ok", server.uri())))
        .await
        .unwrap();

    let first = harness.scheduler.run_cycle().await;
    assert_eq!(first.report().unwrap().processed, 1);

    let second = harness.scheduler.run_cycle().await;
    assert_eq!(second.report().unwrap().due, 0);

    harness.make_due(id).await;
    let third = harness.scheduler.run_cycle().await;
    assert_eq!(third.report().unwrap().processed, 1);
    assert_eq!(harness.store.get_recent_logs(id, 10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_disabled_checks_are_skipped() {
    let server = MockServer::start().await;
    support::mount_response(&server, "/ok", 200, "fine").await;

    let harness = Harness::in_memory(10);
    let mut spec = support::check("paused", format!("{}/ok", server.uri()));
    spec.enabled = false;
    let id = harness.store.register_check(&spec).await.unwrap();

    let outcome = harness.scheduler.run_cycle().await;
    assert_eq!(outcome.report().unwrap().due, 0);
    assert!(harness.store.get_recent_logs(id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_large_batch_runs_in_chunks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(50)))
        .mount(&server)
        .await;

    let harness = Harness::in_memory(10);
    for i in 0..25 {
        harness
            .store
            .register_check(&support::check(
                &format!("check-{i:02}"),
                format!("{}/slow", server.uri()),
            ))
            .await
            .unwrap();
    }

    let outcome = harness.scheduler.run_cycle().await;
    let report = outcome.report().unwrap();
    assert_eq!(report.chunk_sizes, vec![10, 10, 5]);
    assert_eq!(report.up, 25);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 25);
}

#[tokio::test]
async fn test_keyword_mismatch_marks_check_down() {
    let server = MockServer::start().await;
    support::mount_response(&server, "/page", 200, "<h1>Maintenance</h1>").await;

    let harness = Harness::in_memory(10);
    let mut spec = support::check("homepage", format!("{}/page", server.uri()));
    spec.keyword = Some("Welcome".to_string());
    let id = harness.store.register_check(&spec).await.unwrap();

    let outcome = harness.scheduler.run_cycle().await;
    assert_eq!(outcome.report().unwrap().down, 1);

    let logs = harness.store.get_recent_logs(id, 1).await.unwrap();
    assert_eq!(logs[0].failure_kind(), Some(FailureKind::KeywordNotFound));
    assert!(logs[0].error_message().unwrap().contains("Welcome"));
}
