//! チェック反転とコンポーネント遷移の通知

use statuswatch::events::MonitorEvent;
use statuswatch::types::check::CheckStatus;
use statuswatch::types::component::{Component, ComponentStatus, ComponentHealth};
use statuswatch::types::probe::FailureKind;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::{self, Harness};

fn alerts(events: &[MonitorEvent]) -> Vec<(CheckStatus, CheckStatus)> {
    events
        .iter()
        .filter_map(|event| match event {
            MonitorEvent::CheckAlert(alert) => Some((alert.previous, alert.current)),
            _ => None,
        })
        .collect()
}

fn transitions(events: &[MonitorEvent]) -> Vec<(ComponentStatus, ComponentStatus)> {
    events
        .iter()
        .filter_map(|event| match event {
            MonitorEvent::ComponentStatusChanged(t) => Some((t.previous, t.next)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_flip_emits_one_alert_and_one_transition() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let harness = Harness::in_memory(10);
    let mut rx = harness.subscribe();
    let api = harness
        .store
        .register_component(&Component::new("API"))
        .await
        .unwrap();
    let id = harness
        .store
        .register_check(&support::check("api", format!("{}/api", server.uri())).with_component(api))
        .await
        .unwrap();

    // 初回: unknown -> operational（チェック反転はまだ履歴1件なので無し）
    harness.scheduler.run_cycle().await;
    let events = support::drain(&mut rx);
    assert!(alerts(&events).is_empty());
    assert_eq!(
        transitions(&events),
        vec![(ComponentStatus::Unknown, ComponentStatus::Operational)]
    );

    // up -> down
    harness.make_due(id).await;
    harness.scheduler.run_cycle().await;
    let events = support::drain(&mut rx);
    assert_eq!(alerts(&events), vec![(CheckStatus::Up, CheckStatus::Down)]);
    assert_eq!(
        transitions(&events),
        vec![(ComponentStatus::Operational, ComponentStatus::MajorOutage)]
    );
    let alert = events
        .iter()
        .find_map(|event| match event {
            MonitorEvent::CheckAlert(alert) => Some(alert.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(alert.check_id, id);
    assert_eq!(alert.component_id, Some(api));
    assert_eq!(alert.status_code, Some(503));
    assert_eq!(alert.failure_kind, Some(FailureKind::UnexpectedStatus));

    // dueなチェックが無いサイクルでは何も起きない
    harness.scheduler.run_cycle().await;
    assert!(support::drain(&mut rx).is_empty());

    // down -> down は通知しない
    harness.make_due(id).await;
    harness.scheduler.run_cycle().await;
    assert!(support::drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_recovery_emits_down_to_up() {
    let server = MockServer::start().await;
    support::mount_response(&server, "/svc", 500, "").await;

    let harness = Harness::in_memory(10);
    let mut rx = harness.subscribe();
    let svc = harness
        .store
        .register_component(&Component::new("Service"))
        .await
        .unwrap();
    let id = harness
        .store
        .register_check(&support::check("svc", format!("{}/svc", server.uri())).with_component(svc))
        .await
        .unwrap();

    harness.scheduler.run_cycle().await;
    support::drain(&mut rx);

    server.reset().await;
    support::mount_response(&server, "/svc", 200, "").await;
    harness.make_due(id).await;
    harness.scheduler.run_cycle().await;

    let events = support::drain(&mut rx);
    assert_eq!(alerts(&events), vec![(CheckStatus::Down, CheckStatus::Up)]);
    assert_eq!(
        transitions(&events),
        vec![(ComponentStatus::MajorOutage, ComponentStatus::Operational)]
    );
}

#[tokio::test]
async fn test_component_in_maintenance_is_not_overwritten() {
    let server = MockServer::start().await;
    support::mount_response(&server, "/down", 500, "").await;

    let harness = Harness::in_memory(10);
    let mut rx = harness.subscribe();
    let billing = harness
        .store
        .register_component(&Component::new("Billing"))
        .await
        .unwrap();
    harness
        .store
        .set_component_health(&ComponentHealth::new(billing, ComponentStatus::Maintenance))
        .await
        .unwrap();
    harness
        .store
        .register_check(
            &support::check("billing", format!("{}/down", server.uri())).with_component(billing),
        )
        .await
        .unwrap();

    harness.scheduler.run_cycle().await;

    let health = harness
        .store
        .get_component_health(billing)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(health.status, ComponentStatus::Maintenance);
    assert!(transitions(&support::drain(&mut rx)).is_empty());
}
