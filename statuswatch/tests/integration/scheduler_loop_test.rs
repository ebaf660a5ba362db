//! 実行ループとシャットダウン

use std::sync::Arc;
use std::time::Duration;

use statuswatch::db::InMemoryStore;
use statuswatch::events::MonitorEvent;
use statuswatch::scheduler::ticker;
use statuswatch::shutdown::ShutdownController;
use statuswatch::types::component::Component;
use wiremock::MockServer;

use crate::support::{self, Harness};

#[tokio::test]
async fn test_run_loop_probes_on_tick_and_stops_on_shutdown() {
    let server = MockServer::start().await;
    support::mount_response(&server, "/ok", 200, "ok").await;

    let store = Arc::new(InMemoryStore::new());
    let harness = Harness::new(store.clone(), 5);
    let mut rx = harness.subscribe();
    let web = harness
        .store
        .register_component(&Component::new("Web"))
        .await
        .unwrap();
    let id = harness
        .store
        .register_check(&support::check("ok", format!("{}/ok", server.uri())).with_component(web))
        .await
        .unwrap();

    let (tick, ticker) = ticker::manual();
    let (_sweep, sweep_ticker) = ticker::manual();
    let shutdown = ShutdownController::default();
    let handle = tokio::spawn(harness.scheduler.clone().run(
        ticker,
        sweep_ticker,
        shutdown.clone(),
    ));

    assert!(tick.fire());
    let probed = support::wait_until(Duration::from_secs(5), || {
        let store = store.clone();
        async move { store.log_count().await == 1 }
    })
    .await;
    assert!(probed, "tick should trigger one probe");

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no event received")
        .unwrap();
    assert!(matches!(event, MonitorEvent::ComponentStatusChanged(_)));

    shutdown.request_shutdown();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();

    let health = harness.scheduler.health_status();
    assert!(!health.running);
    assert_eq!(health.checks_processed, 1);
    assert!(harness.store.get_check(id).await.unwrap().unwrap().last_status.is_some());
}
