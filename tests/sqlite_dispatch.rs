//! SQLite store on disk, driven end to end through the HTTP gateway adapter.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use remindvisor::store::{self, EventStore};
use remindvisor::{Config, GatewayConfig, HttpGateway, NewEvent, Priority, Service};
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn db_url(dir: &TempDir) -> String {
    format!("sqlite://{}", dir.path().join("events.db").display())
}

#[tokio::test]
async fn test_events_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let due = Utc.with_ymd_and_hms(2030, 5, 1, 8, 0, 0).unwrap();
    {
        let db = store::open(&db_url(&dir)).unwrap();
        let user = db.add_user("9876543210").await.unwrap();
        db.add_event(user, NewEvent::new("Renew passport", due).with_priority(Priority::Low))
            .await
            .unwrap();
        let done = db.add_event(user, NewEvent::new("Old", due)).await.unwrap();
        db.resolve_event(user, done).await.unwrap();
    }

    let db = store::open(&db_url(&dir)).unwrap();
    let found = db.find_outstanding().await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].event.name, "Renew passport");
    assert_eq!(found[0].event.priority, Some(Priority::Low));
    assert_eq!(found[0].event.due, due);
}

#[tokio::test]
async fn test_deleted_event_is_gone() {
    let dir = tempfile::tempdir().unwrap();
    let db = store::open(&db_url(&dir)).unwrap();
    let user = db.add_user("9876543210").await.unwrap();
    let id = db.add_event(user, NewEvent::new("Temp", Utc::now())).await.unwrap();

    db.delete_event(user, id).await.unwrap();
    assert!(db.find_outstanding().await.unwrap().is_empty());
    let err = db.delete_event(user, id).await.unwrap_err();
    assert_eq!(err.as_label(), "store_not_found");
}

#[tokio::test]
async fn test_service_dispatches_from_sqlite_through_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let db = store::open(&db_url(&dir)).unwrap();
    let user = db.add_user("98765 43210").await.unwrap();
    db.add_event(
        user,
        NewEvent::new("Dentist", Utc.with_ymd_and_hms(2030, 1, 2, 9, 30, 0).unwrap())
            .with_description("Bring the x-rays"),
    )
    .await
    .unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions/reminder-session/start"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sessions/reminder-session/messages"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sessions/reminder-session/close"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let gateway = GatewayConfig {
        base_url: server.uri(),
        heartbeat: Duration::ZERO,
        ..GatewayConfig::default()
    };
    let cfg = Config {
        store_url: db_url(&dir),
        dispatch_interval: Duration::from_millis(100),
        gateway: gateway.clone(),
        ..Config::default()
    };
    let service = Service::builder(cfg)
        .with_transport(Arc::new(HttpGateway::new(gateway)))
        .with_subscribers(Vec::new())
        .build()
        .unwrap();
    let token = service.shutdown_token();
    let handle = tokio::spawn(service.run_until(std::future::pending()));

    let mut messages = Vec::new();
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        messages = server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path().ends_with("/messages"))
            .collect();
        if !messages.is_empty() {
            break;
        }
    }
    token.cancel();
    handle.await.unwrap().unwrap();

    let first = messages.first().expect("at least one reminder sent");
    let body: Value = serde_json::from_slice(&first.body).unwrap();
    assert_eq!(body["to"], json!("919876543210"));
    assert_eq!(
        body["text"],
        json!("⏰ Reminder: \"Dentist\"\n📅 02 Jan 2030, 09:30 UTC\n📝 Bring the x-rays\nPriority: Normal")
    );
}
