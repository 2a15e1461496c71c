//! End-to-end runtime behavior over the in-memory store and the scripted transport.
//!
//! All tests run on a paused clock, so minutes of supervisor time pass instantly.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use remindvisor::{
    Config, ConnectError, ConnectionSupervisor, Event, EventKind, FakeSend, FakeTransport,
    MemoryStore, NewEvent, Priority, RuntimeError, Service, SupervisorState,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

struct Harness {
    transport: Arc<FakeTransport>,
    supervisor: Arc<ConnectionSupervisor>,
    token: CancellationToken,
    events: broadcast::Receiver<Event>,
    handle: JoinHandle<Result<(), RuntimeError>>,
}

impl Harness {
    fn start(store: Arc<MemoryStore>, transport: Arc<FakeTransport>, cfg: Config) -> Self {
        let service = Service::builder(cfg)
            .with_store(store)
            .with_transport(transport.clone())
            .with_subscribers(Vec::new())
            .build()
            .expect("service builds");

        let token = service.shutdown_token();
        let supervisor = service.supervisor();
        let events = service.bus().subscribe();
        let handle = tokio::spawn(
            service.run_until(std::future::pending::<Result<(), RuntimeError>>()),
        );
        Self {
            transport,
            supervisor,
            token,
            events,
            handle,
        }
    }

    fn drain(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = self.events.try_recv() {
            out.push(ev);
        }
        out
    }

    async fn stop(self) -> Result<(), RuntimeError> {
        self.token.cancel();
        self.handle.await.expect("service task")
    }
}

fn config() -> Config {
    Config {
        store_url: "memory".into(),
        ..Config::default()
    }
}

fn count(events: &[Event], kind: EventKind) -> usize {
    events.iter().filter(|e| e.kind == kind).count()
}

#[tokio::test(start_paused = true)]
async fn test_three_events_two_users_three_sends() {
    let store = Arc::new(MemoryStore::new());
    let due = Utc.with_ymd_and_hms(2030, 1, 2, 9, 30, 0).unwrap();
    let alice = store.add_user("9876543210");
    let bob = store.add_user("9123456789");
    store
        .add_event(alice, NewEvent::new("Dentist", due).with_priority(Priority::High))
        .unwrap();
    store
        .add_event(alice, NewEvent::new("Pay rent", due).with_description("Landlord"))
        .unwrap();
    store.add_event(bob, NewEvent::new("Gym", due)).unwrap();

    let transport = Arc::new(FakeTransport::new());
    let h = Harness::start(store, transport.clone(), config());

    sleep(Duration::from_secs(61)).await;

    let sent = transport.delivered();
    assert_eq!(sent.len(), 3);
    for (name, to) in [
        ("Dentist", "919876543210"),
        ("Pay rent", "919876543210"),
        ("Gym", "919123456789"),
    ] {
        let msg = sent
            .iter()
            .find(|m| m.text.contains(&format!("\"{name}\"")))
            .unwrap_or_else(|| panic!("no reminder for {name}"));
        assert_eq!(msg.recipient, to);
        assert!(msg.text.contains("02 Jan 2030, 09:30 UTC"));
    }
    let gym = sent.iter().find(|m| m.text.contains("Gym")).unwrap();
    assert!(gym.text.contains("Priority: Normal"));
    assert!(gym.text.contains("No description"));

    h.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reminds_regardless_of_due_time() {
    let store = Arc::new(MemoryStore::new());
    let user = store.add_user("9876543210");
    store
        .add_event(user, NewEvent::new("Long overdue", Utc::now() - ChronoDuration::days(30)))
        .unwrap();
    store
        .add_event(user, NewEvent::new("Next year", Utc::now() + ChronoDuration::days(365)))
        .unwrap();
    let resolved = store
        .add_event(user, NewEvent::new("Already done", Utc::now()))
        .unwrap();
    store.resolve_event(user, resolved).unwrap();

    let transport = Arc::new(FakeTransport::new());
    let h = Harness::start(store, transport.clone(), config());

    sleep(Duration::from_secs(121)).await;

    let sent = transport.delivered();
    // two ticks, both outstanding events each time, the resolved one never
    assert_eq!(sent.len(), 4);
    assert!(sent.iter().all(|m| !m.text.contains("Already done")));

    h.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_bad_recipients_do_not_block_the_batch() {
    let store = Arc::new(MemoryStore::new());
    for address in ["1111111111", "not a phone", "2222222222", "3333333333"] {
        let user = store.add_user(address);
        store.add_event(user, NewEvent::new("Standup", Utc::now())).unwrap();
    }
    let transport = Arc::new(FakeTransport::new());
    transport.script_send("912222222222", FakeSend::Reject("not on network".into()));

    let mut h = Harness::start(store, transport.clone(), config());
    sleep(Duration::from_secs(61)).await;

    let delivered: Vec<_> = transport
        .delivered()
        .into_iter()
        .map(|m| m.recipient)
        .collect();
    assert_eq!(delivered, ["911111111111", "913333333333"]);
    assert_eq!(h.supervisor.state(), SupervisorState::Connected);
    assert_eq!(transport.sessions().len(), 1);

    let events = h.drain();
    assert_eq!(count(&events, EventKind::NotificationFailed), 2);
    let report = events
        .iter()
        .find_map(|e| e.report)
        .expect("tick completed");
    assert_eq!((report.scanned, report.sent, report.failed), (4, 2, 2));
    assert!(!report.session_lost);

    h.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_many_session_losses_in_one_tick_restart_once() {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(FakeTransport::new());
    for i in 0..3 {
        let address = format!("987654321{i}");
        let user = store.add_user(address.as_str());
        store.add_event(user, NewEvent::new("Call", Utc::now())).unwrap();
        transport.script_send(format!("91{address}"), FakeSend::LoseSession("logged out".into()));
    }
    let cfg = Config {
        send_concurrency: 3,
        ..config()
    };

    let mut h = Harness::start(store, transport.clone(), cfg);
    sleep(Duration::from_secs(61)).await;

    let events = h.drain();
    assert_eq!(count(&events, EventKind::NotificationFailed), 3);
    assert_eq!(count(&events, EventKind::SessionLost), 1);
    assert_eq!(h.supervisor.state(), SupervisorState::Restarting);
    transport.clear_send_script();

    sleep(Duration::from_secs(5)).await;
    assert_eq!(h.supervisor.state(), SupervisorState::Connected);
    assert_eq!(transport.connect_calls().len(), 2);

    // the fresh session keeps working and is not restarted again
    sleep(Duration::from_secs(61)).await;
    assert_eq!(transport.connect_calls().len(), 2);
    assert_eq!(transport.delivered().len(), 3);
    let second = transport.sessions()[1].id();
    assert!(transport.delivered().iter().all(|m| m.session == second));

    h.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_backoff_is_respected_and_retries_never_stop() {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(FakeTransport::new());
    transport.script_connects((0..6).map(|_| {
        Err(ConnectError::Unreachable {
            reason: "gateway down".into(),
        })
    }));

    let mut h = Harness::start(store, transport.clone(), config());

    sleep(Duration::from_millis(4_900)).await;
    assert_eq!(transport.connect_calls().len(), 1, "no retry before 5s");

    let mut states = h.supervisor.watch_state();
    states
        .wait_for(|s| *s == SupervisorState::Connected)
        .await
        .unwrap();

    let calls = transport.connect_calls();
    assert_eq!(calls.len(), 7);
    for pair in calls.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(5));
    }

    let events = h.drain();
    assert_eq!(count(&events, EventKind::ConnectFailed), 6);
    assert!(
        events
            .iter()
            .filter(|e| e.kind == EventKind::BackoffScheduled)
            .all(|e| e.delay() == Some(Duration::from_secs(5)))
    );

    h.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_scan_failure_skips_tick_and_recovers() {
    let store = Arc::new(MemoryStore::new());
    let user = store.add_user("9876543210");
    store.add_event(user, NewEvent::new("Dentist", Utc::now())).unwrap();
    store.set_unavailable(true);

    let transport = Arc::new(FakeTransport::new());
    let mut h = Harness::start(store.clone(), transport.clone(), config());

    sleep(Duration::from_secs(61)).await;
    assert!(transport.attempts().is_empty());
    assert_eq!(count(&h.drain(), EventKind::ScanFailed), 1);
    assert_eq!(h.supervisor.state(), SupervisorState::Connected);

    store.set_unavailable(false);
    sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.delivered().len(), 1);

    h.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_graceful_shutdown() {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(FakeTransport::new());
    let mut h = Harness::start(store, transport.clone(), config());

    sleep(Duration::from_secs(1)).await;
    assert_eq!(h.supervisor.state(), SupervisorState::Connected);

    h.token.cancel();
    let result = (&mut h.handle).await.unwrap();
    assert!(result.is_ok());
    assert_eq!(h.supervisor.state(), SupervisorState::Disconnected);
    assert_eq!(transport.sessions().len(), 1);
    assert!(!h.transport.sessions()[0].is_alive());

    let events = h.drain();
    assert_eq!(count(&events, EventKind::ShutdownRequested), 1);
    assert_eq!(count(&events, EventKind::SupervisorStopped), 1);
    assert_eq!(count(&events, EventKind::AllStoppedWithin), 1);
}

#[tokio::test(start_paused = true)]
async fn test_grace_exceeded_when_tick_hangs() {
    let store = Arc::new(MemoryStore::new());
    let user = store.add_user("9876543210");
    store.add_event(user, NewEvent::new("Dentist", Utc::now())).unwrap();

    let transport = Arc::new(FakeTransport::new());
    transport.script_send("919876543210", FakeSend::Hang);
    let cfg = Config {
        send_timeout: Duration::from_secs(3600),
        grace: Duration::from_secs(2),
        ..config()
    };

    let h = Harness::start(store, transport.clone(), cfg);
    sleep(Duration::from_secs(61)).await;
    assert_eq!(transport.attempts().len(), 1);

    let err = h.stop().await.unwrap_err();
    assert_eq!(err.as_label(), "runtime_grace_exceeded");
}
