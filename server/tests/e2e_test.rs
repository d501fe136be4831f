//! End-to-end pipeline test: feed file -> watcher -> coordinator ->
//! {live WebSocket broadcast, push fan-out}, with second-tick dedup.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use homeguard_server::alerts::model::Severity;
use homeguard_server::alerts::watcher::AlertWatcher;
use homeguard_server::auth::{self, JwtAuthenticator};
use homeguard_server::client::socket::{ChannelSocket, EventHandler};
use homeguard_server::db;
use homeguard_server::dispatch::Distributor;
use homeguard_server::push::fanout::PushFanout;
use homeguard_server::push::store::{PushStore, PushSubscription};
use homeguard_server::push::transport::{NotificationPayload, PushError, PushTransport};
use homeguard_server::routes;
use homeguard_server::state::AppState;
use homeguard_server::ws::protocol::ChannelEvent;
use homeguard_server::ws::registry::{ChannelRegistry, CHANNEL_ALERTS};

/// Push transport stub that records every delivery attempt.
#[derive(Clone, Default)]
struct RecordingTransport {
    attempts: Arc<Mutex<Vec<(String, NotificationPayload)>>>,
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &NotificationPayload,
    ) -> Result<(), PushError> {
        self.attempts
            .lock()
            .unwrap()
            .push((subscription.endpoint.clone(), payload.clone()));
        Ok(())
    }
}

/// Poll a condition until it holds or a 5 second deadline passes.
async fn wait_until(mut cond: impl FnMut() -> bool, what: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn one_alert_reaches_dashboard_and_push_exactly_once() {
    // One new alert in the feed.
    let dir = tempfile::tempdir().unwrap();
    let feed_path = dir.path().join("alerts.json");
    std::fs::write(
        &feed_path,
        r#"[{"alert_id": "a1", "device_ip": "10.0.0.5", "severity": "high",
            "reason": "port scan detected", "timestamp": 1700000000}]"#,
    )
    .unwrap();

    // Server with a recording push transport.
    let jwt_secret = vec![42u8; 32];
    let database = db::init_db_in_memory().unwrap();
    let registry = ChannelRegistry::new(Arc::new(JwtAuthenticator::new(jwt_secret.clone())));
    let push_store = PushStore::new(database.clone());
    let transport = RecordingTransport::default();
    let fanout = PushFanout::new(push_store.clone(), Arc::new(transport.clone()));

    let (alert_tx, alert_rx) = mpsc::unbounded_channel();
    let mut watcher = AlertWatcher::new(feed_path, Duration::from_secs(2), alert_tx);
    let distributor = Distributor::new(registry.clone(), push_store.clone(), fanout, alert_rx);
    tokio::spawn(distributor.run());

    let state = AppState {
        db: database,
        jwt_secret: jwt_secret.clone(),
        registry: registry.clone(),
        push_store: push_store.clone(),
    };
    let app = routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let token = auth::jwt::issue_access_token(&jwt_secret, "admin@example.com", true).unwrap();

    // One dashboard connection on the "alerts" channel.
    let socket = ChannelSocket::new(format!("ws://{addr}"), token.clone())
        .with_reconnect_delay(Duration::from_millis(100));
    let events: Arc<Mutex<Vec<ChannelEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let handler: EventHandler = Arc::new(move |event| {
        sink.lock().unwrap().push(event);
    });
    socket.connect(CHANNEL_ALERTS, handler);
    wait_until(|| registry.count(CHANNEL_ALERTS) == 1, "dashboard connect").await;

    // One push subscription registered via the REST surface.
    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/api/push/subscribe"))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "endpoint": "https://push.example/device-1",
            "keys": {"p256dh": "p256dh-key", "auth": "auth-key"}
        }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert_eq!(push_store.list_all().unwrap().len(), 1);

    // First watcher tick: the alert is discovered and distributed.
    assert_eq!(watcher.poll_feed().unwrap(), 1);

    wait_until(|| events.lock().unwrap().len() == 1, "live envelope").await;
    {
        let events = events.lock().unwrap();
        let ChannelEvent::NewAlert(payload) = &events[0] else {
            panic!("expected a new_alert envelope, got {:?}", events[0]);
        };
        assert_eq!(payload.alert_id, "a1");
        assert_eq!(payload.device_ip, "10.0.0.5");
        assert_eq!(payload.severity, Severity::High);
        assert_eq!(payload.reason, "port scan detected");
        assert_eq!(payload.timestamp, 1700000000);
    }

    wait_until(
        || transport.attempts.lock().unwrap().len() == 1,
        "push delivery",
    )
    .await;
    {
        let attempts = transport.attempts.lock().unwrap();
        assert_eq!(attempts[0].0, "https://push.example/device-1");
        assert_eq!(attempts[0].1.tag, "a1");
    }

    // Second tick over the same feed content: zero further deliveries.
    assert_eq!(watcher.poll_feed().unwrap(), 0);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(events.lock().unwrap().len(), 1);
    assert_eq!(transport.attempts.lock().unwrap().len(), 1);

    socket.disconnect_all();
}
