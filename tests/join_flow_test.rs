//! Room join and chat flow integration tests
//! Run with: cargo test --test join_flow_test

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;

use parley::application::connection::ConnectionManager;
use parley::application::errors::{ClientError, ProvisioningError};
use parley::application::services::{ChatClient, RoomSessionCoordinator, Update};
use parley::domain::entities::{Message, RoomId, SessionPhase};
use parley::domain::traits::{events, Frame, Provisioner};
use parley::infrastructure::relay::{LoopbackRelay, LoopbackTransport};

static INIT: Once = Once::new();

fn ensure_init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt::try_init();
    });
}

struct StubProvisioner {
    id: Option<&'static str>,
    calls: Arc<AtomicUsize>,
}

impl StubProvisioner {
    fn returning(id: &'static str) -> Self {
        Self {
            id: Some(id),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Provisioner for StubProvisioner {
    async fn create_room(
        &self,
        _room_name: &str,
        _password: &str,
    ) -> Result<RoomId, ProvisioningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.id
            .map(RoomId::new)
            .ok_or(ProvisioningError::MissingRoomId)
    }

    async fn match_room(
        &self,
        room_name: &str,
        password: &str,
    ) -> Result<RoomId, ProvisioningError> {
        self.create_room(room_name, password).await
    }
}

async fn connected(
    auto_ack: bool,
) -> (Arc<ConnectionManager<LoopbackTransport>>, LoopbackRelay) {
    ensure_init();
    let (transport, relay) = if auto_ack {
        LoopbackTransport::with_auto_ack()
    } else {
        LoopbackTransport::new()
    };
    let connection = Arc::new(ConnectionManager::new(transport));
    connection.connect().await.expect("loopback connect");
    (connection, relay)
}

#[tokio::test]
async fn create_flow_joins_and_chats() {
    let (connection, mut relay) = connected(true).await;
    let mut client = ChatClient::new(Arc::clone(&connection), "bob")
        .with_idle_timeout(Duration::from_millis(50));
    let mut coordinator =
        RoomSessionCoordinator::new(StubProvisioner::returning("42"), Arc::clone(&connection));

    coordinator
        .create_flow("lobby", "secret", "bob")
        .await
        .expect("join should succeed");
    assert_eq!(coordinator.phase(), SessionPhase::Active);

    // The join frame carries the provisioned identifier, not the password.
    let join = relay.next_outbound().await;
    assert_eq!(join.event, events::JOIN_ROOM);
    assert_eq!(join.payload["roomName"], "lobby");
    assert_eq!(join.payload["roomId"], "42");

    // Optimistic local append plus the outbound chat frame.
    let sent = client
        .send_message("hello room")
        .await
        .expect("send")
        .expect("non-empty");
    assert_eq!(client.messages().len(), 1);
    let outbound = relay.next_outbound().await;
    assert_eq!(outbound.event, events::CHAT_MESSAGE);
    assert_eq!(outbound.payload["id"], sent.id.as_str());

    // A remote message lands at the tail, after the local one.
    relay
        .deliver(Frame::new(
            events::CHAT_MESSAGE,
            serde_json::to_value(Message::new("carol", "hi bob")).unwrap(),
        ))
        .await;
    match client.next_update().await {
        Some(Update::Message(message)) => assert_eq!(message.sender, "carol"),
        other => panic!("expected message, got {:?}", other),
    }
    let texts: Vec<&str> = client.messages().iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["hello room", "hi bob"]);
}

#[tokio::test]
async fn remote_typing_presence_tracks_start_and_stop() {
    let (connection, relay) = connected(true).await;
    let mut client = ChatClient::new(Arc::clone(&connection), "bob");

    relay
        .deliver(Frame::new(events::START_TYPING, serde_json::json!("carol")))
        .await;
    relay
        .deliver(Frame::new(events::START_TYPING, serde_json::json!("carol")))
        .await;
    relay
        .deliver(Frame::new(events::START_TYPING, serde_json::json!("dave")))
        .await;

    for _ in 0..3 {
        client.next_update().await.expect("presence update");
    }
    assert_eq!(client.typing_users(), ["carol", "dave"]);

    relay
        .deliver(Frame::new(events::STOP_TYPING, serde_json::json!("carol")))
        .await;
    client.next_update().await.expect("presence update");
    assert_eq!(client.typing_users(), ["dave"]);
}

#[tokio::test]
async fn local_typing_debounce_emits_start_then_stop() {
    let (connection, mut relay) = connected(true).await;
    let mut client = ChatClient::new(Arc::clone(&connection), "bob")
        .with_idle_timeout(Duration::from_millis(40));

    client.composition_changed("h").await.expect("emit");
    client.composition_changed("he").await.expect("emit");
    client.composition_changed("hey").await.expect("emit");

    let start = relay.next_outbound().await;
    assert_eq!(start.event, events::START_TYPING);
    assert_eq!(start.payload, serde_json::json!("bob"));
    assert!(relay.try_next_outbound().is_none(), "one start per burst");

    let _ = tokio::time::timeout(Duration::from_millis(300), client.next_update()).await;
    let stop = relay.next_outbound().await;
    assert_eq!(stop.event, events::STOP_TYPING);
    assert_eq!(stop.payload, serde_json::json!("bob"));
}

#[tokio::test]
async fn empty_room_name_never_reaches_provisioning() {
    let (connection, mut relay) = connected(true).await;
    let provisioner = StubProvisioner::returning("42");
    let calls = Arc::clone(&provisioner.calls);
    let mut coordinator = RoomSessionCoordinator::new(provisioner, connection);

    let result = coordinator.create_flow("", "pw", "bob").await;

    assert!(matches!(result, Err(ClientError::Validation(_))));
    assert_eq!(coordinator.phase(), SessionPhase::Idle);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(relay.try_next_outbound().is_none());
}

#[tokio::test]
async fn silent_relay_fails_the_join_with_a_timeout() {
    let (connection, _relay) = connected(false).await;
    let mut coordinator =
        RoomSessionCoordinator::new(StubProvisioner::returning("42"), connection)
            .with_join_timeout(Duration::from_millis(30));

    let result = coordinator.match_flow("lobby", "secret", "bob").await;

    assert!(matches!(result, Err(ClientError::Join(_))));
    assert_eq!(coordinator.phase(), SessionPhase::Failed);
}

#[tokio::test]
async fn teardown_cancels_the_pending_typing_deadline() {
    let (connection, mut relay) = connected(true).await;
    let mut client = ChatClient::new(Arc::clone(&connection), "bob")
        .with_idle_timeout(Duration::from_millis(40));

    client.composition_changed("h").await.expect("emit");
    assert_eq!(relay.next_outbound().await.event, events::START_TYPING);

    client.teardown().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(
        relay.try_next_outbound().is_none(),
        "no stop-typing after teardown"
    );
}
