use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::application::connection::ConnectionManager;
use crate::application::errors::TransportError;
use crate::application::messaging::MessageStore;
use crate::application::presence::{PresenceTracker, TypingDebouncer, TypingSignal};
use crate::domain::entities::Message;
use crate::domain::traits::{events, Transport};

/// Typed inbound event, decoded by the registered handlers and handed to
/// the chat event loop.
#[derive(Debug)]
pub enum ClientEvent {
    RoomNotice(String),
    ChatMessage(Message),
    StartTyping(String),
    StopTyping(String),
}

/// What the event loop tells the display layer after applying an event.
#[derive(Debug)]
pub enum Update {
    /// A new message landed at the tail of the log.
    Message(Message),
    /// The typing set changed; the full ordered view.
    Presence(Vec<String>),
    /// A user joined the room.
    Notice(String),
}

/// The chat participant: owns the message log, the typing set and the
/// local debouncer, all mutated on one logical task.
///
/// The four inbound handlers are installed once at construction and merely
/// forward typed events into the loop channel; reconnects never reinstall
/// them. Everything stateful happens in [`ChatClient::next_update`] and the
/// local operations, which the caller drives from a single task.
pub struct ChatClient<T: Transport> {
    connection: Arc<ConnectionManager<T>>,
    display_name: String,
    store: MessageStore,
    presence: PresenceTracker,
    debouncer: TypingDebouncer,
    events_rx: mpsc::Receiver<ClientEvent>,
}

impl<T: Transport + 'static> ChatClient<T> {
    pub fn new(connection: Arc<ConnectionManager<T>>, display_name: impl Into<String>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        install_handlers(&connection, &events_tx);
        Self {
            connection,
            display_name: display_name.into(),
            store: MessageStore::new(),
            presence: PresenceTracker::new(),
            debouncer: TypingDebouncer::default(),
            events_rx,
        }
    }

    /// Override the typing inactivity window.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.debouncer = TypingDebouncer::new(idle_timeout);
        self
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn messages(&self) -> &[Message] {
        self.store.snapshot()
    }

    pub fn typing_users(&self) -> &[String] {
        self.presence.typing_users()
    }

    /// Feed one local composition change into the debouncer, emitting the
    /// typing transition it produces, if any.
    pub async fn composition_changed(&mut self, text: &str) -> Result<(), TransportError> {
        if let Some(signal) = self.debouncer.on_input(Instant::now(), text) {
            self.emit_typing(signal).await?;
        }
        Ok(())
    }

    /// Optimistically append the message and send it to the relay.
    ///
    /// Returns the appended message, or `None` when the trimmed text is
    /// empty and nothing was sent.
    pub async fn send_message(&mut self, text: &str) -> Result<Option<Message>, TransportError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let message = self.store.append_local(&self.display_name, text);
        let payload = serde_json::to_value(&message)
            .map_err(|e| TransportError::Codec(e.to_string()))?;
        self.connection.emit(events::CHAT_MESSAGE, payload).await?;
        Ok(Some(message))
    }

    /// Wait for the next state change: an inbound event, or the typing
    /// deadline running out. Returns `None` once the connection is torn
    /// down and the loop channel drains.
    pub async fn next_update(&mut self) -> Option<Update> {
        loop {
            let deadline = self.debouncer.deadline();
            let idle = tokio::time::sleep_until(tokio::time::Instant::from_std(
                deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600)),
            ));
            tokio::pin!(idle);

            tokio::select! {
                event = self.events_rx.recv() => {
                    return Some(self.apply(event?));
                }
                () = &mut idle, if deadline.is_some() => {
                    if let Some(signal) = self.debouncer.poll(Instant::now()) {
                        if let Err(e) = self.emit_typing(signal).await {
                            tracing::warn!("typing signal lost: {}", e);
                        }
                    }
                }
            }
        }
    }

    /// Cancel the pending debounce deadline, deregister every handler and
    /// close the connection. Nothing is emitted after this returns.
    pub async fn teardown(&mut self) {
        self.debouncer.cancel();
        for event in [
            events::ROOM_NOTICE,
            events::CHAT_MESSAGE,
            events::START_TYPING,
            events::STOP_TYPING,
        ] {
            self.connection.off(event);
        }
        self.connection.shutdown().await;
        self.events_rx.close();
    }

    fn apply(&mut self, event: ClientEvent) -> Update {
        match event {
            ClientEvent::RoomNotice(user) => {
                tracing::info!("{} joined the room", user);
                Update::Notice(user)
            }
            ClientEvent::ChatMessage(message) => {
                self.store.append_remote(message.clone());
                Update::Message(message)
            }
            ClientEvent::StartTyping(user) => {
                self.presence.on_start_typing(&user);
                Update::Presence(self.presence.typing_users().to_vec())
            }
            ClientEvent::StopTyping(user) => {
                self.presence.on_stop_typing(&user);
                Update::Presence(self.presence.typing_users().to_vec())
            }
        }
    }

    async fn emit_typing(&self, signal: TypingSignal) -> Result<(), TransportError> {
        let event = match signal {
            TypingSignal::Start => events::START_TYPING,
            TypingSignal::Stop => events::STOP_TYPING,
        };
        self.connection
            .emit(event, serde_json::json!(self.display_name))
            .await
    }
}

/// Register the four inbound handlers. Each one only decodes the payload
/// and forwards a typed event; state stays with the event loop.
fn install_handlers<T: Transport + 'static>(
    connection: &ConnectionManager<T>,
    events_tx: &mpsc::Sender<ClientEvent>,
) {
    let tx = events_tx.clone();
    connection.on(
        events::ROOM_NOTICE,
        Arc::new(move |payload| {
            if let Ok(user) = serde_json::from_value::<String>(payload) {
                let _ = tx.try_send(ClientEvent::RoomNotice(user));
            }
        }),
    );

    let tx = events_tx.clone();
    connection.on(
        events::CHAT_MESSAGE,
        Arc::new(move |payload| {
            match serde_json::from_value::<Message>(payload) {
                Ok(message) => {
                    let _ = tx.try_send(ClientEvent::ChatMessage(message));
                }
                Err(e) => tracing::warn!("malformed chat message dropped: {}", e),
            }
        }),
    );

    let tx = events_tx.clone();
    connection.on(
        events::START_TYPING,
        Arc::new(move |payload| {
            if let Ok(user) = serde_json::from_value::<String>(payload) {
                let _ = tx.try_send(ClientEvent::StartTyping(user));
            }
        }),
    );

    let tx = events_tx.clone();
    connection.on(
        events::STOP_TYPING,
        Arc::new(move |payload| {
            if let Ok(user) = serde_json::from_value::<String>(payload) {
                let _ = tx.try_send(ClientEvent::StopTyping(user));
            }
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::traits::Frame;
    use crate::infrastructure::relay::loopback::{LoopbackRelay, LoopbackTransport};

    async fn client_pair() -> (ChatClient<LoopbackTransport>, LoopbackRelay) {
        let (transport, relay) = LoopbackTransport::new();
        let connection = Arc::new(ConnectionManager::new(transport));
        let client = ChatClient::new(Arc::clone(&connection), "alice")
            .with_idle_timeout(Duration::from_millis(30));
        connection.connect().await.unwrap();
        (client, relay)
    }

    #[tokio::test]
    async fn send_message_appends_then_emits() {
        let (mut client, mut relay) = client_pair().await;

        let sent = client.send_message("  hello there  ").await.unwrap().unwrap();

        assert_eq!(client.messages().last().map(|m| m.id.as_str()), Some(sent.id.as_str()));
        assert_eq!(sent.text, "hello there");

        let frame: Frame = relay.next_outbound().await;
        assert_eq!(frame.event, events::CHAT_MESSAGE);
        assert_eq!(frame.payload["sender"], "alice");
        assert_eq!(frame.payload["text"], "hello there");
    }

    #[tokio::test]
    async fn blank_message_is_not_sent() {
        let (mut client, mut relay) = client_pair().await;
        assert!(client.send_message("   ").await.unwrap().is_none());
        assert!(client.messages().is_empty());
        assert!(relay.try_next_outbound().is_none());
    }

    #[tokio::test]
    async fn composition_emits_one_start_then_one_stop() {
        let (mut client, mut relay) = client_pair().await;

        client.composition_changed("h").await.unwrap();
        client.composition_changed("he").await.unwrap();

        let frame = relay.next_outbound().await;
        assert_eq!(frame.event, events::START_TYPING);
        assert_eq!(frame.payload, serde_json::json!("alice"));
        assert!(relay.try_next_outbound().is_none());

        // Let the idle deadline run out inside the loop.
        let _ = tokio::time::timeout(Duration::from_millis(200), client.next_update()).await;
        let frame = relay.next_outbound().await;
        assert_eq!(frame.event, events::STOP_TYPING);
    }

    #[tokio::test]
    async fn inbound_events_update_log_and_presence() {
        let (mut client, relay) = client_pair().await;

        relay
            .deliver(Frame::new(
                events::CHAT_MESSAGE,
                serde_json::to_value(Message::new("bob", "hi")).unwrap(),
            ))
            .await;
        match client.next_update().await {
            Some(Update::Message(message)) => assert_eq!(message.sender, "bob"),
            other => panic!("expected message update, got {:?}", other),
        }
        assert_eq!(client.messages().len(), 1);

        relay
            .deliver(Frame::new(events::START_TYPING, serde_json::json!("bob")))
            .await;
        match client.next_update().await {
            Some(Update::Presence(users)) => assert_eq!(users, ["bob"]),
            other => panic!("expected presence update, got {:?}", other),
        }

        relay
            .deliver(Frame::new(events::STOP_TYPING, serde_json::json!("bob")))
            .await;
        match client.next_update().await {
            Some(Update::Presence(users)) => assert!(users.is_empty()),
            other => panic!("expected presence update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn teardown_silences_an_armed_deadline() {
        let (mut client, mut relay) = client_pair().await;

        client.composition_changed("h").await.unwrap();
        let start = relay.next_outbound().await;
        assert_eq!(start.event, events::START_TYPING);

        client.teardown().await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        // The deadline has elapsed, but teardown cancelled it: no stop frame.
        assert!(relay.try_next_outbound().is_none());
        assert!(client.next_update().await.is_none());
    }
}
