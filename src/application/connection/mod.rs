//! Relay connection management: lifecycle, handler registry, acknowledgments

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::application::errors::TransportError;
use crate::domain::traits::{events, ConnectionState, Frame, Transport, TransportEvent};

/// Handler invoked with the payload of a registered inbound event.
///
/// Handlers run on the dispatch task; they must hand real work off to the
/// owning event loop instead of doing it inline.
pub type EventHandler = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

/// Shared between client calls and the dispatch task.
struct Registry {
    handlers: HashMap<String, EventHandler>,
    pending_acks: HashMap<u64, oneshot::Sender<serde_json::Value>>,
    state: ConnectionState,
    next_ack: u64,
}

impl Registry {
    fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            pending_acks: HashMap::new(),
            state: ConnectionState::Disconnected,
            next_ack: 1,
        }
    }
}

/// Owns the relay connection lifecycle and the named event handler registry.
///
/// The registry belongs to the manager for its whole lifetime: handlers
/// registered once stay registered across any number of reconnects, and
/// re-registering an event name replaces the previous handler instead of
/// stacking a duplicate.
pub struct ConnectionManager<T: Transport> {
    transport: Arc<T>,
    registry: Arc<Mutex<Registry>>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport + 'static> ConnectionManager<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            registry: Arc::new(Mutex::new(Registry::new())),
            dispatch: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.registry.lock().expect("registry poisoned").state
    }

    /// Register the handler for an event name.
    ///
    /// Idempotent: registering the same name again swaps the handler, so a
    /// reconnect path may call this freely without duplicate delivery.
    pub fn on(&self, event: &str, handler: EventHandler) {
        let mut registry = self.registry.lock().expect("registry poisoned");
        if registry.handlers.insert(event.to_string(), handler).is_some() {
            tracing::debug!("replaced handler for '{}'", event);
        }
    }

    /// Deregister the handler for an event name. Idempotent.
    pub fn off(&self, event: &str) {
        let mut registry = self.registry.lock().expect("registry poisoned");
        registry.handlers.remove(event);
    }

    /// Open the transport and start dispatching inbound frames.
    ///
    /// The transport picks the wire in its fixed preference order (polling
    /// first, websocket upgrade after). Calling this again tears down the
    /// previous dispatch task; the handler registry is untouched.
    pub async fn connect(&self) -> Result<(), TransportError> {
        {
            let mut registry = self.registry.lock().expect("registry poisoned");
            registry.state = ConnectionState::Connecting;
        }

        let mut inbound = self.transport.connect().await?;
        let registry = Arc::clone(&self.registry);

        let task = tokio::spawn(async move {
            while let Some(event) = inbound.recv().await {
                match event {
                    TransportEvent::Opened => {
                        tracing::info!("relay connection established");
                        registry.lock().expect("registry poisoned").state =
                            ConnectionState::Connected;
                    }
                    TransportEvent::Frame(frame) => dispatch_frame(&registry, frame),
                    TransportEvent::Closed { reason } => {
                        tracing::warn!("relay connection closed: {}", reason);
                        registry.lock().expect("registry poisoned").state =
                            ConnectionState::Disconnected;
                    }
                }
            }
        });

        let mut dispatch = self.dispatch.lock().expect("dispatch poisoned");
        if let Some(previous) = dispatch.replace(task) {
            previous.abort();
        }
        Ok(())
    }

    /// Fire-and-forget send.
    ///
    /// A success means the frame was handed to the transport. It is not an
    /// acknowledgment; use [`ConnectionManager::emit_with_ack`] when the
    /// caller needs one.
    pub async fn emit(
        &self,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), TransportError> {
        self.transport.send(Frame::new(event, payload)).await
    }

    /// Send a frame carrying a correlation id and wait for the matching ack.
    ///
    /// Resolves with the ack payload, or [`TransportError::AckTimeout`] once
    /// `timeout` elapses without one.
    pub async fn emit_with_ack(
        &self,
        event: &str,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, TransportError> {
        let (tx, rx) = oneshot::channel();
        let id = {
            let mut registry = self.registry.lock().expect("registry poisoned");
            let id = registry.next_ack;
            registry.next_ack += 1;
            registry.pending_acks.insert(id, tx);
            id
        };

        let frame = Frame::new(event, payload).with_ack(id);
        if let Err(e) = self.transport.send(frame).await {
            self.forget_ack(id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(payload)) => Ok(payload),
            // Sender dropped: the manager was shut down underneath us.
            Ok(Err(_)) => Err(TransportError::NotConnected),
            Err(_) => {
                self.forget_ack(id);
                Err(TransportError::AckTimeout)
            }
        }
    }

    /// Deregister everything and close the transport.
    ///
    /// Must run before any later reconnect so a torn-down context can never
    /// see another delivery.
    pub async fn shutdown(&self) {
        {
            let mut registry = self.registry.lock().expect("registry poisoned");
            registry.handlers.clear();
            registry.pending_acks.clear();
            registry.state = ConnectionState::Disconnected;
        }
        if let Some(task) = self.dispatch.lock().expect("dispatch poisoned").take() {
            task.abort();
        }
        self.transport.close().await;
    }

    fn forget_ack(&self, id: u64) {
        let mut registry = self.registry.lock().expect("registry poisoned");
        registry.pending_acks.remove(&id);
    }
}

/// Route one inbound frame: resolve a pending ack or call the handler
/// registered for the event name.
fn dispatch_frame(registry: &Arc<Mutex<Registry>>, frame: Frame) {
    if frame.event == events::ACK {
        let waiter = match frame.ack {
            Some(id) => registry
                .lock()
                .expect("registry poisoned")
                .pending_acks
                .remove(&id),
            None => None,
        };
        match waiter {
            Some(tx) => {
                let _ = tx.send(frame.payload);
            }
            None => tracing::debug!("ack with no waiter: {:?}", frame.ack),
        }
        return;
    }

    let handler = registry
        .lock()
        .expect("registry poisoned")
        .handlers
        .get(&frame.event)
        .cloned();
    match handler {
        Some(handler) => handler(frame.payload),
        None => tracing::debug!("no handler for event '{}'", frame.event),
    }
}
