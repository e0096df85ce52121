use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::application::errors::TransportError;

/// Relay event names shared by both directions of the channel.
pub mod events {
    pub const JOIN_ROOM: &str = "joinRoom";
    pub const CHAT_MESSAGE: &str = "chatMessage";
    pub const START_TYPING: &str = "start-typing";
    pub const STOP_TYPING: &str = "stop-typing";
    pub const ROOM_NOTICE: &str = "roomNotice";
    /// Relay answer to a frame that carried a correlation id.
    pub const ACK: &str = "ack";
}

/// The wire unit of the relay channel: a named event with a JSON payload.
///
/// `ack` carries a correlation id when the sender wants an acknowledgment;
/// the relay answers with an [`events::ACK`] frame echoing the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,
}

impl Frame {
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            payload,
            ack: None,
        }
    }

    pub fn with_ack(mut self, id: u64) -> Self {
        self.ack = Some(id);
        self
    }
}

/// Lifecycle and traffic notifications emitted by a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened,
    Frame(Frame),
    Closed { reason: String },
}

/// Connection lifecycle, driven only by transport events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Wire flavors a relay transport can run on, in preference order.
///
/// Polling comes before websocket: first connection favors traversal of
/// restrictive networks, the upgrade recovers latency afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Polling,
    WebSocket,
}

/// Transport trait - abstraction for the relay event channel
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the channel and hand back the inbound event stream.
    ///
    /// The stream starts with [`TransportEvent::Opened`] once the wire is
    /// up and ends with [`TransportEvent::Closed`].
    async fn connect(&self) -> Result<mpsc::Receiver<TransportEvent>, TransportError>;

    /// Fire-and-forget frame send. A success says the frame left this
    /// process, nothing more.
    async fn send(&self, frame: Frame) -> Result<(), TransportError>;

    /// Close the channel. Idempotent.
    async fn close(&self);
}
