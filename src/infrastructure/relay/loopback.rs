//! In-memory relay transport for development and tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::errors::TransportError;
use crate::domain::traits::{events, Frame, Transport, TransportEvent};

const CHANNEL_CAPACITY: usize = 64;

struct Shared {
    events_tx: Mutex<mpsc::Sender<TransportEvent>>,
}

impl Shared {
    fn sender(&self) -> mpsc::Sender<TransportEvent> {
        self.events_tx.lock().expect("loopback poisoned").clone()
    }
}

/// Loopback transport: frames the client sends surface on the paired
/// [`LoopbackRelay`]; frames pushed through the relay arrive as if from the
/// wire. With auto-ack on, any frame carrying a correlation id is answered
/// immediately with a positive ack.
pub struct LoopbackTransport {
    shared: Arc<Shared>,
    pending_rx: Mutex<Option<mpsc::Receiver<TransportEvent>>>,
    outbound_tx: mpsc::Sender<Frame>,
    auto_ack: bool,
}

/// The relay half of a loopback pair.
pub struct LoopbackRelay {
    shared: Arc<Shared>,
    outbound_rx: mpsc::Receiver<Frame>,
}

impl LoopbackTransport {
    pub fn new() -> (Self, LoopbackRelay) {
        Self::build(false)
    }

    /// A loopback pair that acknowledges every correlated frame.
    pub fn with_auto_ack() -> (Self, LoopbackRelay) {
        Self::build(true)
    }

    fn build(auto_ack: bool) -> (Self, LoopbackRelay) {
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            events_tx: Mutex::new(events_tx),
        });
        let transport = Self {
            shared: Arc::clone(&shared),
            pending_rx: Mutex::new(Some(events_rx)),
            outbound_tx,
            auto_ack,
        };
        let relay = LoopbackRelay {
            shared,
            outbound_rx,
        };
        (transport, relay)
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(&self) -> Result<mpsc::Receiver<TransportEvent>, TransportError> {
        let rx = {
            let mut pending = self.pending_rx.lock().expect("loopback poisoned");
            match pending.take() {
                Some(rx) => rx,
                // Reconnect: fresh channel, relay keeps up via the shared
                // sender.
                None => {
                    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
                    *self.shared.events_tx.lock().expect("loopback poisoned") = tx;
                    rx
                }
            }
        };
        let _ = self.shared.sender().send(TransportEvent::Opened).await;
        Ok(rx)
    }

    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        if self.auto_ack {
            if let Some(id) = frame.ack {
                let ack =
                    Frame::new(events::ACK, serde_json::json!({ "ok": true })).with_ack(id);
                let _ = self
                    .shared
                    .sender()
                    .send(TransportEvent::Frame(ack))
                    .await;
            }
        }
        self.outbound_tx
            .send(frame)
            .await
            .map_err(|_| TransportError::NotConnected)
    }

    async fn close(&self) {
        let _ = self
            .shared
            .sender()
            .send(TransportEvent::Closed {
                reason: "closed by client".to_string(),
            })
            .await;
    }
}

impl LoopbackRelay {
    /// Deliver a frame to the client as if it came over the wire.
    pub async fn deliver(&self, frame: Frame) {
        let _ = self
            .shared
            .sender()
            .send(TransportEvent::Frame(frame))
            .await;
    }

    /// Drop the connection from the relay side.
    pub async fn disconnect(&self, reason: &str) {
        let _ = self
            .shared
            .sender()
            .send(TransportEvent::Closed {
                reason: reason.to_string(),
            })
            .await;
    }

    /// Next frame the client emitted.
    pub async fn next_outbound(&mut self) -> Frame {
        self.outbound_rx
            .recv()
            .await
            .expect("loopback client side dropped")
    }

    /// Next emitted frame, if one is already buffered.
    pub fn try_next_outbound(&mut self) -> Option<Frame> {
        self.outbound_rx.try_recv().ok()
    }
}
