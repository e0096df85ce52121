//! Relay transport - the wire under the connection manager
//!
//! The production transport opens a relay session over HTTP long-polling
//! first and upgrades to a websocket when the relay offers one, in that
//! fixed order: first connection favors traversal of restrictive networks,
//! the upgrade recovers latency afterwards. The loopback transport stands
//! in for the relay in development and tests.

pub mod loopback;
mod polling;
mod websocket;

use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use tokio::sync::{mpsc, watch, Mutex};

use crate::application::errors::TransportError;
use crate::domain::traits::{Frame, Transport, TransportEvent, TransportKind};

pub use loopback::{LoopbackRelay, LoopbackTransport};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const WEBSOCKET_UPGRADE: &str = "websocket";

/// Which wire outbound frames currently take.
enum SendMode {
    Offline,
    Polling { sid: String },
    WebSocket(websocket::WsSink),
}

struct Inner {
    base_url: String,
    client: Client,
    preference: Vec<TransportKind>,
    mode: Mutex<SendMode>,
    poll_stop: StdMutex<Option<watch::Sender<bool>>>,
}

/// HTTP/websocket relay transport.
pub struct RelayTransport {
    inner: Arc<Inner>,
}

impl RelayTransport {
    /// Transport for the relay at `socket_url`, with the default preference
    /// order [polling, websocket].
    pub fn new(socket_url: impl Into<String>) -> Self {
        Self::with_preference(
            socket_url,
            vec![TransportKind::Polling, TransportKind::WebSocket],
        )
    }

    pub fn with_preference(
        socket_url: impl Into<String>,
        preference: Vec<TransportKind>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                base_url: socket_url.into(),
                client: Client::new(),
                preference,
                mode: Mutex::new(SendMode::Offline),
                poll_stop: StdMutex::new(None),
            }),
        }
    }

    /// Try the websocket upgrade in the background; on success swap the
    /// send path over and stop the polling loop.
    fn spawn_upgrade(
        &self,
        sid: String,
        events_tx: mpsc::Sender<TransportEvent>,
        poll_stop: watch::Sender<bool>,
    ) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            match websocket::connect(&inner.base_url, &sid).await {
                Ok(stream) => {
                    let (sink, read) = stream.split();
                    *inner.mode.lock().await = SendMode::WebSocket(sink);
                    let _ = poll_stop.send(true);
                    tracing::info!("relay transport upgraded to websocket");
                    websocket::run_reader(read, events_tx).await;
                }
                Err(e) => {
                    tracing::warn!("websocket upgrade failed, staying on polling: {}", e);
                }
            }
        });
    }
}

#[async_trait]
impl Transport for RelayTransport {
    async fn connect(&self) -> Result<mpsc::Receiver<TransportEvent>, TransportError> {
        let first = self
            .inner
            .preference
            .first()
            .copied()
            .ok_or_else(|| TransportError::Handshake("empty transport preference".to_string()))?;

        // A reconnect supersedes any polling loop still draining.
        if let Some(stop) = self
            .inner
            .poll_stop
            .lock()
            .expect("poll stop poisoned")
            .take()
        {
            let _ = stop.send(true);
        }

        let handshake = polling::handshake(&self.inner.client, &self.inner.base_url).await?;
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let _ = events_tx.send(TransportEvent::Opened).await;

        match first {
            TransportKind::Polling => {
                let (stop_tx, stop_rx) = watch::channel(false);
                *self.inner.mode.lock().await = SendMode::Polling {
                    sid: handshake.sid.clone(),
                };
                tokio::spawn(polling::run_poll_loop(
                    self.inner.client.clone(),
                    self.inner.base_url.clone(),
                    handshake.sid.clone(),
                    events_tx.clone(),
                    stop_rx,
                ));

                let upgrade_wanted = self.inner.preference.contains(&TransportKind::WebSocket)
                    && handshake.upgrades.iter().any(|u| u == WEBSOCKET_UPGRADE);
                if upgrade_wanted {
                    self.spawn_upgrade(handshake.sid, events_tx, stop_tx.clone());
                }
                *self.inner.poll_stop.lock().expect("poll stop poisoned") = Some(stop_tx);
            }
            TransportKind::WebSocket => {
                let stream = websocket::connect(&self.inner.base_url, &handshake.sid).await?;
                let (sink, read) = stream.split();
                *self.inner.mode.lock().await = SendMode::WebSocket(sink);
                tokio::spawn(websocket::run_reader(read, events_tx));
            }
        }

        Ok(events_rx)
    }

    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        let mut mode = self.inner.mode.lock().await;
        match &mut *mode {
            SendMode::Offline => Err(TransportError::NotConnected),
            SendMode::Polling { sid } => {
                polling::emit(&self.inner.client, &self.inner.base_url, sid, &frame).await
            }
            SendMode::WebSocket(sink) => {
                let message = websocket::encode(&frame)?;
                sink.send(message)
                    .await
                    .map_err(|e| TransportError::Network(e.to_string()))
            }
        }
    }

    async fn close(&self) {
        if let Some(stop) = self
            .inner
            .poll_stop
            .lock()
            .expect("poll stop poisoned")
            .take()
        {
            let _ = stop.send(true);
        }
        let mut mode = self.inner.mode.lock().await;
        if let SendMode::WebSocket(sink) = &mut *mode {
            let _ = sink.close().await;
        }
        *mode = SendMode::Offline;
    }
}
