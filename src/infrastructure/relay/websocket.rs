//! WebSocket upgrade leg of the relay transport

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::application::errors::TransportError;
use crate::domain::traits::{Frame, TransportEvent};

pub(super) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(super) type WsSink = SplitSink<WsStream, WsMessage>;

/// Open the websocket stream for an already-handshaken session.
pub(super) async fn connect(base_url: &str, sid: &str) -> Result<WsStream, TransportError> {
    let url = stream_url(base_url, sid)?;
    let (stream, _response) = connect_async(url.as_str())
        .await
        .map_err(|e| TransportError::Network(e.to_string()))?;
    Ok(stream)
}

/// Forward inbound websocket messages as transport events until the stream
/// ends.
pub(super) async fn run_reader(mut read: SplitStream<WsStream>, events: mpsc::Sender<TransportEvent>) {
    while let Some(message) = read.next().await {
        match message {
            Ok(WsMessage::Text(text)) => match serde_json::from_str::<Frame>(text.as_str()) {
                Ok(frame) => {
                    if events.send(TransportEvent::Frame(frame)).await.is_err() {
                        return;
                    }
                }
                Err(e) => tracing::warn!("malformed relay frame dropped: {}", e),
            },
            Ok(WsMessage::Close(_)) => {
                let _ = events
                    .send(TransportEvent::Closed {
                        reason: "closed by relay".to_string(),
                    })
                    .await;
                return;
            }
            // Ping/pong and binary frames carry nothing for us.
            Ok(_) => {}
            Err(e) => {
                let _ = events
                    .send(TransportEvent::Closed {
                        reason: e.to_string(),
                    })
                    .await;
                return;
            }
        }
    }
    let _ = events
        .send(TransportEvent::Closed {
            reason: "relay stream ended".to_string(),
        })
        .await;
}

/// Serialize one frame for the websocket wire.
pub(super) fn encode(frame: &Frame) -> Result<WsMessage, TransportError> {
    let text = serde_json::to_string(frame).map_err(|e| TransportError::Codec(e.to_string()))?;
    Ok(WsMessage::text(text))
}

/// Websocket endpoint for a session, derived from the relay's HTTP url.
fn stream_url(base_url: &str, sid: &str) -> Result<String, TransportError> {
    let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if base_url.starts_with("ws://") || base_url.starts_with("wss://") {
        base_url.to_string()
    } else {
        return Err(TransportError::Handshake(format!(
            "unsupported relay url: {}",
            base_url
        )));
    };
    Ok(format!("{}/stream?sid={}", ws_base.trim_end_matches('/'), sid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_rewrites_the_scheme() {
        assert_eq!(
            stream_url("http://relay.local:4000", "s1").unwrap(),
            "ws://relay.local:4000/stream?sid=s1"
        );
        assert_eq!(
            stream_url("https://relay.local/", "s2").unwrap(),
            "wss://relay.local/stream?sid=s2"
        );
    }

    #[test]
    fn stream_url_rejects_unknown_schemes() {
        assert!(stream_url("ftp://relay.local", "s1").is_err());
    }
}
