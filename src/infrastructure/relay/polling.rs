//! HTTP long-polling leg of the relay transport

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::{mpsc, watch};

use crate::application::errors::TransportError;
use crate::domain::traits::{Frame, TransportEvent};

/// Relay handshake response.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
}

/// Open a relay session and learn which upgrades it offers.
pub(super) async fn handshake(client: &Client, base_url: &str) -> Result<Handshake, TransportError> {
    let url = format!("{}/handshake", base_url.trim_end_matches('/'));
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| TransportError::Network(e.to_string()))?;

    if !response.status().is_success() {
        return Err(TransportError::Handshake(format!(
            "relay handshake error: {}",
            response.status()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| TransportError::Handshake(e.to_string()))
}

/// Push one outbound frame over the polling leg.
pub(super) async fn emit(
    client: &Client,
    base_url: &str,
    sid: &str,
    frame: &Frame,
) -> Result<(), TransportError> {
    let url = format!("{}/emit", base_url.trim_end_matches('/'));
    let response = client
        .post(&url)
        .query(&[("sid", sid)])
        .json(frame)
        .send()
        .await
        .map_err(|e| TransportError::Network(e.to_string()))?;

    if !response.status().is_success() {
        return Err(TransportError::Network(format!(
            "relay emit error: {}",
            response.status()
        )));
    }
    Ok(())
}

/// Long-poll receive loop. Runs until the relay errors, the consumer goes
/// away, or `stop` flips (the websocket upgrade taking over).
pub(super) async fn run_poll_loop(
    client: Client,
    base_url: String,
    sid: String,
    events: mpsc::Sender<TransportEvent>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        if *stop.borrow() {
            return;
        }
        tokio::select! {
            _ = stop.changed() => return,
            polled = poll_once(&client, &base_url, &sid) => match polled {
                Ok(frames) => {
                    for frame in frames {
                        if events.send(TransportEvent::Frame(frame)).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("relay poll failed: {}", e);
                    let _ = events
                        .send(TransportEvent::Closed {
                            reason: e.to_string(),
                        })
                        .await;
                    return;
                }
            }
        }
    }
}

/// One long-poll round trip; the relay holds the request open until it has
/// frames or its own timeout passes, then answers with a batch.
async fn poll_once(
    client: &Client,
    base_url: &str,
    sid: &str,
) -> Result<Vec<Frame>, TransportError> {
    let url = format!("{}/poll", base_url.trim_end_matches('/'));
    let response = client
        .get(&url)
        .query(&[("sid", sid)])
        .send()
        .await
        .map_err(|e| TransportError::Network(e.to_string()))?;

    if !response.status().is_success() {
        return Err(TransportError::Network(format!(
            "relay poll error: {}",
            response.status()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| TransportError::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_parses_upgrades() {
        let handshake: Handshake =
            serde_json::from_str(r#"{"sid": "s1", "upgrades": ["websocket"]}"#).unwrap();
        assert_eq!(handshake.sid, "s1");
        assert_eq!(handshake.upgrades, ["websocket"]);
    }

    #[test]
    fn handshake_upgrades_default_to_empty() {
        let handshake: Handshake = serde_json::from_str(r#"{"sid": "s2"}"#).unwrap();
        assert!(handshake.upgrades.is_empty());
    }
}
