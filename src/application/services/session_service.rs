use std::sync::Arc;
use std::time::Duration;

use crate::application::connection::ConnectionManager;
use crate::application::errors::{ClientError, TransportError};
use crate::domain::entities::{RoomSession, SessionPhase};
use crate::domain::traits::{events, Provisioner, Transport};

/// Default wait for the relay's join acknowledgment.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Which provisioning operation a flow runs.
enum ProvisionOp {
    Create,
    Match,
}

/// Sequences room provisioning with the relay join handshake.
///
/// State machine `Idle -> Provisioning -> Joining -> Active`, with `Failed`
/// reachable from the provisioning and joining steps. Both flows return an
/// explicit result; nothing fails silently.
pub struct RoomSessionCoordinator<P: Provisioner, T: Transport> {
    provisioner: P,
    connection: Arc<ConnectionManager<T>>,
    session: RoomSession,
    join_timeout: Duration,
}

impl<P: Provisioner, T: Transport + 'static> RoomSessionCoordinator<P, T> {
    pub fn new(provisioner: P, connection: Arc<ConnectionManager<T>>) -> Self {
        Self {
            provisioner,
            connection,
            session: RoomSession::new(),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn session(&self) -> &RoomSession {
        &self.session
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase
    }

    /// Provision a new room, then join it.
    pub async fn create_flow(
        &mut self,
        room_name: &str,
        password: &str,
        display_name: &str,
    ) -> Result<(), ClientError> {
        self.run_flow(ProvisionOp::Create, room_name, password, display_name)
            .await
    }

    /// Resolve an existing room, then join it.
    pub async fn match_flow(
        &mut self,
        room_name: &str,
        password: &str,
        display_name: &str,
    ) -> Result<(), ClientError> {
        self.run_flow(ProvisionOp::Match, room_name, password, display_name)
            .await
    }

    async fn run_flow(
        &mut self,
        op: ProvisionOp,
        room_name: &str,
        password: &str,
        display_name: &str,
    ) -> Result<(), ClientError> {
        let room_name = room_name.trim();
        let password = password.trim();
        let display_name = display_name.trim();
        // Required-field check happens before any network call; the session
        // stays Idle on failure.
        if room_name.is_empty() || password.is_empty() || display_name.is_empty() {
            return Err(ClientError::Validation(
                "room name, password and display name are all required".to_string(),
            ));
        }

        self.session.room_name = room_name.to_string();
        self.session.password = password.to_string();
        self.session.phase = SessionPhase::Provisioning;

        let provisioned = match op {
            ProvisionOp::Create => self.provisioner.create_room(room_name, password).await,
            ProvisionOp::Match => self.provisioner.match_room(room_name, password).await,
        };
        let room_id = match provisioned {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("room provisioning failed for '{}': {}", room_name, e);
                self.session.phase = SessionPhase::Failed;
                return Err(ClientError::Provisioning(e));
            }
        };

        self.session.room_id = Some(room_id.clone());
        self.session.phase = SessionPhase::Joining;

        // The join payload always carries the provisioned identifier, never
        // the password.
        let payload = serde_json::json!({
            "roomName": room_name,
            "roomId": room_id,
        });
        match self
            .connection
            .emit_with_ack(events::JOIN_ROOM, payload, self.join_timeout)
            .await
        {
            Ok(_) => {
                self.session.phase = SessionPhase::Active;
                tracing::info!("joined room '{}' as '{}'", room_name, display_name);
                Ok(())
            }
            Err(TransportError::AckTimeout) => {
                self.session.phase = SessionPhase::Failed;
                Err(ClientError::Join(format!(
                    "no join acknowledgment for room '{}' within {:?}",
                    room_name, self.join_timeout
                )))
            }
            Err(e) => {
                self.session.phase = SessionPhase::Failed;
                Err(ClientError::Transport(e))
            }
        }
    }
}
