use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-assigned room identifier returned by provisioning.
///
/// A distinct type on purpose: the join payload takes a `RoomId`, so the
/// room password can never stand in for the identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Join-flow progress of the room session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Provisioning,
    Joining,
    Active,
    Failed,
}

/// The one room session of a client run.
///
/// Created empty at startup and populated progressively by the session
/// coordinator. There is no leave flow, so it is never reset.
#[derive(Debug, Clone)]
pub struct RoomSession {
    pub room_name: String,
    pub room_id: Option<RoomId>,
    pub password: String,
    pub phase: SessionPhase,
}

impl RoomSession {
    pub fn new() -> Self {
        Self {
            room_name: String::new(),
            room_id: None,
            password: String::new(),
            phase: SessionPhase::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }
}

impl Default for RoomSession {
    fn default() -> Self {
        Self::new()
    }
}
