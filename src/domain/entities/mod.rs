//! Domain entities - Core chat objects

pub mod message;
pub mod room;

pub use message::Message;
pub use room::{RoomId, RoomSession, SessionPhase};
