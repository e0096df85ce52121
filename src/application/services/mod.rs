//! Application services - session coordination and the chat event loop

pub mod chat_service;
pub mod session_service;

pub use chat_service::{ChatClient, ClientEvent, Update};
pub use session_service::RoomSessionCoordinator;
