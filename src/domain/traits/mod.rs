//! Domain traits - Abstractions for infrastructure implementations

pub mod provisioner;
pub mod transport;

pub use provisioner::Provisioner;
pub use transport::{
    events, ConnectionState, Frame, Transport, TransportEvent, TransportKind,
};
