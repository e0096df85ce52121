use crate::domain::entities::Message;

/// Append-only ordered log of chat messages.
///
/// The log is owned and mutated exclusively by the store; consumers get an
/// immutable snapshot. Entries are never reordered or deleted.
#[derive(Debug, Default)]
pub struct MessageStore {
    log: Vec<Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a message with a fresh id, append it at the tail and return it
    /// for optimistic display ahead of the relay round-trip.
    ///
    /// There is no reconciliation against a later relay echo of the same
    /// message; a relay that re-broadcasts to the sender shows it twice.
    pub fn append_local(&mut self, sender: &str, text: &str) -> Message {
        let message = Message::new(sender, text);
        self.log.push(message.clone());
        message
    }

    /// Append a relayed message as received. Ids are not screened: a
    /// duplicate id lands as a second entry.
    pub fn append_remote(&mut self, message: Message) {
        self.log.push(message);
    }

    /// Immutable snapshot of the ordered log.
    pub fn snapshot(&self) -> &[Message] {
        &self.log
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}
