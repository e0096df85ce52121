use async_trait::async_trait;

use crate::application::errors::ProvisioningError;
use crate::domain::entities::RoomId;

/// Provisioner trait - abstraction for the external room provisioning service
///
/// Both operations resolve a `(room name, password)` pair to the
/// server-assigned room identifier. A failed call and a response without an
/// identifier are the same thing to callers: no id.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Create a new room and return its identifier.
    async fn create_room(&self, room_name: &str, password: &str)
        -> Result<RoomId, ProvisioningError>;

    /// Resolve an existing room to its identifier.
    async fn match_room(&self, room_name: &str, password: &str)
        -> Result<RoomId, ProvisioningError>;
}
