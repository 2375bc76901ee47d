use thiserror::Error;

use crate::types::{HostId, NetEntityId};

/// Reasons a local migration request is rejected.
///
/// A migration that fails with one of these leaves the entity and its
/// replicator untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    /// Migration is only allowed between two servers
    #[error("Entity {entity_id:?} cannot migrate: connection does not replicate server to server")]
    ModeDoesNotAllowMigration { entity_id: NetEntityId },

    /// The connection has not been told which host it talks to
    #[error("Entity {entity_id:?} cannot migrate: remote host id is not set")]
    RemoteHostUnknown { entity_id: NetEntityId },

    /// This host is not the authority for the entity
    #[error("Entity {entity_id:?} cannot migrate: local host is not its authority")]
    NotLocallyAuthoritative { entity_id: NetEntityId },

    /// A migration for this entity has already been sent and not acknowledged
    #[error("Entity {entity_id:?} already has a migration in flight")]
    AlreadyMigrating { entity_id: NetEntityId },

    /// The entity world could not produce full state for the entity
    #[error("Entity {entity_id:?} has no migration data available")]
    MigrationDataUnavailable { entity_id: NetEntityId },

    /// The connection refused the migration packet
    #[error("Failed to send migration of entity {entity_id:?} to host {destination:?}")]
    SendFailed {
        entity_id: NetEntityId,
        destination: HostId,
    },
}
