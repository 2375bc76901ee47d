use thiserror::Error;

use crate::types::NetEntityId;

/// Errors an entity world reports back to the replication manager
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    #[error("Entity {entity_id:?} does not exist")]
    EntityNotFound { entity_id: NetEntityId },

    #[error("Entity {entity_id:?} already exists")]
    EntityAlreadyExists { entity_id: NetEntityId },

    #[error("Payload for entity {entity_id:?} could not be decoded")]
    MalformedPayload { entity_id: NetEntityId },
}
