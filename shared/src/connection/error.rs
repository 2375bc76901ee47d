use thiserror::Error;

use netrep_serde::SerdeErr;

use crate::{
    connection::packet_type::PacketType,
    types::{HostId, NetEntityId, NetEntityRole, ReplicationMode},
};

/// A peer sent something it is not entitled to send.
///
/// Every variant is disconnect-worthy: the connection is torn down and the
/// offending message is not applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// Packet framing could not be decoded
    #[error("Malformed {packet_type:?} packet: {source}")]
    MalformedPacket {
        packet_type: Option<PacketType>,
        source: SerdeErr,
    },

    /// An entity update carried no usable role
    #[error("Entity {entity_id:?} update carried an invalid role")]
    InvalidRole { entity_id: NetEntityId },

    /// The sender claimed a role it is not allowed to claim in this mode
    #[error("Entity {entity_id:?} update with role {role:?} is not permitted in mode {mode:?}")]
    UnauthorizedRole {
        entity_id: NetEntityId,
        role: NetEntityRole,
        mode: ReplicationMode,
    },

    /// The sender tried to push state to an entity it does not control
    #[error("Entity {entity_id:?} update from a remote whose role is {remote_role:?}")]
    RemoteNotAutonomous {
        entity_id: NetEntityId,
        remote_role: NetEntityRole,
    },

    /// Updates to a locally authoritative entity must come from the authority
    #[error("Entity {entity_id:?} is locally authoritative but received role {role:?}")]
    AuthorityConflict {
        entity_id: NetEntityId,
        role: NetEntityRole,
    },

    /// A creation or deletion arrived from a peer that cannot create entities
    #[error("Entity {entity_id:?} lifecycle change from a peer without authority")]
    UnauthorizedLifecycleChange { entity_id: NetEntityId },

    /// The entity world refused to construct an entity
    #[error("Entity {entity_id:?} could not be created from remote data")]
    EntityCreationFailed { entity_id: NetEntityId },

    /// The entity world refused to apply an update payload
    #[error("Entity {entity_id:?} rejected an update payload")]
    UpdateRejected { entity_id: NetEntityId },

    /// The entity rejected an RPC
    #[error("Entity {entity_id:?} rejected rpc {rpc_index}")]
    RpcRejected { entity_id: NetEntityId, rpc_index: u16 },

    /// A migration arrived on a connection that does not allow it
    #[error("Migration of entity {entity_id:?} received in mode {mode:?}")]
    MigrationNotAllowed {
        entity_id: NetEntityId,
        mode: ReplicationMode,
    },

    /// A migration addressed to another host
    #[error("Migration of entity {entity_id:?} was addressed to host {destination:?}")]
    MigrationToWrongHost {
        entity_id: NetEntityId,
        destination: HostId,
    },

    /// The entity world could not rebuild a migrated entity
    #[error("Migrated entity {entity_id:?} could not be constructed")]
    MigrationFailed { entity_id: NetEntityId },
}
