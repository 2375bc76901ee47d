//! # Netrep Shared
//! Per-connection entity replication: replication windows, delta packing,
//! inbound validation, orphaned RPC buffering and authority migration.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub use netrep_serde::{
    BitCounter, BitReader, BitWrite, BitWriter, ConstBitLength, Serde, SerdeErr, SerdeInteger,
    UnsignedInteger, UnsignedVariableInteger, WriteOverflowError,
};

mod connection;
mod messages;
mod replication;
mod scheduled_event;
mod timeout_queue;
mod types;
mod world;
mod wrapping_number;

pub use connection::{
    connection::{Connection, DisconnectReason},
    connection_listener::ConnectionListener,
    error::ProtocolViolation,
    packet_type::PacketType,
    standard_header::{PacketHeader, StandardHeader},
};
pub use messages::{
    entity_migration_message::{EntityMigrationAck, EntityMigrationMessage},
    entity_rpc_message::EntityRpcMessage,
    entity_update_message::{EntityUpdateKind, EntityUpdateMessage},
    replication_packet::{RecordPacketWriter, ReplicationPacket},
};
pub use replication::{
    config::ReplicationConfig,
    entity_domain::{EntityDomain, ExplicitEntityDomain, FullOwnershipEntityDomain},
    entity_replication_manager::EntityReplicationManager,
    entity_replicator::{AckSummary, EntityReplicator, OutgoingUpdate, ReplicatorState},
    error::MigrationError,
    events::{EventHandlerId, ReplicationEvent, ReplicationEvents},
    inbound::UpdateValidity,
    orphaned_rpcs::{DispatchResult, OrphanedEntityRpcs},
    replication_window::{
        NullReplicationWindow, ReplicationEntry, ReplicationScope, ReplicationWindow,
        ScopedReplicationWindow,
    },
};
pub use scheduled_event::ScheduledEvent;
pub use timeout_queue::{TimeoutHandler, TimeoutId, TimeoutQueue, TimeoutResult};
pub use types::{
    ChangeCursor, ConnectionId, HostId, NetEntityId, NetEntityRole, PacketId, PacketIndex,
    ReplicationMode, TimeMs, UpdateSequence,
};
pub use world::{
    entity_world::{EntityWorldMut, EntityWorldRef},
    error::WorldError,
};
pub use wrapping_number::{sequence_greater_than, sequence_less_than, wrapping_diff};
