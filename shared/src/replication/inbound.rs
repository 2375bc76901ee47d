use log::{debug, trace};

use crate::{
    connection::{
        connection::Connection, connection_listener::ConnectionListener,
        error::ProtocolViolation,
    },
    messages::{
        entity_rpc_message::EntityRpcMessage,
        entity_update_message::{EntityUpdateKind, EntityUpdateMessage},
    },
    replication::{
        entity_replication_manager::EntityReplicationManager,
        entity_replicator::EntityReplicator, events::ReplicationEvent,
    },
    types::{NetEntityRole, PacketId, PacketIndex, ReplicationMode, TimeMs},
    world::entity_world::EntityWorldMut,
    wrapping_number::wrapping_diff,
};

// Leaves room below the first index for packets that arrive out of order
const FIRST_PACKET_INDEX: PacketIndex = 1 << 16;

/// Verdict on an inbound entity update
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateValidity {
    /// Newer than anything applied for the entity, and permitted
    HandleMessage,
    /// Stale, duplicate or for an entity that is gone. Not an error.
    DropMessage,
    /// The sender is not entitled to send this
    DropMessageAndDisconnect(ProtocolViolation),
}

impl EntityReplicationManager {
    /// Places a remote packet id on the connection's non-wrapping packet
    /// index, relative to the newest packet seen so far
    pub fn packet_index(&self, packet_id: PacketId) -> PacketIndex {
        match self.newest_packet {
            None => FIRST_PACKET_INDEX,
            Some((newest_id, newest_index)) => {
                newest_index.saturating_add_signed(i64::from(wrapping_diff(newest_id, packet_id)))
            }
        }
    }

    pub(super) fn note_packet(&mut self, packet_id: PacketId) {
        let packet_index = self.packet_index(packet_id);
        if self
            .newest_packet
            .map_or(true, |(_, newest_index)| packet_index > newest_index)
        {
            self.newest_packet = Some((packet_id, packet_index));
        }
    }

    /// Decides what to do with an inbound update carried by packet
    /// `packet_id`, without changing any state
    pub fn validate_update(&self, message: &EntityUpdateMessage, packet_id: PacketId) -> UpdateValidity {
        let entity_id = message.entity_id;
        let replicator = self.replicators.get(&entity_id);

        if message.role == NetEntityRole::Invalid {
            return UpdateValidity::DropMessageAndDisconnect(ProtocolViolation::InvalidRole {
                entity_id,
            });
        }

        match self.mode {
            ReplicationMode::LocalServerToRemoteClient => {
                // Clients only ever push state for entities they control
                if message.kind != EntityUpdateKind::Update {
                    return UpdateValidity::DropMessageAndDisconnect(
                        ProtocolViolation::UnauthorizedLifecycleChange { entity_id },
                    );
                }
                if message.role != NetEntityRole::Authority {
                    return UpdateValidity::DropMessageAndDisconnect(
                        ProtocolViolation::UnauthorizedRole {
                            entity_id,
                            role: message.role,
                            mode: self.mode,
                        },
                    );
                }
                let Some(replicator) = replicator else {
                    // the entity may just have left the client's window
                    return UpdateValidity::DropMessage;
                };
                if replicator.remote_role() != NetEntityRole::Autonomous {
                    if replicator.is_pending_removal() {
                        return UpdateValidity::DropMessage;
                    }
                    return UpdateValidity::DropMessageAndDisconnect(
                        ProtocolViolation::RemoteNotAutonomous {
                            entity_id,
                            remote_role: replicator.remote_role(),
                        },
                    );
                }
            }
            ReplicationMode::LocalClientToRemoteServer => {
                // A server never hands authority to a client
                if message.role == NetEntityRole::Authority {
                    return UpdateValidity::DropMessageAndDisconnect(
                        ProtocolViolation::UnauthorizedRole {
                            entity_id,
                            role: message.role,
                            mode: self.mode,
                        },
                    );
                }
            }
            ReplicationMode::LocalServerToRemoteServer => {
                // Authority only moves between servers through migration
                if message.role == NetEntityRole::Authority {
                    match replicator {
                        Some(replicator)
                            if replicator.remote_role() == NetEntityRole::Autonomous => {}
                        Some(replicator) if replicator.is_pending_removal() => {
                            return UpdateValidity::DropMessage;
                        }
                        _ => {
                            return UpdateValidity::DropMessageAndDisconnect(
                                ProtocolViolation::UnauthorizedRole {
                                    entity_id,
                                    role: message.role,
                                    mode: self.mode,
                                },
                            );
                        }
                    }
                }
            }
        }

        let Some(replicator) = replicator else {
            return match message.kind {
                EntityUpdateKind::Create => UpdateValidity::HandleMessage,
                // never created here, or already destroyed
                _ => UpdateValidity::DropMessage,
            };
        };

        if replicator.local_role() == NetEntityRole::Authority
            && message.role != NetEntityRole::Authority
        {
            return UpdateValidity::DropMessageAndDisconnect(
                ProtocolViolation::AuthorityConflict {
                    entity_id,
                    role: message.role,
                },
            );
        }
        if replicator.is_stale(self.packet_index(packet_id)) {
            return UpdateValidity::DropMessage;
        }
        if replicator.is_pending_removal() && message.kind != EntityUpdateKind::Create {
            return UpdateValidity::DropMessage;
        }

        UpdateValidity::HandleMessage
    }

    /// Applies every update in a packet. The whole packet is validated first
    /// so a violation anywhere leaves every replicator untouched.
    pub(super) fn handle_entity_update_messages<W: EntityWorldMut>(
        &mut self,
        now: TimeMs,
        packet_id: PacketId,
        updates: Vec<EntityUpdateMessage>,
        world: &mut W,
        connection: &mut dyn Connection,
        listener: &mut dyn ConnectionListener,
    ) -> bool {
        for message in &updates {
            if let UpdateValidity::DropMessageAndDisconnect(violation) =
                self.validate_update(message, packet_id)
            {
                self.protocol_violation(connection, listener, violation);
                return false;
            }
        }

        for message in updates {
            if !self.handle_entity_update_message(now, packet_id, message, world, connection, listener) {
                return false;
            }
        }
        true
    }

    /// Validates and applies one entity update. Returns false if the
    /// connection was disconnected.
    pub fn handle_entity_update_message<W: EntityWorldMut>(
        &mut self,
        now: TimeMs,
        packet_id: PacketId,
        message: EntityUpdateMessage,
        world: &mut W,
        connection: &mut dyn Connection,
        listener: &mut dyn ConnectionListener,
    ) -> bool {
        self.note_packet(packet_id);
        match self.validate_update(&message, packet_id) {
            UpdateValidity::HandleMessage => {}
            UpdateValidity::DropMessage => {
                trace!(
                    "Dropping {:?} for entity {:?} from packet {}",
                    message.kind,
                    message.entity_id,
                    packet_id
                );
                return true;
            }
            UpdateValidity::DropMessageAndDisconnect(violation) => {
                self.protocol_violation(connection, listener, violation);
                return false;
            }
        }

        let violation = match message.kind {
            EntityUpdateKind::Delete => {
                self.handle_entity_delete_message(now, packet_id, &message, world);
                None
            }
            EntityUpdateKind::Create => self.handle_entity_create_message(packet_id, &message, world),
            EntityUpdateKind::Update | EntityUpdateKind::Rebase => {
                self.apply_entity_update(packet_id, &message, world)
            }
        };

        match violation {
            None => true,
            Some(violation) => {
                self.protocol_violation(connection, listener, violation);
                false
            }
        }
    }

    fn apply_entity_update<W: EntityWorldMut>(
        &mut self,
        packet_id: PacketId,
        message: &EntityUpdateMessage,
        world: &mut W,
    ) -> Option<ProtocolViolation> {
        let packet_index = self.packet_index(packet_id);
        let replicator = self.replicators.get_mut(&message.entity_id)?;
        replicator.note_received(packet_id, packet_index, message.sequence);
        match replicator.update_target(world, &message.payload) {
            Ok(()) => None,
            Err(_) => Some(ProtocolViolation::UpdateRejected {
                entity_id: message.entity_id,
            }),
        }
    }

    fn handle_entity_create_message<W: EntityWorldMut>(
        &mut self,
        packet_id: PacketId,
        message: &EntityUpdateMessage,
        world: &mut W,
    ) -> Option<ProtocolViolation> {
        let entity_id = message.entity_id;

        if let Some(replicator) = self.replicators.get(&entity_id) {
            if !replicator.is_pending_removal() {
                // a resent creation we already applied carries full state
                return self.apply_entity_update(packet_id, message, world);
            }
            // deleted earlier, and created again by a newer packet
            if let Some(mut replicator) = self.replicators.remove(&entity_id) {
                replicator.destroy();
            }
            self.pending_removal.remove(&entity_id);
        }

        if world
            .create_entity(entity_id, message.role, &message.payload)
            .is_err()
        {
            return Some(ProtocolViolation::EntityCreationFailed { entity_id });
        }

        let mut replicator = EntityReplicator::new(entity_id, message.role, NetEntityRole::Authority);
        replicator.bind_remote_creation(
            packet_id,
            self.packet_index(packet_id),
            message.sequence,
            world.change_cursor(entity_id),
        );
        self.pending_activation.push_back(entity_id);
        if message.role == NetEntityRole::Autonomous {
            self.events
                .raise(ReplicationEvent::AutonomousEntityReplicatorCreated { entity_id });
        }

        // RPCs that raced ahead of the creation run before anything newer
        let dispatch = self.orphaned_rpcs.dispatch_orphaned_rpcs(world, &replicator);
        if dispatch.dispatched > 0 {
            debug!(
                "Replayed {} orphaned rpc(s) for entity {:?}",
                dispatch.dispatched, entity_id
            );
        }
        self.replicators.insert(entity_id, replicator);

        dispatch
            .rejected
            .map(|rpc_index| ProtocolViolation::RpcRejected {
                entity_id,
                rpc_index,
            })
    }

    /// Removes the local copy of an entity the remote authority deleted. The
    /// replicator stays resolvable for the removal grace period.
    pub fn handle_entity_delete_message<W: EntityWorldMut>(
        &mut self,
        now: TimeMs,
        packet_id: PacketId,
        message: &EntityUpdateMessage,
        world: &mut W,
    ) {
        let entity_id = message.entity_id;
        let grace_ms = self.pending_removal_ms();
        let packet_index = self.packet_index(packet_id);
        let Some(replicator) = self.replicators.get_mut(&entity_id) else {
            return;
        };
        replicator.note_received(packet_id, packet_index, message.sequence);
        replicator.mark_pending_removal(now, grace_ms);
        self.pending_removal.insert(entity_id);
        self.orphaned_rpcs.drop_orphaned_rpcs(entity_id);
        world.remove_entity(entity_id);
    }

    /// Applies an inbound RPC, or buffers it if its entity does not exist
    /// here yet. Returns false if the connection was disconnected.
    pub fn handle_entity_rpc_message<W: EntityWorldMut>(
        &mut self,
        now: TimeMs,
        rpc: EntityRpcMessage,
        world: &mut W,
        connection: &mut dyn Connection,
        listener: &mut dyn ConnectionListener,
    ) -> bool {
        let Some(replicator) = self.replicators.get(&rpc.entity_id) else {
            trace!("Buffering orphaned rpc for entity {:?}", rpc.entity_id);
            self.orphaned_rpcs.add_orphaned_rpc(now, rpc);
            return true;
        };

        if replicator.is_pending_removal() {
            debug!(
                "Dropping rpc {} for removed entity {:?}",
                rpc.rpc_index, rpc.entity_id
            );
            return true;
        }

        if replicator.handle_rpc_message(world, &rpc) {
            return true;
        }
        self.protocol_violation(
            connection,
            listener,
            ProtocolViolation::RpcRejected {
                entity_id: rpc.entity_id,
                rpc_index: rpc.rpc_index,
            },
        );
        false
    }
}
