use log::{debug, info, warn};

use crate::{
    connection::{
        connection::Connection, connection_listener::ConnectionListener,
        error::ProtocolViolation, packet_type::PacketType,
    },
    messages::{
        entity_migration_message::{EntityMigrationAck, EntityMigrationMessage},
        replication_packet::ReplicationPacket,
    },
    replication::{
        entity_replication_manager::EntityReplicationManager, error::MigrationError,
        events::ReplicationEvent,
    },
    types::{NetEntityId, NetEntityRole, ReplicationMode, TimeMs},
    world::entity_world::{EntityWorldMut, EntityWorldRef},
};

impl EntityReplicationManager {
    fn check_migration<W: EntityWorldRef + ?Sized>(
        &self,
        entity_id: NetEntityId,
        world: &W,
    ) -> Result<(), MigrationError> {
        if self.mode != ReplicationMode::LocalServerToRemoteServer {
            return Err(MigrationError::ModeDoesNotAllowMigration { entity_id });
        }
        if !self.remote_host_id.is_valid() {
            return Err(MigrationError::RemoteHostUnknown { entity_id });
        }
        if self.migrations_in_flight.contains_key(&entity_id) {
            return Err(MigrationError::AlreadyMigrating { entity_id });
        }
        if world.entity_role(entity_id) != Some(NetEntityRole::Authority) {
            return Err(MigrationError::NotLocallyAuthoritative { entity_id });
        }
        Ok(())
    }

    /// Whether `migrate_entity` would accept `entity_id` right now
    pub fn can_migrate_entity<W: EntityWorldRef + ?Sized>(&self, entity_id: NetEntityId, world: &W) -> bool {
        self.check_migration(entity_id, world).is_ok()
    }

    /// Hands authority over `entity_id` to the remote host.
    ///
    /// The entity's full state is sent reliably and local authority is
    /// released. The migration stays in flight until the destination acks
    /// it; if the connection closes first, authority is restored locally.
    pub fn migrate_entity<W: EntityWorldMut>(
        &mut self,
        now: TimeMs,
        entity_id: NetEntityId,
        world: &mut W,
        connection: &mut dyn Connection,
    ) -> Result<(), MigrationError> {
        self.check_migration(entity_id, &*world)?;
        let destination = self.remote_host_id;

        self.events.raise(ReplicationEvent::PreEntityMigration {
            entity_id,
            destination,
        });

        let Some(state) = world.write_migration_data(entity_id) else {
            self.events.raise(ReplicationEvent::EntityMigrationAborted {
                entity_id,
                destination,
            });
            return Err(MigrationError::MigrationDataUnavailable { entity_id });
        };
        let message = EntityMigrationMessage {
            entity_id,
            destination,
            state,
        };
        let bytes = ReplicationPacket::write_single(PacketType::EntityMigration, &message);
        if !connection.send_reliable_packet(&bytes) {
            self.events.raise(ReplicationEvent::EntityMigrationAborted {
                entity_id,
                destination,
            });
            return Err(MigrationError::SendFailed {
                entity_id,
                destination,
            });
        }

        world.begin_migration(entity_id, destination);

        // the destination drops its observer copy itself, no delete is sent
        let grace_ms = self.pending_removal_ms();
        if let Some(replicator) = self.replicators.get_mut(&entity_id) {
            replicator.mark_pending_removal_silently(now, grace_ms);
            self.pending_removal.insert(entity_id);
        }
        self.pending_creation.remove(&entity_id);
        self.migrations_in_flight.insert(entity_id, destination);

        info!("Migrating entity {:?} to host {:?}", entity_id, destination);
        Ok(())
    }

    /// Migrates every locally authoritative entity replicated on this
    /// connection. Returns how many migrations were started.
    pub fn migrate_all_entities<W: EntityWorldMut>(
        &mut self,
        now: TimeMs,
        world: &mut W,
        connection: &mut dyn Connection,
    ) -> usize {
        let candidates: Vec<NetEntityId> = self
            .replicators
            .values()
            .filter(|replicator| {
                replicator.local_role() == NetEntityRole::Authority
                    && !replicator.is_pending_removal()
            })
            .map(|replicator| replicator.entity_id())
            .collect();

        let mut migrated = 0;
        for entity_id in candidates {
            match self.migrate_entity(now, entity_id, world, connection) {
                Ok(()) => migrated += 1,
                Err(err) => warn!("{}", err),
            }
        }
        migrated
    }

    /// Called when a locally authoritative entity leaves this host's domain
    pub fn on_entity_exit_domain<W: EntityWorldMut>(
        &mut self,
        now: TimeMs,
        entity_id: NetEntityId,
        world: &mut W,
        connection: &mut dyn Connection,
    ) -> Result<(), MigrationError> {
        debug!("Entity {:?} left the local domain", entity_id);
        self.migrate_entity(now, entity_id, world, connection)
    }

    /// Migrates replicated entities the domain no longer claims
    pub(super) fn check_entity_domain<W: EntityWorldMut>(
        &mut self,
        now: TimeMs,
        world: &mut W,
        connection: &mut dyn Connection,
    ) {
        let outside: Vec<NetEntityId> = self
            .replicators
            .values()
            .filter(|replicator| {
                replicator.local_role() == NetEntityRole::Authority
                    && !replicator.is_pending_removal()
                    && !self.entity_domain.is_entity_in_domain(replicator.entity_id())
            })
            .map(|replicator| replicator.entity_id())
            .collect();

        for entity_id in outside {
            if let Err(err) = self.on_entity_exit_domain(now, entity_id, world, connection) {
                warn!("{}", err);
            }
        }
    }

    /// Destination side of a migration: drops the observer copy, rebuilds
    /// the entity under local authority and acks the source
    pub(super) fn handle_entity_migration_message<W: EntityWorldMut>(
        &mut self,
        message: EntityMigrationMessage,
        world: &mut W,
        connection: &mut dyn Connection,
        listener: &mut dyn ConnectionListener,
    ) -> bool {
        let entity_id = message.entity_id;

        if self.mode != ReplicationMode::LocalServerToRemoteServer {
            self.protocol_violation(
                connection,
                listener,
                ProtocolViolation::MigrationNotAllowed {
                    entity_id,
                    mode: self.mode,
                },
            );
            return false;
        }
        if message.destination != self.local_host_id {
            self.protocol_violation(
                connection,
                listener,
                ProtocolViolation::MigrationToWrongHost {
                    entity_id,
                    destination: message.destination,
                },
            );
            return false;
        }

        if let Some(mut replicator) = self.replicators.remove(&entity_id) {
            if replicator.local_role() == NetEntityRole::Authority {
                // the sender is migrating an entity it never owned
                self.replicators.insert(entity_id, replicator);
                self.protocol_violation(
                    connection,
                    listener,
                    ProtocolViolation::AuthorityConflict {
                        entity_id,
                        role: NetEntityRole::Authority,
                    },
                );
                return false;
            }
            replicator.destroy();
            self.pending_removal.remove(&entity_id);
            self.pending_activation.retain(|pending| *pending != entity_id);
            world.remove_entity(entity_id);
        }
        self.orphaned_rpcs.drop_orphaned_rpcs(entity_id);

        let migrated_entity_id = match world.create_migrated_entity(entity_id, &message.state) {
            Ok(migrated_entity_id) => migrated_entity_id,
            Err(_) => {
                self.protocol_violation(
                    connection,
                    listener,
                    ProtocolViolation::MigrationFailed { entity_id },
                );
                return false;
            }
        };
        world.activate_entity(migrated_entity_id);

        let ack = EntityMigrationAck {
            entity_id,
            migrated_entity_id,
        };
        let bytes = ReplicationPacket::write_single(PacketType::EntityMigrationAck, &ack);
        let connection_id = connection.connection_id();
        if !connection.send_reliable_packet(&bytes) {
            listener.on_send_failure(connection_id, PacketType::EntityMigrationAck);
        }

        info!(
            "Entity {:?} migrated here from host {:?} as {:?}",
            entity_id, self.remote_host_id, migrated_entity_id
        );
        self.events.raise(ReplicationEvent::PostEntityMigration {
            entity_id: migrated_entity_id,
            migrated_from: entity_id,
            remote_host_id: self.remote_host_id,
            connection_id,
        });
        true
    }

    /// Source side: the destination owns the entity now
    pub(super) fn handle_entity_migration_ack<W: EntityWorldMut>(
        &mut self,
        ack: EntityMigrationAck,
        world: &mut W,
        connection: &mut dyn Connection,
        listener: &mut dyn ConnectionListener,
    ) -> bool {
        let entity_id = ack.entity_id;
        if self.mode != ReplicationMode::LocalServerToRemoteServer {
            self.protocol_violation(
                connection,
                listener,
                ProtocolViolation::MigrationNotAllowed {
                    entity_id,
                    mode: self.mode,
                },
            );
            return false;
        }

        let Some(destination) = self.migrations_in_flight.remove(&entity_id) else {
            debug!("Ignoring migration ack for entity {:?}, none in flight", entity_id);
            return true;
        };

        world.complete_migration(entity_id);
        info!(
            "Host {:?} confirmed migration of entity {:?} as {:?}",
            destination, entity_id, ack.migrated_entity_id
        );
        self.events.raise(ReplicationEvent::EntityMigrationCompleted {
            entity_id,
            destination,
        });
        true
    }
}
