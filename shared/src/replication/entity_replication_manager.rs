use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    time::{Duration, Instant},
};

use log::{debug, warn};

use crate::{
    connection::{
        connection::{Connection, DisconnectReason},
        connection_listener::ConnectionListener,
        error::ProtocolViolation,
        standard_header::PacketHeader,
    },
    messages::{entity_rpc_message::EntityRpcMessage, replication_packet::ReplicationPacket},
    replication::{
        config::ReplicationConfig,
        entity_domain::EntityDomain,
        entity_replicator::{EntityReplicator, ReplicatorState},
        events::{EventHandlerId, ReplicationEvent, ReplicationEvents},
        orphaned_rpcs::OrphanedEntityRpcs,
        replication_window::ReplicationWindow,
    },
    scheduled_event::{duration_to_ms, ScheduledEvent},
    types::{HostId, NetEntityId, NetEntityRole, PacketId, PacketIndex, ReplicationMode, TimeMs},
    world::entity_world::EntityWorldMut,
};

/// Owns every entity replicator for one connection and drives their
/// lifecycle: window selection, delta packing, inbound validation, orphaned
/// RPCs and authority migration.
///
/// The manager never owns the connection, listener or entity world; they are
/// borrowed for the duration of each call.
pub struct EntityReplicationManager {
    pub(super) mode: ReplicationMode,
    pub(super) local_host_id: HostId,
    pub(super) remote_host_id: HostId,
    pub(super) config: ReplicationConfig,

    pub(super) replicators: BTreeMap<NetEntityId, EntityReplicator>,
    /// Priority order reported by the window at its last update
    pub(super) window_order: Vec<NetEntityId>,
    pub(super) pending_creation: HashSet<NetEntityId>,
    pub(super) pending_activation: VecDeque<NetEntityId>,
    pub(super) pending_removal: BTreeSet<NetEntityId>,
    /// Replicators checked first on the next send, ahead of window order
    pub(super) pending_send: BTreeSet<NetEntityId>,
    pub(super) orphaned_rpcs: OrphanedEntityRpcs,
    /// Source-side migrations awaiting the destination's ack
    pub(super) migrations_in_flight: HashMap<NetEntityId, HostId>,
    /// Newest remote packet id seen and its extended index
    pub(super) newest_packet: Option<(PacketId, PacketIndex)>,

    pub(super) replication_window: Box<dyn ReplicationWindow>,
    pub(super) entity_domain: Box<dyn EntityDomain>,
    pub(super) update_window_event: ScheduledEvent,
    pub(super) clear_removed_replicators_event: ScheduledEvent,
    /// Set when the window offered entities the pending-creation bound held back
    pub(super) window_backpressured: bool,

    pub(super) events: ReplicationEvents,
}

impl EntityReplicationManager {
    pub fn new(
        mode: ReplicationMode,
        local_host_id: HostId,
        config: ReplicationConfig,
        replication_window: Box<dyn ReplicationWindow>,
        entity_domain: Box<dyn EntityDomain>,
    ) -> Self {
        Self {
            mode,
            local_host_id,
            remote_host_id: HostId::INVALID,
            orphaned_rpcs: OrphanedEntityRpcs::new(duration_to_ms(config.orphaned_rpc_timeout)),
            update_window_event: ScheduledEvent::new(config.update_window_interval),
            clear_removed_replicators_event: ScheduledEvent::new(
                config.clear_removed_replicators_interval,
            ),
            config,
            replicators: BTreeMap::new(),
            window_order: Vec::new(),
            pending_creation: HashSet::new(),
            pending_activation: VecDeque::new(),
            pending_removal: BTreeSet::new(),
            pending_send: BTreeSet::new(),
            migrations_in_flight: HashMap::new(),
            newest_packet: None,
            replication_window,
            entity_domain,
            window_backpressured: false,
            events: ReplicationEvents::new(),
        }
    }

    // Configuration

    pub fn mode(&self) -> ReplicationMode {
        self.mode
    }

    /// True when one end of the connection is a client
    pub fn is_update_mode_to_server_client(&self) -> bool {
        self.mode != ReplicationMode::LocalServerToRemoteServer
    }

    pub fn local_host_id(&self) -> HostId {
        self.local_host_id
    }

    pub fn remote_host_id(&self) -> HostId {
        self.remote_host_id
    }

    pub fn set_remote_host_id(&mut self, remote_host_id: HostId) {
        self.remote_host_id = remote_host_id;
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    pub fn set_max_remote_entities_pending_creation_count(&mut self, max_pending: usize) {
        self.config.max_remote_entities_pending_creation = max_pending;
    }

    pub fn set_entity_activation_time_slice(&mut self, time_slice: Duration) {
        self.config.entity_activation_time_slice = time_slice;
    }

    pub fn set_entity_pending_removal(&mut self, grace_period: Duration) {
        self.config.entity_pending_removal = grace_period;
    }

    pub fn set_replication_window(&mut self, replication_window: Box<dyn ReplicationWindow>) {
        self.replication_window = replication_window;
        self.update_window_event.ring_manual();
    }

    pub fn set_entity_domain(&mut self, entity_domain: Box<dyn EntityDomain>) {
        self.entity_domain = entity_domain;
    }

    pub(super) fn pending_removal_ms(&self) -> TimeMs {
        duration_to_ms(self.config.entity_pending_removal)
    }

    pub(super) fn resend_timeout_ms(&self) -> TimeMs {
        duration_to_ms(self.config.resend_timeout)
    }

    // Queries

    pub fn entity_replicator(&self, entity_id: NetEntityId) -> Option<&EntityReplicator> {
        self.replicators.get(&entity_id)
    }

    pub fn entity_replicator_ids(&self) -> Vec<NetEntityId> {
        self.replicators.keys().copied().collect()
    }

    /// Number of live replicators whose local role is `local_role`
    pub fn entity_replicator_count(&self, local_role: NetEntityRole) -> usize {
        self.replicators
            .values()
            .filter(|replicator| {
                replicator.local_role() == local_role && !replicator.is_pending_removal()
            })
            .count()
    }

    /// Whether the remote host is the authority for `entity_id`
    pub fn has_remote_authority(&self, entity_id: NetEntityId) -> bool {
        self.replicators.get(&entity_id).is_some_and(|replicator| {
            replicator.remote_role() == NetEntityRole::Authority
                && !replicator.is_pending_removal()
        })
    }

    pub fn pending_creation_count(&self) -> usize {
        self.pending_creation.len()
    }

    pub fn is_pending_creation(&self, entity_id: NetEntityId) -> bool {
        self.pending_creation.contains(&entity_id)
    }

    pub fn pending_activation_count(&self) -> usize {
        self.pending_activation.len()
    }

    pub fn pending_removal_count(&self) -> usize {
        self.pending_removal.len()
    }

    pub fn orphaned_rpcs(&self) -> &OrphanedEntityRpcs {
        &self.orphaned_rpcs
    }

    pub fn is_migrating(&self, entity_id: NetEntityId) -> bool {
        self.migrations_in_flight.contains_key(&entity_id)
    }

    // Events

    pub fn add_event_handler(
        &mut self,
        handler: impl FnMut(&ReplicationEvent) + 'static,
    ) -> EventHandlerId {
        self.events.add_handler(handler)
    }

    pub fn remove_event_handler(&mut self, id: EventHandlerId) -> bool {
        self.events.remove_handler(id)
    }

    /// Events raised while no handler was registered
    pub fn take_events(&mut self) -> Vec<ReplicationEvent> {
        self.events.take_events()
    }

    // Outbound requests

    /// Makes the next send check this replicator before any other
    pub fn add_replicator_to_pending_send(&mut self, entity_id: NetEntityId) {
        if self.replicators.contains_key(&entity_id) {
            self.pending_send.insert(entity_id);
        }
    }

    /// Resends the entity's full state, after which diffs resume from it
    pub fn set_entity_rebasing(&mut self, entity_id: NetEntityId) {
        let Some(replicator) = self.replicators.get_mut(&entity_id) else {
            return;
        };
        replicator.set_rebasing();
        self.pending_send.insert(entity_id);
    }

    /// Queues an outbound RPC on its entity's replicator, to go out with the
    /// next send. Returns false if the entity is not replicated here.
    pub fn add_deferred_rpc_message(&mut self, rpc: EntityRpcMessage) -> bool {
        match self.replicators.get_mut(&rpc.entity_id) {
            Some(replicator) if replicator.state() != ReplicatorState::Destroyed => {
                replicator.queue_rpc(rpc);
                true
            }
            _ => {
                warn!(
                    "Dropping rpc {} for entity {:?}, it has no replicator",
                    rpc.rpc_index, rpc.entity_id
                );
                false
            }
        }
    }

    // Lifecycle

    /// Activates entities created by the remote host, in arrival order, until
    /// the per-tick time slice is spent. At least one entity is activated per
    /// call so a tiny slice cannot stall activation.
    pub fn activate_pending_entities<W: EntityWorldMut>(&mut self, world: &mut W) -> usize {
        let time_slice = self.config.entity_activation_time_slice;
        let start = Instant::now();
        let mut activated = 0;

        while let Some(entity_id) = self.pending_activation.front().copied() {
            if activated > 0 && !time_slice.is_zero() && start.elapsed() >= time_slice {
                debug!(
                    "Activation time slice spent, {} entities wait for the next tick",
                    self.pending_activation.len()
                );
                break;
            }
            self.pending_activation.pop_front();

            let Some(replicator) = self.replicators.get_mut(&entity_id) else {
                continue;
            };
            if replicator.state() != ReplicatorState::Created {
                // removed before it ever went live
                continue;
            }

            world.activate_entity(entity_id);
            replicator.activate();
            self.events
                .raise(ReplicationEvent::EntityActivated { entity_id });
            activated += 1;
        }

        activated
    }

    /// Drops every replicator and pending set.
    ///
    /// When `for_migration` is set, the connection's entities are being
    /// handed off rather than the connection closing: queued reliable RPCs of
    /// entities that are not migrating are flushed first, and migrations
    /// already in flight stay tracked so their acks still complete them.
    /// Otherwise in-flight migrations are aborted and local authority restored.
    pub fn clear<W: EntityWorldMut>(
        &mut self,
        for_migration: bool,
        world: &mut W,
        connection: &mut dyn Connection,
        listener: &mut dyn ConnectionListener,
    ) {
        if for_migration {
            let migrating = &self.migrations_in_flight;
            let draining: Vec<NetEntityId> = self
                .replicators
                .keys()
                .filter(|entity_id| !migrating.contains_key(entity_id))
                .copied()
                .collect();
            self.flush_reliable_rpcs(&draining, connection, listener);
        } else {
            let mut aborted: Vec<(NetEntityId, HostId)> =
                self.migrations_in_flight.drain().collect();
            aborted.sort();
            for (entity_id, destination) in aborted {
                warn!(
                    "Migration of entity {:?} to host {:?} was never confirmed, restoring authority",
                    entity_id, destination
                );
                world.abort_migration(entity_id);
                self.events.raise(ReplicationEvent::EntityMigrationAborted {
                    entity_id,
                    destination,
                });
            }
        }

        for replicator in self.replicators.values_mut() {
            replicator.destroy();
        }
        self.replicators.clear();
        self.window_order.clear();
        self.pending_creation.clear();
        self.pending_activation.clear();
        self.pending_removal.clear();
        self.pending_send.clear();
        self.orphaned_rpcs.clear();
        self.window_backpressured = false;
    }

    // Inbound

    /// Decodes and applies one inbound replication packet. Returns false if
    /// the packet was a protocol violation, in which case the connection has
    /// been disconnected.
    pub fn handle_packet<W: EntityWorldMut>(
        &mut self,
        now: TimeMs,
        header: &dyn PacketHeader,
        payload: &[u8],
        world: &mut W,
        connection: &mut dyn Connection,
        listener: &mut dyn ConnectionListener,
    ) -> bool {
        let packet = match ReplicationPacket::read(payload) {
            Ok(packet) => packet,
            Err((packet_type, source)) => {
                self.protocol_violation(
                    connection,
                    listener,
                    ProtocolViolation::MalformedPacket {
                        packet_type,
                        source,
                    },
                );
                return false;
            }
        };

        let packet_id = header.packet_id();
        self.note_packet(packet_id);

        match packet {
            ReplicationPacket::EntityUpdates { updates, .. } => self.handle_entity_update_messages(
                now,
                packet_id,
                updates,
                world,
                connection,
                listener,
            ),
            ReplicationPacket::EntityRpcs(rpcs) => {
                for rpc in rpcs {
                    if !self.handle_entity_rpc_message(now, rpc, world, connection, listener) {
                        return false;
                    }
                }
                true
            }
            ReplicationPacket::EntityMigration(message) => {
                self.handle_entity_migration_message(message, world, connection, listener)
            }
            ReplicationPacket::EntityMigrationAck(ack) => {
                self.handle_entity_migration_ack(ack, world, connection, listener)
            }
        }
    }

    pub(super) fn protocol_violation(
        &mut self,
        connection: &mut dyn Connection,
        listener: &mut dyn ConnectionListener,
        violation: ProtocolViolation,
    ) {
        let connection_id = connection.connection_id();
        warn!("Disconnecting {:?}: {}", connection_id, violation);
        listener.on_protocol_violation(connection_id, &violation);
        connection.disconnect(DisconnectReason::ProtocolViolation);
    }
}
