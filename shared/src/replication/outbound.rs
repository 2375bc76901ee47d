use std::collections::{HashSet, VecDeque};

use log::{debug, error, trace};

use crate::{
    connection::{
        connection::Connection, connection_listener::ConnectionListener,
        packet_type::PacketType,
    },
    messages::{entity_rpc_message::EntityRpcMessage, replication_packet::RecordPacketWriter},
    replication::{
        entity_replication_manager::EntityReplicationManager,
        entity_replicator::{EntityReplicator, OutgoingUpdate},
        events::ReplicationEvent,
    },
    types::{NetEntityId, NetEntityRole, ReplicationMode, TimeMs},
    world::entity_world::{EntityWorldMut, EntityWorldRef},
};

impl EntityReplicationManager {
    /// Runs one outbound tick: resolves acks, expires orphaned RPCs and
    /// removed replicators, refreshes the window, then sends entity updates
    /// followed by queued RPCs.
    pub fn send_updates<W: EntityWorldMut>(
        &mut self,
        server_game_time_ms: TimeMs,
        world: &mut W,
        connection: &mut dyn Connection,
        listener: &mut dyn ConnectionListener,
    ) {
        let now = server_game_time_ms;

        self.process_acks(now, connection);

        for (entity_id, rpc_count) in self.orphaned_rpcs.update(now) {
            self.events.raise(ReplicationEvent::OrphanedRpcsExpired {
                entity_id,
                rpc_count,
            });
        }

        if self.clear_removed_replicators_event.poll(now) {
            self.clear_removed_replicators(now);
        }

        if self.update_window_event.poll(now) || self.window_backpressured {
            self.update_window(now, &*world);
            if self.mode == ReplicationMode::LocalServerToRemoteServer {
                self.check_entity_domain(now, world, connection);
            }
        }

        let updates = self.generate_entity_update_list(&*world);
        self.send_entity_updates(now, updates, connection);
        self.send_entity_rpcs(connection, listener);
    }

    fn process_acks(&mut self, now: TimeMs, connection: &dyn Connection) {
        let resend_timeout_ms = self.resend_timeout_ms();
        for (entity_id, replicator) in self.replicators.iter_mut() {
            let summary = replicator.process_acks(connection, now, resend_timeout_ms);
            if summary.creation_confirmed && self.pending_creation.remove(entity_id) {
                trace!("Entity {:?} creation confirmed", entity_id);
            }
            if summary.lost_records > 0 {
                trace!(
                    "Entity {:?} lost {} record(s), resending",
                    entity_id,
                    summary.lost_records
                );
            }
        }
    }

    /// Diffs the replication window against the current replicators:
    /// entities that left get a pending removal, new locally authoritative
    /// entities get a replicator while the pending-creation bound allows.
    pub fn update_window<W: EntityWorldRef + ?Sized>(&mut self, now: TimeMs, world: &W) {
        self.replication_window.update_window();
        let mut entries = self.replication_window.entities_for_replication();
        entries.sort_by(|a, b| b.priority.total_cmp(&a.priority));

        let mut in_window = HashSet::with_capacity(entries.len());
        let mut window_order = Vec::with_capacity(entries.len());
        for entry in entries {
            if in_window.insert(entry.entity_id) {
                window_order.push(entry.entity_id);
            }
        }

        // Departures
        let departed: Vec<NetEntityId> = self
            .replicators
            .iter()
            .filter(|(entity_id, replicator)| {
                replicator.local_role() == NetEntityRole::Authority
                    && !replicator.is_pending_removal()
                    && (!in_window.contains(*entity_id)
                        || world.entity_role(**entity_id) != Some(NetEntityRole::Authority))
            })
            .map(|(entity_id, _)| *entity_id)
            .collect();
        for entity_id in departed {
            debug!("Entity {:?} left the replication window", entity_id);
            self.remove_outbound_replicator(now, entity_id);
        }

        // Arrivals
        self.window_backpressured = false;
        let max_pending = self.config.max_remote_entities_pending_creation;
        for entity_id in window_order.iter().copied() {
            if self.replicators.contains_key(&entity_id)
                || self.migrations_in_flight.contains_key(&entity_id)
            {
                // a replicator still draining must be destroyed before re-entry
                continue;
            }
            if world.entity_role(entity_id) != Some(NetEntityRole::Authority) {
                continue;
            }
            if self.pending_creation.len() >= max_pending {
                debug!(
                    "{} entities pending creation, deferring entity {:?}",
                    self.pending_creation.len(),
                    entity_id
                );
                self.window_backpressured = true;
                break;
            }

            let remote_role = if self.mode == ReplicationMode::LocalServerToRemoteClient
                && self.remote_host_id.is_valid()
                && world.controlling_host(entity_id) == Some(self.remote_host_id)
            {
                NetEntityRole::Autonomous
            } else {
                NetEntityRole::Simulated
            };
            self.replicators.insert(
                entity_id,
                EntityReplicator::new(entity_id, NetEntityRole::Authority, remote_role),
            );
            self.pending_creation.insert(entity_id);
        }

        self.window_order = window_order;
    }

    pub(super) fn remove_outbound_replicator(&mut self, now: TimeMs, entity_id: NetEntityId) {
        let grace_ms = self.pending_removal_ms();
        if let Some(replicator) = self.replicators.get_mut(&entity_id) {
            replicator.mark_pending_removal(now, grace_ms);
            self.pending_removal.insert(entity_id);
        }
        self.pending_creation.remove(&entity_id);
    }

    /// Replicators in send order: explicit pending sends, then window
    /// priority order, then everything else by id
    fn send_order(&mut self) -> Vec<NetEntityId> {
        let mut seen = HashSet::with_capacity(self.replicators.len());
        let mut order = Vec::with_capacity(self.replicators.len());

        let pending_send = std::mem::take(&mut self.pending_send);
        let candidates = pending_send
            .into_iter()
            .chain(self.window_order.iter().copied())
            .chain(self.replicators.keys().copied());
        for entity_id in candidates {
            if self.replicators.contains_key(&entity_id) && seen.insert(entity_id) {
                order.push(entity_id);
            }
        }
        order
    }

    /// Collects the records every replicator needs sent this tick, in send
    /// order. Replicators with nothing to say are skipped.
    pub fn generate_entity_update_list<W: EntityWorldRef + ?Sized>(&mut self, world: &W) -> Vec<OutgoingUpdate> {
        let mut output = Vec::new();
        for entity_id in self.send_order() {
            let Some(replicator) = self.replicators.get_mut(&entity_id) else {
                continue;
            };
            if let Some(update) = replicator.generate_update_payload(world) {
                output.push(update);
            }
        }
        output
    }

    /// Packs records into as many packets as needed. A record that does not
    /// fit in the current packet moves to the next one whole; a record too
    /// large for an empty packet is skipped.
    pub fn send_entity_updates(
        &mut self,
        server_game_time_ms: TimeMs,
        updates: Vec<OutgoingUpdate>,
        connection: &mut dyn Connection,
    ) -> usize {
        let max_payload_size = connection.max_payload_size();
        let mut queue: VecDeque<OutgoingUpdate> = updates.into();
        let mut packets_sent = 0;

        while !queue.is_empty() {
            let mut writer = RecordPacketWriter::entity_updates(max_payload_size, server_game_time_ms);
            let mut written = Vec::new();
            let mut deferred = VecDeque::new();

            while let Some(update) = queue.pop_front() {
                match writer.try_write(&update.message) {
                    Ok(()) => written.push(update),
                    Err(overflow) if writer.is_empty() => {
                        error!(
                            "Entity {:?} record needs {} bits but an empty packet holds {}, skipping it",
                            update.message.entity_id, overflow.bits_needed, overflow.bits_free
                        );
                    }
                    Err(_) => deferred.push_back(update),
                }
            }
            queue = deferred;

            if written.is_empty() {
                break;
            }

            let packet_id = connection.send_unreliable_packet(&writer.finish());
            packets_sent += 1;
            for update in &written {
                if let Some(replicator) = self.replicators.get_mut(&update.message.entity_id) {
                    replicator.record_sent(packet_id, update, server_game_time_ms);
                }
            }
        }

        packets_sent
    }

    /// Flushes every replicator's queued RPCs: reliable ones through the
    /// transport's reliable channel, unreliable ones sent once and forgotten
    pub fn send_entity_rpcs(
        &mut self,
        connection: &mut dyn Connection,
        listener: &mut dyn ConnectionListener,
    ) {
        let order = self.send_order();
        self.flush_reliable_rpcs(&order, connection, listener);

        let mut unreliable = Vec::new();
        for entity_id in &order {
            if let Some(replicator) = self.replicators.get_mut(entity_id) {
                unreliable.extend(replicator.take_unreliable_rpcs());
            }
        }
        pack_rpcs(unreliable, connection.max_payload_size(), |bytes| {
            connection.send_unreliable_packet(bytes);
            true
        });
    }

    pub(super) fn flush_reliable_rpcs(
        &mut self,
        entity_ids: &[NetEntityId],
        connection: &mut dyn Connection,
        listener: &mut dyn ConnectionListener,
    ) {
        let mut reliable = Vec::new();
        for entity_id in entity_ids {
            if let Some(replicator) = self.replicators.get_mut(entity_id) {
                reliable.extend(replicator.take_reliable_rpcs());
            }
        }

        let connection_id = connection.connection_id();
        let max_payload_size = connection.max_payload_size();
        pack_rpcs(reliable, max_payload_size, |bytes| {
            if connection.send_reliable_packet(bytes) {
                true
            } else {
                listener.on_send_failure(connection_id, PacketType::EntityRpcs);
                false
            }
        });
    }

    /// Destroys removed replicators whose grace period elapsed and whose
    /// outstanding sends were flushed
    pub fn clear_removed_replicators(&mut self, now: TimeMs) -> usize {
        let ready: Vec<NetEntityId> = self
            .pending_removal
            .iter()
            .filter(|entity_id| {
                self.replicators
                    .get(entity_id)
                    .map_or(true, |replicator| replicator.ready_for_destruction(now))
            })
            .copied()
            .collect();

        for entity_id in &ready {
            self.pending_removal.remove(entity_id);
            if let Some(mut replicator) = self.replicators.remove(entity_id) {
                replicator.destroy();
                trace!("Entity {:?} replicator destroyed", entity_id);
            }
        }
        ready.len()
    }
}

// Packs RPCs into as few packets as the MTU allows, in order
fn pack_rpcs(
    rpcs: Vec<EntityRpcMessage>,
    max_payload_size: usize,
    mut send: impl FnMut(&[u8]) -> bool,
) {
    let mut queue: VecDeque<EntityRpcMessage> = rpcs.into();
    while !queue.is_empty() {
        let mut writer = RecordPacketWriter::entity_rpcs(max_payload_size);
        while let Some(rpc) = queue.front() {
            match writer.try_write(rpc) {
                Ok(()) => {
                    queue.pop_front();
                }
                Err(overflow) if writer.is_empty() => {
                    error!(
                        "Rpc {} for entity {:?} needs {} bits, larger than any packet, dropping it",
                        rpc.rpc_index, rpc.entity_id, overflow.bits_needed
                    );
                    queue.pop_front();
                }
                Err(_) => break,
            }
        }
        if writer.is_empty() {
            continue;
        }
        if !send(&writer.finish()) {
            debug!("Rpc packet refused by the transport");
        }
    }
}
