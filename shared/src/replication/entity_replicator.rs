use std::collections::VecDeque;

use crate::{
    connection::connection::Connection,
    messages::{
        entity_rpc_message::EntityRpcMessage,
        entity_update_message::{EntityUpdateKind, EntityUpdateMessage},
    },
    types::{ChangeCursor, NetEntityId, NetEntityRole, PacketId, PacketIndex, TimeMs, UpdateSequence},
    world::{
        entity_world::{EntityWorldMut, EntityWorldRef},
        error::WorldError,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplicatorState {
    /// Bound to an entity whose creation is not yet confirmed
    Created,
    Active,
    /// Draining: no new diffs, but lifecycle and RPC sends still flush
    PendingRemoval,
    Destroyed,
}

struct SentRecord {
    packet_id: PacketId,
    kind: EntityUpdateKind,
    cursor: Option<ChangeCursor>,
    sent_ms: TimeMs,
}

/// An update produced by a replicator but not yet committed to a packet
pub struct OutgoingUpdate {
    pub message: EntityUpdateMessage,
    cursor: Option<ChangeCursor>,
}

#[derive(Default)]
pub struct AckSummary {
    /// The remote host confirmed the entity's creation
    pub creation_confirmed: bool,
    /// Records that were never acknowledged within the resend timeout
    pub lost_records: usize,
}

/// Replication state for one entity on one connection
pub struct EntityReplicator {
    entity_id: NetEntityId,
    local_role: NetEntityRole,
    remote_role: NetEntityRole,
    state: ReplicatorState,

    // Outbound
    pending_lifecycle: Option<EntityUpdateKind>,
    creation_sent: bool,
    remote_created: bool,
    delete_acked: bool,
    acked_cursor: Option<ChangeCursor>,
    sent_cursor: Option<ChangeCursor>,
    sent_records: VecDeque<SentRecord>,
    send_sequence: UpdateSequence,
    reliable_rpcs: VecDeque<EntityRpcMessage>,
    unreliable_rpcs: VecDeque<EntityRpcMessage>,

    // Inbound
    last_received_packet_id: Option<PacketId>,
    last_received_index: Option<PacketIndex>,
    last_received_sequence: Option<UpdateSequence>,
    removal_deadline: Option<TimeMs>,
}

impl EntityReplicator {
    /// Binds a replicator to `entity_id`. A replicator for a locally
    /// authoritative entity starts out owing the remote host a creation.
    pub fn new(entity_id: NetEntityId, local_role: NetEntityRole, remote_role: NetEntityRole) -> Self {
        let owes_creation = local_role == NetEntityRole::Authority;
        Self {
            entity_id,
            local_role,
            remote_role,
            state: ReplicatorState::Created,
            pending_lifecycle: owes_creation.then_some(EntityUpdateKind::Create),
            creation_sent: false,
            remote_created: !owes_creation,
            delete_acked: false,
            acked_cursor: None,
            sent_cursor: None,
            sent_records: VecDeque::new(),
            send_sequence: 0,
            reliable_rpcs: VecDeque::new(),
            unreliable_rpcs: VecDeque::new(),
            last_received_packet_id: None,
            last_received_index: None,
            last_received_sequence: None,
            removal_deadline: None,
        }
    }

    /// Records the packet that created this replicator on the receiving side.
    /// `baseline` is the local change cursor right after the creation was
    /// applied, so received state is not echoed back.
    pub fn bind_remote_creation(
        &mut self,
        packet_id: PacketId,
        packet_index: PacketIndex,
        sequence: UpdateSequence,
        baseline: Option<ChangeCursor>,
    ) {
        self.note_received(packet_id, packet_index, sequence);
        self.acked_cursor = baseline;
        self.sent_cursor = baseline;
    }

    pub fn entity_id(&self) -> NetEntityId {
        self.entity_id
    }

    pub fn local_role(&self) -> NetEntityRole {
        self.local_role
    }

    pub fn remote_role(&self) -> NetEntityRole {
        self.remote_role
    }

    pub fn state(&self) -> ReplicatorState {
        self.state
    }

    pub fn is_pending_removal(&self) -> bool {
        self.state == ReplicatorState::PendingRemoval
    }

    pub fn is_rebasing(&self) -> bool {
        self.pending_lifecycle == Some(EntityUpdateKind::Rebase)
    }

    pub fn is_remote_created(&self) -> bool {
        self.remote_created
    }

    pub fn last_received_packet_id(&self) -> Option<PacketId> {
        self.last_received_packet_id
    }

    /// Whether this side produces property updates for the entity
    pub fn sends_updates(&self) -> bool {
        matches!(
            self.local_role,
            NetEntityRole::Authority | NetEntityRole::Autonomous
        )
    }

    // State machine

    pub fn activate(&mut self) {
        if self.state == ReplicatorState::Created {
            self.state = ReplicatorState::Active;
        }
    }

    pub fn mark_pending_removal(&mut self, now: TimeMs, grace_ms: TimeMs) {
        if matches!(
            self.state,
            ReplicatorState::PendingRemoval | ReplicatorState::Destroyed
        ) {
            return;
        }
        self.state = ReplicatorState::PendingRemoval;
        self.removal_deadline = Some(now.saturating_add(grace_ms));

        if self.local_role == NetEntityRole::Authority && self.creation_sent {
            self.pending_lifecycle = Some(EntityUpdateKind::Delete);
        } else {
            self.pending_lifecycle = None;
            self.delete_acked = true;
        }
    }

    /// Drops the replicator without telling the remote host, e.g. when the
    /// entity migrated and the destination now owns the remote copy
    pub fn mark_pending_removal_silently(&mut self, now: TimeMs, grace_ms: TimeMs) {
        self.mark_pending_removal(now, grace_ms);
        self.pending_lifecycle = None;
        self.delete_acked = true;
    }

    pub fn destroy(&mut self) {
        self.state = ReplicatorState::Destroyed;
        self.pending_lifecycle = None;
        self.sent_records.clear();
        self.reliable_rpcs.clear();
        self.unreliable_rpcs.clear();
    }

    /// A removed replicator may be destroyed once its grace period elapsed,
    /// its deletion was acknowledged and its queued RPCs were flushed
    pub fn ready_for_destruction(&self, now: TimeMs) -> bool {
        if self.state != ReplicatorState::PendingRemoval {
            return false;
        }
        let grace_elapsed = self.removal_deadline.map_or(true, |deadline| now >= deadline);
        grace_elapsed
            && self.delete_acked
            && self.reliable_rpcs.is_empty()
            && self.unreliable_rpcs.is_empty()
    }

    /// Forces a full state resend, after which diffing resumes from it
    pub fn set_rebasing(&mut self) {
        if !matches!(
            self.state,
            ReplicatorState::Created | ReplicatorState::Active
        ) || !self.sends_updates()
        {
            return;
        }
        if self.pending_lifecycle.is_none() {
            self.pending_lifecycle = Some(EntityUpdateKind::Rebase);
        }
    }

    // Outbound

    fn in_flight(&self, kind: EntityUpdateKind) -> bool {
        self.sent_records.iter().any(|record| record.kind == kind)
    }

    fn outgoing(&self, kind: EntityUpdateKind, payload: Vec<u8>, cursor: Option<ChangeCursor>) -> OutgoingUpdate {
        OutgoingUpdate {
            message: EntityUpdateMessage {
                entity_id: self.entity_id,
                role: self.remote_role,
                kind,
                sequence: self.send_sequence,
                payload,
            },
            cursor,
        }
    }

    /// Produces the record this replicator needs sent, if any: a lifecycle
    /// record (create, rebase, delete) awaiting acknowledgement, or a diff of
    /// every change since the last acknowledged cursor.
    pub fn generate_update_payload<W: EntityWorldRef + ?Sized>(&mut self, world: &W) -> Option<OutgoingUpdate> {
        match self.state {
            ReplicatorState::Destroyed => None,
            ReplicatorState::PendingRemoval => {
                let delete_due = self.pending_lifecycle == Some(EntityUpdateKind::Delete)
                    && !self.in_flight(EntityUpdateKind::Delete)
                    // a delete overtaking its own creation would leave a ghost entity
                    && !self.in_flight(EntityUpdateKind::Create);
                delete_due.then(|| self.outgoing(EntityUpdateKind::Delete, Vec::new(), None))
            }
            ReplicatorState::Created | ReplicatorState::Active => {
                if !self.sends_updates() {
                    return None;
                }
                match self.pending_lifecycle {
                    Some(kind @ (EntityUpdateKind::Create | EntityUpdateKind::Rebase)) => {
                        if self.in_flight(kind) {
                            return None;
                        }
                        let cursor = world.change_cursor(self.entity_id)?;
                        let payload = world.write_entity_state(self.entity_id, None, self.remote_role)?;
                        Some(self.outgoing(kind, payload, Some(cursor)))
                    }
                    Some(_) => None,
                    None => {
                        if !self.remote_created {
                            return None;
                        }
                        let cursor = world.change_cursor(self.entity_id)?;
                        if self.sent_cursor == Some(cursor) {
                            return None;
                        }
                        let payload = world.write_entity_state(
                            self.entity_id,
                            self.acked_cursor,
                            self.remote_role,
                        )?;
                        if payload.is_empty() {
                            // nothing this remote may see changed
                            self.sent_cursor = Some(cursor);
                            return None;
                        }
                        Some(self.outgoing(EntityUpdateKind::Update, payload, Some(cursor)))
                    }
                }
            }
        }
    }

    /// Commits an update produced by `generate_update_payload` to a packet
    pub fn record_sent(&mut self, packet_id: PacketId, update: &OutgoingUpdate, now: TimeMs) {
        let kind = update.message.kind;
        self.sent_records.push_back(SentRecord {
            packet_id,
            kind,
            cursor: update.cursor,
            sent_ms: now,
        });
        if update.cursor.is_some() {
            self.sent_cursor = update.cursor;
        }
        if kind == EntityUpdateKind::Create {
            self.creation_sent = true;
        }
        self.send_sequence = self.send_sequence.wrapping_add(1);
    }

    /// Resolves in-flight records against the connection's acks. Records
    /// unacknowledged for `resend_timeout_ms` are treated as lost: their
    /// changes fold into the next diff, lifecycle records are resent.
    pub fn process_acks(&mut self, connection: &dyn Connection, now: TimeMs, resend_timeout_ms: TimeMs) -> AckSummary {
        let mut summary = AckSummary::default();
        let mut remaining = VecDeque::with_capacity(self.sent_records.len());

        while let Some(record) = self.sent_records.pop_front() {
            if connection.was_packet_acked(record.packet_id) {
                self.on_record_acked(&record, &mut summary);
            } else if now.saturating_sub(record.sent_ms) >= resend_timeout_ms {
                summary.lost_records += 1;
                if record.kind == EntityUpdateKind::Update {
                    self.sent_cursor = self.acked_cursor;
                }
            } else {
                remaining.push_back(record);
            }
        }

        self.sent_records = remaining;
        summary
    }

    fn on_record_acked(&mut self, record: &SentRecord, summary: &mut AckSummary) {
        if let Some(cursor) = record.cursor {
            if self.acked_cursor.map_or(true, |acked| cursor > acked) {
                self.acked_cursor = Some(cursor);
            }
        }

        match record.kind {
            EntityUpdateKind::Create => {
                if !self.remote_created {
                    self.remote_created = true;
                    summary.creation_confirmed = true;
                }
                if self.pending_lifecycle == Some(EntityUpdateKind::Create) {
                    self.pending_lifecycle = None;
                }
                self.activate();
            }
            EntityUpdateKind::Rebase => {
                if self.pending_lifecycle == Some(EntityUpdateKind::Rebase) {
                    self.pending_lifecycle = None;
                }
            }
            EntityUpdateKind::Update => {}
            EntityUpdateKind::Delete => {
                self.delete_acked = true;
                if self.pending_lifecycle == Some(EntityUpdateKind::Delete) {
                    self.pending_lifecycle = None;
                }
            }
        }
    }

    // RPCs

    pub fn queue_rpc(&mut self, rpc: EntityRpcMessage) {
        if self.state == ReplicatorState::Destroyed {
            return;
        }
        if rpc.reliable {
            self.reliable_rpcs.push_back(rpc);
        } else {
            self.unreliable_rpcs.push_back(rpc);
        }
    }

    pub fn take_reliable_rpcs(&mut self) -> VecDeque<EntityRpcMessage> {
        std::mem::take(&mut self.reliable_rpcs)
    }

    pub fn take_unreliable_rpcs(&mut self) -> VecDeque<EntityRpcMessage> {
        std::mem::take(&mut self.unreliable_rpcs)
    }

    pub fn has_queued_rpcs(&self) -> bool {
        !self.reliable_rpcs.is_empty() || !self.unreliable_rpcs.is_empty()
    }

    // Inbound

    /// Whether the packet at `packet_index` is not newer than the last packet
    /// applied here. Indices do not wrap, so an entity that stayed quiet for
    /// any number of packets still orders correctly.
    pub fn is_stale(&self, packet_index: PacketIndex) -> bool {
        self.last_received_index.is_some_and(|last| packet_index <= last)
    }

    pub fn note_received(&mut self, packet_id: PacketId, packet_index: PacketIndex, sequence: UpdateSequence) {
        if let Some(last) = self.last_received_sequence {
            let expected = last.wrapping_add(1);
            if sequence != expected {
                log::trace!(
                    "Entity {:?} skipped from update {} to {}",
                    self.entity_id,
                    last,
                    sequence
                );
            }
        }
        self.last_received_packet_id = Some(packet_id);
        self.last_received_index = Some(packet_index);
        self.last_received_sequence = Some(sequence);
    }

    /// Applies authoritative source data to the local entity
    pub fn update_target<W: EntityWorldMut + ?Sized>(&self, world: &mut W, payload: &[u8]) -> Result<(), WorldError> {
        world.apply_entity_state(self.entity_id, self.local_role, payload)
    }

    pub fn handle_rpc_message<W: EntityWorldMut + ?Sized>(&self, world: &mut W, rpc: &EntityRpcMessage) -> bool {
        world.handle_rpc(self.entity_id, self.remote_role, rpc)
    }
}
