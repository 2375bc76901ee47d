use std::collections::{HashMap, VecDeque};

use log::warn;

use crate::{
    messages::entity_rpc_message::EntityRpcMessage,
    replication::entity_replicator::EntityReplicator,
    timeout_queue::{TimeoutId, TimeoutQueue, TimeoutResult},
    types::{NetEntityId, TimeMs},
    world::entity_world::EntityWorldMut,
};

struct OrphanedRpcs {
    timeout_id: TimeoutId,
    rpcs: VecDeque<EntityRpcMessage>,
}

/// Outcome of replaying a bucket of orphaned RPCs
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DispatchResult {
    pub dispatched: usize,
    /// rpc index of the first RPC the entity refused, if any. Replay stops there.
    pub rejected: Option<u16>,
}

/// Buffers RPCs that arrive before their entity exists locally.
///
/// Each entity has at most one bucket. The bucket's timeout starts with its
/// first RPC and is not extended by later ones.
pub struct OrphanedEntityRpcs {
    buckets: HashMap<NetEntityId, OrphanedRpcs>,
    timeout_queue: TimeoutQueue<NetEntityId>,
    timeout_ms: TimeMs,
}

impl OrphanedEntityRpcs {
    pub fn new(timeout_ms: TimeMs) -> Self {
        Self {
            buckets: HashMap::new(),
            timeout_queue: TimeoutQueue::new(),
            timeout_ms,
        }
    }

    pub fn set_timeout_ms(&mut self, timeout_ms: TimeMs) {
        self.timeout_ms = timeout_ms;
    }

    pub fn add_orphaned_rpc(&mut self, now: TimeMs, rpc: EntityRpcMessage) {
        let entity_id = rpc.entity_id;
        if let Some(bucket) = self.buckets.get_mut(&entity_id) {
            bucket.rpcs.push_back(rpc);
            return;
        }

        let timeout_id = self.timeout_queue.add_item(entity_id, now, self.timeout_ms);
        let mut rpcs = VecDeque::new();
        rpcs.push_back(rpc);
        self.buckets.insert(entity_id, OrphanedRpcs { timeout_id, rpcs });
    }

    /// Replays every buffered RPC for the replicator's entity, in arrival
    /// order, then forgets the bucket
    pub fn dispatch_orphaned_rpcs<W: EntityWorldMut + ?Sized>(
        &mut self,
        world: &mut W,
        replicator: &EntityReplicator,
    ) -> DispatchResult {
        let mut result = DispatchResult::default();
        let Some(bucket) = self.buckets.remove(&replicator.entity_id()) else {
            return result;
        };
        self.timeout_queue.remove_item(bucket.timeout_id);

        for rpc in bucket.rpcs {
            if !replicator.handle_rpc_message(&mut *world, &rpc) {
                result.rejected = Some(rpc.rpc_index);
                break;
            }
            result.dispatched += 1;
        }
        result
    }

    /// Discards buckets whose entity never appeared. Returns the expired
    /// entities and how many RPCs each lost.
    pub fn update(&mut self, now: TimeMs) -> Vec<(NetEntityId, usize)> {
        let mut handler = |_: TimeoutId, _: &NetEntityId| TimeoutResult::Delete;
        let expired = self.timeout_queue.update_timeouts(now, &mut handler);

        let mut output = Vec::with_capacity(expired.len());
        for entity_id in expired {
            if let Some(bucket) = self.buckets.remove(&entity_id) {
                warn!(
                    "Dropping {} orphaned rpc(s) for entity {:?}, it was never created",
                    bucket.rpcs.len(),
                    entity_id
                );
                output.push((entity_id, bucket.rpcs.len()));
            }
        }
        output
    }

    /// Forgets any RPCs buffered for an entity that will not be created
    pub fn drop_orphaned_rpcs(&mut self, entity_id: NetEntityId) -> usize {
        let Some(bucket) = self.buckets.remove(&entity_id) else {
            return 0;
        };
        self.timeout_queue.remove_item(bucket.timeout_id);
        bucket.rpcs.len()
    }

    pub fn contains(&self, entity_id: NetEntityId) -> bool {
        self.buckets.contains_key(&entity_id)
    }

    pub fn rpc_count(&self, entity_id: NetEntityId) -> usize {
        self.buckets
            .get(&entity_id)
            .map_or(0, |bucket| bucket.rpcs.len())
    }

    /// Number of entities with buffered RPCs
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.timeout_queue.clear();
    }
}
