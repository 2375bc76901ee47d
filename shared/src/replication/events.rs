use std::collections::BTreeMap;

use crate::types::{ConnectionId, HostId, NetEntityId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplicationEvent {
    /// A remotely created entity finished activation
    EntityActivated { entity_id: NetEntityId },
    /// The remote authority granted this host autonomous control of an entity
    AutonomousEntityReplicatorCreated { entity_id: NetEntityId },
    /// RPCs buffered for an entity that never appeared were discarded
    OrphanedRpcsExpired {
        entity_id: NetEntityId,
        rpc_count: usize,
    },
    /// Raised on the source host before an entity's state is captured for
    /// migration
    PreEntityMigration {
        entity_id: NetEntityId,
        destination: HostId,
    },
    /// Raised on the destination host once a migrated entity exists there
    PostEntityMigration {
        entity_id: NetEntityId,
        migrated_from: NetEntityId,
        remote_host_id: HostId,
        connection_id: ConnectionId,
    },
    /// The destination confirmed a migration this host started
    EntityMigrationCompleted {
        entity_id: NetEntityId,
        destination: HostId,
    },
    /// A migration was never confirmed and local authority was restored
    EntityMigrationAborted {
        entity_id: NetEntityId,
        destination: HostId,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventHandlerId(u64);

type EventHandler = Box<dyn FnMut(&ReplicationEvent)>;

/// Owned list of event subscribers plus a queue of raised events.
///
/// Handlers run synchronously when an event is raised. Events are only
/// queued for `take_events` while no handler is registered, so a host that
/// subscribes never accumulates them.
#[derive(Default)]
pub struct ReplicationEvents {
    next_handler_id: u64,
    handlers: BTreeMap<EventHandlerId, EventHandler>,
    queued: Vec<ReplicationEvent>,
}

impl ReplicationEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&mut self, handler: impl FnMut(&ReplicationEvent) + 'static) -> EventHandlerId {
        let id = EventHandlerId(self.next_handler_id);
        self.next_handler_id += 1;
        self.handlers.insert(id, Box::new(handler));
        id
    }

    pub fn remove_handler(&mut self, id: EventHandlerId) -> bool {
        self.handlers.remove(&id).is_some()
    }

    pub fn raise(&mut self, event: ReplicationEvent) {
        if self.handlers.is_empty() {
            self.queued.push(event);
            return;
        }
        for handler in self.handlers.values_mut() {
            handler(&event);
        }
    }

    pub fn take_events(&mut self) -> Vec<ReplicationEvent> {
        std::mem::take(&mut self.queued)
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }
}
