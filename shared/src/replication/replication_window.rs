use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use crate::types::NetEntityId;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReplicationEntry {
    pub entity_id: NetEntityId,
    /// Higher priority entities are packed first when space is short
    pub priority: f32,
}

/// Decides which entities a connection should currently replicate
pub trait ReplicationWindow {
    /// Recomputes the replication set. Called at the window cadence, before
    /// `entities_for_replication`.
    fn update_window(&mut self) {}

    fn entities_for_replication(&self) -> Vec<ReplicationEntry>;
}

/// A window that replicates nothing, for connections that only receive
#[derive(Default)]
pub struct NullReplicationWindow;

impl ReplicationWindow for NullReplicationWindow {
    fn entities_for_replication(&self) -> Vec<ReplicationEntry> {
        Vec::new()
    }
}

/// An explicit set of entities with priorities, editable from outside the
/// manager that owns the window. Clones share the same set.
#[derive(Clone, Default)]
pub struct ReplicationScope {
    entities: Rc<RefCell<BTreeMap<NetEntityId, f32>>>,
}

impl ReplicationScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the scope contains the Entity
    pub fn has(&self, entity_id: NetEntityId) -> bool {
        self.entities.borrow().contains_key(&entity_id)
    }

    /// Adds an Entity to the scope with default priority
    pub fn include(&self, entity_id: NetEntityId) -> &Self {
        self.entities.borrow_mut().entry(entity_id).or_insert(1.0);
        self
    }

    /// Removes an Entity from the scope
    pub fn exclude(&self, entity_id: NetEntityId) -> &Self {
        self.entities.borrow_mut().remove(&entity_id);
        self
    }

    pub fn set_priority(&self, entity_id: NetEntityId, priority: f32) -> &Self {
        self.entities.borrow_mut().insert(entity_id, priority);
        self
    }

    /// Removes all Entities from the scope
    pub fn clear(&self) -> &Self {
        self.entities.borrow_mut().clear();
        self
    }

    pub fn len(&self) -> usize {
        self.entities.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.borrow().is_empty()
    }
}

/// Replicates whatever its `ReplicationScope` contains, by descending priority
pub struct ScopedReplicationWindow {
    scope: ReplicationScope,
    snapshot: Vec<ReplicationEntry>,
}

impl ScopedReplicationWindow {
    pub fn new(scope: ReplicationScope) -> Self {
        Self {
            scope,
            snapshot: Vec::new(),
        }
    }
}

impl ReplicationWindow for ScopedReplicationWindow {
    fn update_window(&mut self) {
        self.snapshot = self
            .scope
            .entities
            .borrow()
            .iter()
            .map(|(entity_id, priority)| ReplicationEntry {
                entity_id: *entity_id,
                priority: *priority,
            })
            .collect();
        // stable: equal priorities keep id order
        self.snapshot
            .sort_by(|a, b| b.priority.total_cmp(&a.priority));
    }

    fn entities_for_replication(&self) -> Vec<ReplicationEntry> {
        self.snapshot.clone()
    }
}
