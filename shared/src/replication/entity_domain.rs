use std::{cell::RefCell, collections::HashSet, rc::Rc};

use crate::types::NetEntityId;

/// Decides whether a locally authoritative entity still belongs on this host
pub trait EntityDomain {
    fn is_entity_in_domain(&self, entity_id: NetEntityId) -> bool;
}

/// Owns every entity it is asked about. Entities never migrate away.
#[derive(Default)]
pub struct FullOwnershipEntityDomain;

impl EntityDomain for FullOwnershipEntityDomain {
    fn is_entity_in_domain(&self, _: NetEntityId) -> bool {
        true
    }
}

/// Owns every entity except those explicitly released. Clones share state,
/// so the host can release entities after handing the domain to a manager.
#[derive(Clone, Default)]
pub struct ExplicitEntityDomain {
    released: Rc<RefCell<HashSet<NetEntityId>>>,
}

impl ExplicitEntityDomain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn release(&self, entity_id: NetEntityId) {
        self.released.borrow_mut().insert(entity_id);
    }

    pub fn claim(&self, entity_id: NetEntityId) {
        self.released.borrow_mut().remove(&entity_id);
    }
}

impl EntityDomain for ExplicitEntityDomain {
    fn is_entity_in_domain(&self, entity_id: NetEntityId) -> bool {
        !self.released.borrow().contains(&entity_id)
    }
}
