use crate::{
    messages::entity_rpc_message::EntityRpcMessage,
    types::{ChangeCursor, HostId, NetEntityId, NetEntityRole},
    world::error::WorldError,
};

/// Read access to the entity framework a replication manager serves.
///
/// Payloads produced here are opaque to the manager. They are expected to
/// carry absolute property values, so applying the same payload twice, or a
/// payload covering a superset of changes, is harmless.
pub trait EntityWorldRef {
    /// check whether entity exists
    fn has_entity(&self, entity_id: NetEntityId) -> bool;
    /// the role this host holds for the entity
    fn entity_role(&self, entity_id: NetEntityId) -> Option<NetEntityRole>;
    /// the host whose input drives the entity, if any
    fn controlling_host(&self, entity_id: NetEntityId) -> Option<HostId>;
    /// current position in the entity's change history. Advances whenever a
    /// replicated property changes.
    fn change_cursor(&self, entity_id: NetEntityId) -> Option<ChangeCursor>;
    /// serializes properties changed after `since` (or all of them, if
    /// `since` is None) that a host holding `remote_role` may receive.
    /// Returns an empty payload when nothing relevant changed.
    fn write_entity_state(
        &self,
        entity_id: NetEntityId,
        since: Option<ChangeCursor>,
        remote_role: NetEntityRole,
    ) -> Option<Vec<u8>>;
    /// serializes everything needed to rebuild the entity on another host
    fn write_migration_data(&self, entity_id: NetEntityId) -> Option<Vec<u8>>;
}

/// Mutable access to the entity framework.
pub trait EntityWorldMut: EntityWorldRef {
    /// construct a replicated entity from its first full state. The entity
    /// is not live until `activate_entity` is called.
    fn create_entity(
        &mut self,
        entity_id: NetEntityId,
        local_role: NetEntityRole,
        state: &[u8],
    ) -> Result<(), WorldError>;
    /// make a constructed entity live
    fn activate_entity(&mut self, entity_id: NetEntityId);
    /// apply a state payload received from the remote host
    fn apply_entity_state(
        &mut self,
        entity_id: NetEntityId,
        local_role: NetEntityRole,
        payload: &[u8],
    ) -> Result<(), WorldError>;
    /// invoke an RPC sent by a host holding `sender_role`. Returns false if
    /// the sender is not allowed to invoke it.
    fn handle_rpc(
        &mut self,
        entity_id: NetEntityId,
        sender_role: NetEntityRole,
        rpc: &EntityRpcMessage,
    ) -> bool;
    /// destroy a replicated entity
    fn remove_entity(&mut self, entity_id: NetEntityId);

    // Migration

    /// give up local authority while a migration is in flight
    fn begin_migration(&mut self, entity_id: NetEntityId, destination: HostId);
    /// the destination confirmed the migration
    fn complete_migration(&mut self, entity_id: NetEntityId);
    /// the migration will never be confirmed, restore local authority
    fn abort_migration(&mut self, entity_id: NetEntityId);
    /// rebuild a migrated entity under local authority, returning the id it
    /// was assigned on this host
    fn create_migrated_entity(
        &mut self,
        entity_id: NetEntityId,
        state: &[u8],
    ) -> Result<NetEntityId, WorldError>;
}
