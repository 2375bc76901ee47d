use netrep_shared::{
    ConnectionId, EntityDomain, EntityReplicationManager, EntityRpcMessage, FullOwnershipEntityDomain,
    HostId, NetEntityId, ReplicationConfig, ReplicationEvent, ReplicationMode, ReplicationScope,
    ScopedReplicationWindow, StandardHeader, TimeMs,
};

use crate::{
    local_socket::{LocalConnection, SentPacket},
    test_protocol::{encode_rpc, PropertyIndex},
    test_world::TestWorld,
    RecordingListener,
};

/// One end of a replicated connection: a manager plus everything it borrows
pub struct TestPeer {
    pub manager: EntityReplicationManager,
    pub world: TestWorld,
    pub connection: LocalConnection,
    pub listener: RecordingListener,
    pub scope: ReplicationScope,
}

impl TestPeer {
    pub fn new(
        mode: ReplicationMode,
        local_host_id: HostId,
        remote_host_id: HostId,
        config: ReplicationConfig,
    ) -> Self {
        Self::with_domain(
            mode,
            local_host_id,
            remote_host_id,
            config,
            Box::new(FullOwnershipEntityDomain),
        )
    }

    pub fn with_domain(
        mode: ReplicationMode,
        local_host_id: HostId,
        remote_host_id: HostId,
        config: ReplicationConfig,
        entity_domain: Box<dyn EntityDomain>,
    ) -> Self {
        let scope = ReplicationScope::new();
        let window = ScopedReplicationWindow::new(scope.clone());
        let mut manager =
            EntityReplicationManager::new(mode, local_host_id, config, Box::new(window), entity_domain);
        manager.set_remote_host_id(remote_host_id);
        Self {
            manager,
            world: TestWorld::new(local_host_id),
            connection: LocalConnection::new(ConnectionId(remote_host_id.0)),
            listener: RecordingListener::new(),
            scope,
        }
    }

    /// Spawns a locally authoritative entity and puts it in the window
    pub fn spawn(&mut self, properties: &[(PropertyIndex, u32)]) -> NetEntityId {
        let entity_id = self.world.spawn(properties);
        self.scope.include(entity_id);
        entity_id
    }

    pub fn send(&mut self, now: TimeMs) {
        self.manager
            .send_updates(now, &mut self.world, &mut self.connection, &mut self.listener);
    }

    pub fn receive(&mut self, now: TimeMs, packet: &SentPacket) -> bool {
        let header = StandardHeader::new(packet.packet_id);
        self.manager.handle_packet(
            now,
            &header,
            &packet.bytes,
            &mut self.world,
            &mut self.connection,
            &mut self.listener,
        )
    }

    pub fn activate(&mut self) -> usize {
        self.manager.activate_pending_entities(&mut self.world)
    }

    pub fn queue_rpc(&mut self, entity_id: NetEntityId, rpc_index: u16, reliable: bool, value: u32) -> bool {
        self.manager.add_deferred_rpc_message(EntityRpcMessage::new(
            entity_id,
            rpc_index,
            reliable,
            encode_rpc(value),
        ))
    }

    pub fn migrate(&mut self, now: TimeMs, entity_id: NetEntityId) -> Result<(), netrep_shared::MigrationError> {
        self.manager
            .migrate_entity(now, entity_id, &mut self.world, &mut self.connection)
    }

    pub fn clear(&mut self, for_migration: bool) {
        self.manager.clear(
            for_migration,
            &mut self.world,
            &mut self.connection,
            &mut self.listener,
        );
    }

    pub fn take_events(&mut self) -> Vec<ReplicationEvent> {
        self.manager.take_events()
    }

    pub fn is_disconnected(&self) -> bool {
        self.connection.is_disconnected()
    }
}

/// A server replicating to a client, and that client
pub fn server_client_pair(config: ReplicationConfig) -> (TestPeer, TestPeer) {
    let server = TestPeer::new(
        ReplicationMode::LocalServerToRemoteClient,
        SERVER_HOST,
        CLIENT_HOST,
        config.clone(),
    );
    let client = TestPeer::new(
        ReplicationMode::LocalClientToRemoteServer,
        CLIENT_HOST,
        SERVER_HOST,
        config,
    );
    (server, client)
}

/// Two servers replicating to each other
pub fn server_server_pair(config: ReplicationConfig) -> (TestPeer, TestPeer) {
    let a = TestPeer::new(
        ReplicationMode::LocalServerToRemoteServer,
        SERVER_HOST,
        PEER_SERVER_HOST,
        config.clone(),
    );
    let b = TestPeer::new(
        ReplicationMode::LocalServerToRemoteServer,
        PEER_SERVER_HOST,
        SERVER_HOST,
        config,
    );
    (a, b)
}

pub const SERVER_HOST: HostId = HostId(1);
pub const CLIENT_HOST: HostId = HostId(2);
pub const PEER_SERVER_HOST: HostId = HostId(3);

/// Default config, but the window and removal sweeps run on every tick
pub fn every_tick_config() -> ReplicationConfig {
    ReplicationConfig {
        update_window_interval: std::time::Duration::ZERO,
        clear_removed_replicators_interval: std::time::Duration::ZERO,
        ..ReplicationConfig::default()
    }
}
