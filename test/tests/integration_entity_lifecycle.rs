/// Integration tests for the replicated entity lifecycle between a server
/// and a client: creation, diffs, loss recovery, rebasing and removal.

use std::{cell::RefCell, rc::Rc};

use netrep_shared::{
    EntityUpdateKind, EntityWorldRef, NetEntityRole, ReplicationEvent, ReplicatorState,
};
use netrep_test::{
    assert_property_replicated, decode_updates, deliver, deliver_packets, every_tick_config,
    exchange, rpcs_packet, server_client_pair, state_message, test_protocol::decode_state,
    updates_packet, PropertyValue, CLIENT_HOST,
};

#[test]
fn server_entity_is_created_and_activated_on_client() {
    let (mut server, mut client) = server_client_pair(every_tick_config());
    let entity = server.spawn(&[(0, 10), (1, 20)]);

    exchange(&mut server, &mut client, 0);

    assert_eq!(client.world.property(entity, 0), Some(10));
    assert_eq!(client.world.property(entity, 1), Some(20));
    assert!(client.world.is_active(entity));
    assert_eq!(client.world.entity_role(entity), Some(NetEntityRole::Simulated));
    assert!(client.manager.has_remote_authority(entity));
    assert_eq!(
        client.take_events(),
        vec![ReplicationEvent::EntityActivated { entity_id: entity }]
    );

    // creation is confirmed once the ack is seen
    assert!(server.manager.is_pending_creation(entity));
    exchange(&mut server, &mut client, 16);
    assert!(!server.manager.is_pending_creation(entity));
    assert_eq!(
        server.manager.entity_replicator(entity).unwrap().state(),
        ReplicatorState::Active
    );
}

#[test]
fn changed_properties_are_sent_as_diffs() {
    let (mut server, mut client) = server_client_pair(every_tick_config());
    let entity = server.spawn(&[(0, 10), (1, 20)]);
    exchange(&mut server, &mut client, 0);
    exchange(&mut server, &mut client, 16);

    server.world.set_property(entity, 1, 21);
    server.send(32);
    let packets = server.connection.take_outbox();
    let updates = decode_updates(&packets);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].kind, EntityUpdateKind::Update);
    assert_eq!(updates[0].role, NetEntityRole::Simulated);
    assert_eq!(
        decode_state(&updates[0].payload).unwrap(),
        vec![PropertyValue::new(1, 21)]
    );

    deliver_packets(&mut server, &mut client, 32, packets);
    assert_property_replicated!(server, client, entity, 0);
    assert_property_replicated!(server, client, entity, 1);

    // nothing changed, nothing sent
    server.send(48);
    assert!(server.connection.outbox().is_empty());
}

#[test]
fn diff_after_a_lost_packet_covers_its_changes() {
    let (mut server, mut client) = server_client_pair(every_tick_config());
    let entity = server.spawn(&[(0, 10), (1, 20)]);
    exchange(&mut server, &mut client, 0);
    exchange(&mut server, &mut client, 16);

    server.world.set_property(entity, 0, 11);
    server.send(32);
    server.connection.take_outbox();

    server.world.set_property(entity, 1, 22);
    server.send(48);
    let packets = server.connection.take_outbox();
    let updates = decode_updates(&packets);
    assert_eq!(updates.len(), 1);
    assert_eq!(
        decode_state(&updates[0].payload).unwrap(),
        vec![PropertyValue::new(0, 11), PropertyValue::new(1, 22)]
    );

    deliver_packets(&mut server, &mut client, 48, packets);
    assert_eq!(client.world.property(entity, 0), Some(11));
    assert_eq!(client.world.property(entity, 1), Some(22));
}

#[test]
fn unacknowledged_update_is_resent_after_timeout() {
    let (mut server, mut client) = server_client_pair(every_tick_config());
    let entity = server.spawn(&[(0, 10)]);
    exchange(&mut server, &mut client, 0);
    exchange(&mut server, &mut client, 16);

    server.world.set_property(entity, 0, 11);
    server.send(32);
    server.connection.take_outbox();

    // still in flight
    server.send(100);
    assert!(server.connection.outbox().is_empty());

    server.send(32 + 250);
    deliver(&mut server, &mut client, 282);
    assert_eq!(client.world.property(entity, 0), Some(11));
}

#[test]
fn lost_creation_is_resent() {
    let (mut server, mut client) = server_client_pair(every_tick_config());
    let entity = server.spawn(&[(0, 10)]);

    server.send(0);
    server.connection.take_outbox();
    server.world.set_property(entity, 0, 12);

    // no diffs while the creation is in flight
    server.send(100);
    assert!(server.connection.outbox().is_empty());

    server.send(250);
    let packets = server.connection.take_outbox();
    let updates = decode_updates(&packets);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].kind, EntityUpdateKind::Create);

    deliver_packets(&mut server, &mut client, 250, packets);
    client.activate();
    assert_eq!(client.world.property(entity, 0), Some(12));
    assert!(client.world.is_active(entity));
}

#[test]
fn rebasing_resends_full_state_until_acked() {
    let (mut server, mut client) = server_client_pair(every_tick_config());
    let entity = server.spawn(&[(0, 10), (1, 20)]);
    exchange(&mut server, &mut client, 0);
    exchange(&mut server, &mut client, 16);

    server.manager.set_entity_rebasing(entity);
    assert!(server.manager.entity_replicator(entity).unwrap().is_rebasing());

    server.send(32);
    let packets = server.connection.take_outbox();
    let updates = decode_updates(&packets);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].kind, EntityUpdateKind::Rebase);
    assert_eq!(decode_state(&updates[0].payload).unwrap().len(), 2);

    deliver_packets(&mut server, &mut client, 32, packets);
    server.send(48);
    assert!(!server.manager.entity_replicator(entity).unwrap().is_rebasing());
    assert!(!client.is_disconnected());
}

#[test]
fn removed_entity_absorbs_late_messages_during_grace() {
    let (mut server, mut client) = server_client_pair(every_tick_config());
    let entity = server.spawn(&[(0, 1)]);
    exchange(&mut server, &mut client, 0);
    exchange(&mut server, &mut client, 16);

    server.scope.exclude(entity);
    server.send(32);
    let packets = server.connection.take_outbox();
    let updates = decode_updates(&packets);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].kind, EntityUpdateKind::Delete);

    deliver_packets(&mut server, &mut client, 32, packets);
    assert!(!client.world.has_entity(entity));
    assert!(client
        .manager
        .entity_replicator(entity)
        .unwrap()
        .is_pending_removal());

    // a late update and a late rpc are dropped, not applied or buffered
    let late_update = state_message(
        entity,
        NetEntityRole::Simulated,
        EntityUpdateKind::Update,
        9,
        &[(0, 2)],
    );
    assert!(client.receive(40, &updates_packet(100, &[late_update])));
    assert!(client.receive(40, &rpcs_packet(&[(entity, 1, 5)])));
    assert!(!client.world.has_entity(entity));
    assert!(!client.manager.orphaned_rpcs().contains(entity));
    assert!(client.world.rpc_log().is_empty());
    assert!(!client.is_disconnected());

    // both sides destroy their replicators once the grace period is over
    client.send(1031);
    assert!(client.manager.entity_replicator(entity).is_some());
    client.send(1032);
    assert!(client.manager.entity_replicator(entity).is_none());
    server.send(1032);
    assert!(server.manager.entity_replicator(entity).is_none());
    assert_eq!(server.manager.pending_removal_count(), 0);
}

#[test]
fn entity_reentering_window_waits_for_old_replicator() {
    let (mut server, mut client) = server_client_pair(every_tick_config());
    let entity = server.spawn(&[(0, 1)]);
    exchange(&mut server, &mut client, 0);
    exchange(&mut server, &mut client, 16);

    server.scope.exclude(entity);
    exchange(&mut server, &mut client, 32);
    assert!(!client.world.has_entity(entity));

    server.scope.include(entity);
    exchange(&mut server, &mut client, 48);
    assert!(server
        .manager
        .entity_replicator(entity)
        .unwrap()
        .is_pending_removal());
    assert!(!client.world.has_entity(entity));

    exchange(&mut server, &mut client, 1032);
    assert!(client.world.has_entity(entity));
    assert!(client.world.is_active(entity));
    assert_eq!(client.world.property(entity, 0), Some(1));
}

#[test]
fn owner_only_properties_reach_the_controlling_client() {
    let (mut server, mut client) = server_client_pair(every_tick_config());
    let controlled = server.spawn(&[(0, 1), (1, 100)]);
    server.world.set_controlling_host(controlled, CLIENT_HOST);
    server.world.set_owner_only(controlled, 1);
    let other = server.spawn(&[(0, 2), (1, 200)]);
    server.world.set_owner_only(other, 1);

    exchange(&mut server, &mut client, 0);

    assert_eq!(
        server.manager.entity_replicator(controlled).unwrap().remote_role(),
        NetEntityRole::Autonomous
    );
    assert_eq!(client.world.entity_role(controlled), Some(NetEntityRole::Autonomous));
    assert_eq!(client.world.property(controlled, 1), Some(100));
    assert_eq!(client.world.entity_role(other), Some(NetEntityRole::Simulated));
    assert_eq!(client.world.property(other, 1), None);
    assert!(client.take_events().contains(
        &ReplicationEvent::AutonomousEntityReplicatorCreated {
            entity_id: controlled
        }
    ));
}

#[test]
fn autonomous_client_changes_reach_the_server() {
    let (mut server, mut client) = server_client_pair(every_tick_config());
    let controlled = server.spawn(&[(0, 1)]);
    server.world.set_controlling_host(controlled, CLIENT_HOST);
    exchange(&mut server, &mut client, 0);
    exchange(&mut server, &mut client, 16);

    client.world.set_property(controlled, 0, 7);
    client.send(32);
    let updates = decode_updates(&client.connection.take_outbox());
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].role, NetEntityRole::Authority);

    client.world.set_property(controlled, 0, 8);
    exchange(&mut server, &mut client, 48);
    assert_eq!(server.world.property(controlled, 0), Some(8));
    assert!(!server.is_disconnected());

    // the echo back to the client changes nothing
    exchange(&mut server, &mut client, 64);
    exchange(&mut server, &mut client, 80);
    assert_eq!(client.world.property(controlled, 0), Some(8));
    assert!(!client.is_disconnected());
}

#[test]
fn clear_drops_every_replicator() {
    let (mut server, mut client) = server_client_pair(every_tick_config());
    server.spawn(&[(0, 1)]);
    server.spawn(&[(0, 2)]);
    exchange(&mut server, &mut client, 0);
    assert_eq!(client.manager.entity_replicator_count(NetEntityRole::Simulated), 2);

    client.clear(false);
    assert!(client.manager.entity_replicator_ids().is_empty());
    assert_eq!(client.manager.pending_activation_count(), 0);

    server.clear(false);
    assert_eq!(server.manager.entity_replicator_count(NetEntityRole::Authority), 0);
    assert_eq!(server.manager.pending_creation_count(), 0);
}

#[test]
fn subscribed_host_does_not_accumulate_events() {
    let (mut server, mut client) = server_client_pair(every_tick_config());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_clone = seen.clone();
    client
        .manager
        .add_event_handler(move |event| seen_clone.borrow_mut().push(event.clone()));

    let entities: Vec<_> = (0..20).map(|value| server.spawn(&[(0, value)])).collect();
    exchange(&mut server, &mut client, 0);

    assert_eq!(seen.borrow().len(), entities.len());
    assert!(entities.iter().all(|entity| seen
        .borrow()
        .contains(&ReplicationEvent::EntityActivated { entity_id: *entity })));
    assert!(client.take_events().is_empty());
}

#[test]
fn entity_quiet_for_more_than_half_the_packet_id_range_still_updates() {
    let (mut server, mut client) = server_client_pair(every_tick_config());
    let quiet = server.spawn(&[(0, 1)]);
    let busy = server.spawn(&[(0, 0)]);
    exchange(&mut server, &mut client, 0);
    exchange(&mut server, &mut client, 16);
    assert_eq!(client.world.property(quiet, 0), Some(1));

    let mut now = 32;
    for value in 1..=33_000u32 {
        server.world.set_property(busy, 0, value);
        exchange(&mut server, &mut client, now);
        now += 16;
    }
    assert_eq!(client.world.property(busy, 0), Some(33_000));

    server.world.set_property(quiet, 0, 99);
    for _ in 0..5 {
        exchange(&mut server, &mut client, now);
        now += 16;
    }
    assert_property_replicated!(server, client, quiet, 0);
    assert!(!client.is_disconnected());
}
