/// PROPERTY-BASED TESTS: replication ordering and convergence
///
/// Key invariants:
/// 1. Whatever order updates arrive in, the newest packet's state wins
/// 2. RPCs that arrive before their entity replay in arrival order, once
/// 3. Pending creations never exceed the configured bound
/// 4. Over a lossy, reordering link, the remote copy converges once the
///    link is clean again

use proptest::prelude::*;

use netrep_shared::{EntityUpdateKind, NetEntityId, NetEntityRole, PacketId, ReplicationConfig};
use netrep_test::{
    deliver, deliver_conditioned, deliver_packets, every_tick_config, exchange_n_times,
    rpcs_packet, server_client_pair, state_message, updates_packet, LinkConditioner,
};

const ENTITY: NetEntityId = NetEntityId(42);

fn init_logging() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Warn)
        .is_test(true)
        .try_init()
        .ok();
}

// Delivery orders for `count` updates following a creation
fn shuffled_updates(max_count: u16) -> impl Strategy<Value = Vec<u16>> {
    (1..max_count).prop_flat_map(|count| Just((1..=count).collect::<Vec<u16>>()).prop_shuffle())
}

proptest! {
    /// The update carried by the highest packet id always ends up applied
    #[test]
    fn prop_newest_packet_wins(
        base in any::<PacketId>(),
        order in shuffled_updates(40),
    ) {
        init_logging();
        let (_, mut client) = server_client_pair(every_tick_config());
        let create = state_message(
            ENTITY,
            NetEntityRole::Simulated,
            EntityUpdateKind::Create,
            0,
            &[(0, 0)],
        );
        prop_assert!(client.receive(0, &updates_packet(base, &[create])));

        for offset in order.iter().copied() {
            let update = state_message(
                ENTITY,
                NetEntityRole::Simulated,
                EntityUpdateKind::Update,
                offset,
                &[(0, u32::from(offset))],
            );
            let packet_id = base.wrapping_add(offset);
            prop_assert!(client.receive(u64::from(offset), &updates_packet(packet_id, &[update])));
        }

        let newest = order.iter().copied().max().unwrap_or(0);
        prop_assert_eq!(client.world.property(ENTITY, 0), Some(u32::from(newest)));
        prop_assert!(!client.is_disconnected());
    }
}

proptest! {
    /// Buffered RPCs run in arrival order, exactly once, ahead of later ones
    #[test]
    fn prop_orphaned_rpcs_replay_in_order(
        batches in prop::collection::vec(prop::collection::vec(any::<u32>(), 1..4), 1..8),
        late in any::<u32>(),
    ) {
        init_logging();
        let (_, mut client) = server_client_pair(every_tick_config());
        let mut expected = Vec::new();
        for (tick, batch) in batches.iter().enumerate() {
            let rpcs: Vec<_> = batch.iter().map(|value| (ENTITY, 1, *value)).collect();
            prop_assert!(client.receive(tick as u64, &rpcs_packet(&rpcs)));
            expected.extend(batch.iter().copied());
        }
        prop_assert!(client.world.rpc_log().is_empty());

        let create = state_message(
            ENTITY,
            NetEntityRole::Simulated,
            EntityUpdateKind::Create,
            0,
            &[(0, 0)],
        );
        prop_assert!(client.receive(50, &updates_packet(0, &[create])));
        prop_assert!(client.receive(60, &rpcs_packet(&[(ENTITY, 1, late)])));
        expected.push(late);

        let logged: Vec<u32> = client.world.rpc_log().iter().map(|record| record.value).collect();
        prop_assert_eq!(logged, expected);
        prop_assert!(client.manager.orphaned_rpcs().is_empty());
    }

    /// Acks arriving in any pattern never let pending creations exceed the bound
    #[test]
    fn prop_pending_creation_stays_bounded(
        max_pending in 1usize..5,
        entity_count in 1usize..12,
        acks in prop::collection::vec(any::<bool>(), 1..20),
    ) {
        init_logging();
        let config = ReplicationConfig {
            max_remote_entities_pending_creation: max_pending,
            ..every_tick_config()
        };
        let (mut server, _) = server_client_pair(config);
        for value in 0..entity_count {
            server.spawn(&[(0, value as u32)]);
        }

        let mut now = 0;
        for ack in acks {
            server.send(now);
            prop_assert!(server.manager.pending_creation_count() <= max_pending);
            let packets = server.connection.take_outbox();
            if ack {
                for packet in &packets {
                    server.connection.ack(packet.packet_id);
                }
            }
            now += 16;
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Random property churn over a lossy link settles on the server's state
    #[test]
    fn prop_lossy_link_converges(
        seed in any::<u64>(),
        loss in 0.0f32..0.5,
        duplicate in 0.0f32..0.3,
        delay in 0.0f32..0.3,
        entity_count in 1usize..6,
        ticks in 5usize..40,
    ) {
        init_logging();
        let (mut server, mut client) = server_client_pair(every_tick_config());
        let entities: Vec<NetEntityId> = (0..entity_count)
            .map(|value| server.spawn(&[(0, value as u32), (1, 0)]))
            .collect();

        let mut rng = fastrand::Rng::with_seed(seed);
        let mut conditioner = LinkConditioner::new(seed, loss, duplicate, delay);
        let mut now = 0;
        for _ in 0..ticks {
            for entity in &entities {
                if rng.bool() {
                    server.world.set_property(*entity, rng.u8(0..2), rng.u32(0..1000));
                }
            }
            server.send(now);
            client.send(now);
            deliver_conditioned(&mut server, &mut client, now, &mut conditioner);
            deliver(&mut client, &mut server, now);
            client.activate();
            now += 16;
        }

        // late packets land, then the link is clean for longer than the resend timeout
        let held = conditioner.condition(Vec::new());
        deliver_packets(&mut server, &mut client, now, held);
        exchange_n_times(&mut server, &mut client, now + 16, 30, 16);

        prop_assert!(!client.is_disconnected());
        for entity in &entities {
            prop_assert!(client.world.is_active(*entity));
            prop_assert_eq!(
                client.world.entity(*entity).map(|entity| entity.properties()),
                server.world.entity(*entity).map(|entity| entity.properties())
            );
        }
    }
}
