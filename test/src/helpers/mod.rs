pub mod assertions;
pub mod link_conditioner;
pub mod test_peer;

pub use forged_packets::{
    decode_rpcs, decode_updates, migration_packet, rpcs_packet, state_message, updates_packet,
};
pub use link_conditioner::LinkConditioner;
pub use packet_exchange::{deliver, deliver_conditioned, deliver_packets, exchange, exchange_n_times};
pub use recording_listener::RecordingListener;
pub use test_peer::{
    every_tick_config, server_client_pair, server_server_pair, TestPeer, CLIENT_HOST, PEER_SERVER_HOST, SERVER_HOST,
};
