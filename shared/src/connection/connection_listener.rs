use crate::{connection::error::ProtocolViolation, connection::packet_type::PacketType, types::ConnectionId};

/// Receives the connection-level conditions the replication manager does not
/// handle itself
pub trait ConnectionListener {
    /// Called right before the manager disconnects a misbehaving peer
    fn on_protocol_violation(&mut self, connection_id: ConnectionId, violation: &ProtocolViolation);

    /// Called when the transport refuses a reliable packet
    fn on_send_failure(&mut self, connection_id: ConnectionId, packet_type: PacketType);
}
