use crate::types::{ConnectionId, PacketId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The remote host sent data it was not entitled to send
    ProtocolViolation,
    /// The local host is shutting the connection down
    ConnectionClosed,
}

/// The transport a replication manager sends through.
///
/// The manager only borrows a connection for the duration of a call; it never
/// owns one.
pub trait Connection {
    fn connection_id(&self) -> ConnectionId;

    /// Queues a packet on the transport's reliable channel. Returns false if
    /// the transport refused it.
    fn send_reliable_packet(&mut self, payload: &[u8]) -> bool;

    /// Sends a packet once, returning the id used to check its ack later
    fn send_unreliable_packet(&mut self, payload: &[u8]) -> PacketId;

    /// Whether the remote host has acknowledged the given packet
    fn was_packet_acked(&self, packet_id: PacketId) -> bool;

    /// Largest payload, in bytes, a single packet may carry
    fn max_payload_size(&self) -> usize;

    fn disconnect(&mut self, reason: DisconnectReason);
}
