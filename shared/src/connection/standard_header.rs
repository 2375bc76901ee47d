use crate::types::PacketId;

/// Transport metadata accompanying an inbound packet
pub trait PacketHeader {
    fn packet_id(&self) -> PacketId;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StandardHeader {
    packet_id: PacketId,
}

impl StandardHeader {
    pub fn new(packet_id: PacketId) -> Self {
        Self { packet_id }
    }
}

impl PacketHeader for StandardHeader {
    fn packet_id(&self) -> PacketId {
        self.packet_id
    }
}
