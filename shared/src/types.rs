use netrep_serde::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr, UnsignedInteger};

pub type PacketId = u16;
/// A remote packet id extended past wrap-around, strictly increasing
/// with the sender's packet stream
pub type PacketIndex = u64;
pub type UpdateSequence = u16;
/// Milliseconds of game time, supplied by the owning tick loop
pub type TimeMs = u64;
/// Opaque position in an entity's change history
pub type ChangeCursor = u64;

/// Identifies a replicated entity on its current authoritative host.
/// Reassigned when the entity migrates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetEntityId(pub u64);

impl NetEntityId {
    pub const INVALID: NetEntityId = NetEntityId(u64::MAX);

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl Serde for NetEntityId {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.0.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self(reader.read()?))
    }

    fn bit_length(&self) -> u32 {
        <u64 as ConstBitLength>::const_bit_length()
    }
}

/// Identifies a remote participant (server or client)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(pub u32);

impl HostId {
    pub const INVALID: HostId = HostId(u32::MAX);

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl Serde for HostId {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.0.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self(reader.read()?))
    }

    fn bit_length(&self) -> u32 {
        <u32 as ConstBitLength>::const_bit_length()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

/// Degree of control a host has over an entity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NetEntityRole {
    Invalid,
    /// Receives state, sends nothing
    Simulated,
    /// Receives state, may send input-driven updates back to the authority
    Autonomous,
    /// Owns the entity and is the source of truth
    Authority,
}

impl NetEntityRole {
    fn to_index(self) -> u8 {
        match self {
            NetEntityRole::Invalid => 0,
            NetEntityRole::Simulated => 1,
            NetEntityRole::Autonomous => 2,
            NetEntityRole::Authority => 3,
        }
    }

    fn from_index(index: u64) -> Self {
        match index {
            1 => NetEntityRole::Simulated,
            2 => NetEntityRole::Autonomous,
            3 => NetEntityRole::Authority,
            _ => NetEntityRole::Invalid,
        }
    }
}

impl Serde for NetEntityRole {
    fn ser(&self, writer: &mut dyn BitWrite) {
        UnsignedInteger::<2>::new(self.to_index()).ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let index = reader.read::<UnsignedInteger<2>>()?.get();
        Ok(Self::from_index(index))
    }

    fn bit_length(&self) -> u32 {
        <UnsignedInteger<2> as ConstBitLength>::const_bit_length()
    }
}

/// Which way authority flows across a connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReplicationMode {
    LocalServerToRemoteClient,
    LocalServerToRemoteServer,
    LocalClientToRemoteServer,
}

impl ReplicationMode {
    pub fn is_local_server(&self) -> bool {
        !matches!(self, ReplicationMode::LocalClientToRemoteServer)
    }
}
