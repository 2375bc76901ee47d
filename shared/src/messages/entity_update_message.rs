use netrep_serde::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr, UnsignedInteger};

use crate::types::{NetEntityId, NetEntityRole, UpdateSequence};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityUpdateKind {
    /// First state of an entity on the remote host
    Create,
    /// Changes since the last acknowledged state
    Update,
    /// Full state, replacing whatever history the remote host had
    Rebase,
    /// The entity left replication
    Delete,
}

impl EntityUpdateKind {
    /// Lifecycle records are resent until acknowledged instead of being
    /// folded into the next diff
    pub fn is_lifecycle(&self) -> bool {
        !matches!(self, EntityUpdateKind::Update)
    }
}

impl Serde for EntityUpdateKind {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let index: u8 = match self {
            EntityUpdateKind::Create => 0,
            EntityUpdateKind::Update => 1,
            EntityUpdateKind::Rebase => 2,
            EntityUpdateKind::Delete => 3,
        };
        UnsignedInteger::<2>::new(index).ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        match reader.read::<UnsignedInteger<2>>()?.get() {
            0 => Ok(EntityUpdateKind::Create),
            1 => Ok(EntityUpdateKind::Update),
            2 => Ok(EntityUpdateKind::Rebase),
            3 => Ok(EntityUpdateKind::Delete),
            _ => Err(SerdeErr::InvalidValue {
                type_name: "EntityUpdateKind",
            }),
        }
    }

    fn bit_length(&self) -> u32 {
        <UnsignedInteger<2> as ConstBitLength>::const_bit_length()
    }
}

/// One entity's record inside an EntityUpdates packet.
///
/// `role` is the role the receiving host should hold for the entity.
/// `sequence` counts the records the sender's replicator has produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityUpdateMessage {
    pub entity_id: NetEntityId,
    pub role: NetEntityRole,
    pub kind: EntityUpdateKind,
    pub sequence: UpdateSequence,
    pub payload: Vec<u8>,
}

impl EntityUpdateMessage {
    pub fn delete(entity_id: NetEntityId, role: NetEntityRole, sequence: UpdateSequence) -> Self {
        Self {
            entity_id,
            role,
            kind: EntityUpdateKind::Delete,
            sequence,
            payload: Vec::new(),
        }
    }
}

impl Serde for EntityUpdateMessage {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.entity_id.ser(writer);
        self.role.ser(writer);
        self.kind.ser(writer);
        self.sequence.ser(writer);
        self.payload.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            entity_id: reader.read()?,
            role: reader.read()?,
            kind: reader.read()?,
            sequence: reader.read()?,
            payload: reader.read()?,
        })
    }

    fn bit_length(&self) -> u32 {
        self.entity_id.bit_length()
            + self.role.bit_length()
            + self.kind.bit_length()
            + self.sequence.bit_length()
            + self.payload.bit_length()
    }
}
