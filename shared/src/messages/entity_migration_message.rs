use netrep_serde::{BitReader, BitWrite, Serde, SerdeErr};

use crate::types::{HostId, NetEntityId};

/// Full state of an entity being handed to `destination`. The state is never
/// a diff: the destination has no baseline for the entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityMigrationMessage {
    pub entity_id: NetEntityId,
    pub destination: HostId,
    pub state: Vec<u8>,
}

impl Serde for EntityMigrationMessage {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.entity_id.ser(writer);
        self.destination.ser(writer);
        self.state.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            entity_id: reader.read()?,
            destination: reader.read()?,
            state: reader.read()?,
        })
    }

    fn bit_length(&self) -> u32 {
        self.entity_id.bit_length() + self.destination.bit_length() + self.state.bit_length()
    }
}

/// Sent by the destination once a migrated entity exists there
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityMigrationAck {
    /// The id the entity had on the source host
    pub entity_id: NetEntityId,
    /// The id the destination assigned
    pub migrated_entity_id: NetEntityId,
}

impl Serde for EntityMigrationAck {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.entity_id.ser(writer);
        self.migrated_entity_id.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            entity_id: reader.read()?,
            migrated_entity_id: reader.read()?,
        })
    }

    fn bit_length(&self) -> u32 {
        self.entity_id.bit_length() + self.migrated_entity_id.bit_length()
    }
}
