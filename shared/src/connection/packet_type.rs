// An enum representing the different types of packets the replication
// manager sends/receives

use netrep_serde::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr, UnsignedInteger};

#[derive(Copy, Debug, Clone, Eq, PartialEq, Hash)]
pub enum PacketType {
    // Creations, property diffs, rebases and deletions for many entities
    EntityUpdates,
    // Batched entity RPCs
    EntityRpcs,
    // Full state of an entity changing authoritative host
    EntityMigration,
    // Destination host confirming a migration was applied
    EntityMigrationAck,
}

impl Serde for PacketType {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let index: u8 = match self {
            PacketType::EntityUpdates => 0,
            PacketType::EntityRpcs => 1,
            PacketType::EntityMigration => 2,
            PacketType::EntityMigrationAck => 3,
        };

        UnsignedInteger::<2>::new(index).ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        match UnsignedInteger::<2>::de(reader)?.get() {
            0 => Ok(PacketType::EntityUpdates),
            1 => Ok(PacketType::EntityRpcs),
            2 => Ok(PacketType::EntityMigration),
            3 => Ok(PacketType::EntityMigrationAck),
            _ => Err(SerdeErr::InvalidValue {
                type_name: "PacketType",
            }),
        }
    }

    fn bit_length(&self) -> u32 {
        <UnsignedInteger<2> as ConstBitLength>::const_bit_length()
    }
}
