use netrep_serde::{BitReader, BitWrite, BitWriter, Serde, SerdeErr, WriteOverflowError};

use crate::{
    connection::packet_type::PacketType,
    messages::{
        entity_migration_message::{EntityMigrationAck, EntityMigrationMessage},
        entity_rpc_message::EntityRpcMessage,
        entity_update_message::EntityUpdateMessage,
    },
    types::TimeMs,
};

/// A decoded replication packet
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplicationPacket {
    EntityUpdates {
        server_game_time_ms: TimeMs,
        updates: Vec<EntityUpdateMessage>,
    },
    EntityRpcs(Vec<EntityRpcMessage>),
    EntityMigration(EntityMigrationMessage),
    EntityMigrationAck(EntityMigrationAck),
}

impl ReplicationPacket {
    pub fn packet_type(&self) -> PacketType {
        match self {
            ReplicationPacket::EntityUpdates { .. } => PacketType::EntityUpdates,
            ReplicationPacket::EntityRpcs(_) => PacketType::EntityRpcs,
            ReplicationPacket::EntityMigration(_) => PacketType::EntityMigration,
            ReplicationPacket::EntityMigrationAck(_) => PacketType::EntityMigrationAck,
        }
    }

    /// Decodes a packet. On failure, the packet type is returned alongside
    /// the error if the header could be read.
    pub fn read(bytes: &[u8]) -> Result<Self, (Option<PacketType>, SerdeErr)> {
        let mut reader = BitReader::new(bytes);
        let packet_type: PacketType = reader.read().map_err(|err| (None, err))?;
        Self::read_body(packet_type, &mut reader).map_err(|err| (Some(packet_type), err))
    }

    fn read_body(packet_type: PacketType, reader: &mut BitReader) -> Result<Self, SerdeErr> {
        match packet_type {
            PacketType::EntityUpdates => {
                let server_game_time_ms = reader.read()?;
                let updates = read_records(reader)?;
                Ok(ReplicationPacket::EntityUpdates {
                    server_game_time_ms,
                    updates,
                })
            }
            PacketType::EntityRpcs => Ok(ReplicationPacket::EntityRpcs(read_records(reader)?)),
            PacketType::EntityMigration => {
                Ok(ReplicationPacket::EntityMigration(reader.read()?))
            }
            PacketType::EntityMigrationAck => {
                Ok(ReplicationPacket::EntityMigrationAck(reader.read()?))
            }
        }
    }

    /// Encodes a single-message packet (migration or migration ack). Record
    /// packets are built with a `RecordPacketWriter` so they respect the MTU.
    pub fn write_single<M: Serde>(packet_type: PacketType, message: &M) -> Vec<u8> {
        let mut writer = BitWriter::new();
        packet_type.ser(&mut writer);
        message.ser(&mut writer);
        writer.to_bytes()
    }
}

// Records are prefixed with a continue bit; a false bit ends the packet
fn read_records<T: Serde>(reader: &mut BitReader) -> Result<Vec<T>, SerdeErr> {
    let mut output = Vec::new();
    while reader.read_bit()? {
        output.push(reader.read()?);
    }
    Ok(output)
}

/// Packs records into one size-bounded packet. A record is either written in
/// full or not at all.
pub struct RecordPacketWriter<T: Serde> {
    writer: BitWriter,
    record_count: usize,
    phantom: std::marker::PhantomData<T>,
}

impl<T: Serde> RecordPacketWriter<T> {
    fn new(max_payload_bytes: usize, packet_type: PacketType) -> Self {
        let mut writer = BitWriter::with_max_bytes(max_payload_bytes);
        // the terminating continue bit must always fit
        writer.reserve_bits(1);
        packet_type.ser(&mut writer);
        Self {
            writer,
            record_count: 0,
            phantom: std::marker::PhantomData,
        }
    }

    /// Writes `record` if it fits, leaving the packet untouched otherwise
    pub fn try_write(&mut self, record: &T) -> Result<(), WriteOverflowError> {
        let mut counter = self.writer.counter();
        counter.write_bit(true);
        record.ser(&mut counter);
        if counter.overflowed() {
            return Err(WriteOverflowError {
                bits_needed: counter.bits_needed(),
                bits_free: self.writer.bits_free(),
            });
        }

        self.writer.write_bit(true);
        record.ser(&mut self.writer);
        self.record_count += 1;
        Ok(())
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.writer.release_bits(1);
        self.writer.write_bit(false);
        self.writer.to_bytes()
    }
}

impl RecordPacketWriter<EntityUpdateMessage> {
    pub fn entity_updates(max_payload_bytes: usize, server_game_time_ms: TimeMs) -> Self {
        let mut output = Self::new(max_payload_bytes, PacketType::EntityUpdates);
        server_game_time_ms.ser(&mut output.writer);
        output
    }
}

impl RecordPacketWriter<EntityRpcMessage> {
    pub fn entity_rpcs(max_payload_bytes: usize) -> Self {
        Self::new(max_payload_bytes, PacketType::EntityRpcs)
    }
}
