use netrep_serde::{BitReader, BitWrite, Serde, SerdeErr};

use crate::types::NetEntityId;

/// A remote procedure call targeted at one entity
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityRpcMessage {
    pub entity_id: NetEntityId,
    pub rpc_index: u16,
    pub reliable: bool,
    pub payload: Vec<u8>,
}

impl EntityRpcMessage {
    pub fn new(entity_id: NetEntityId, rpc_index: u16, reliable: bool, payload: Vec<u8>) -> Self {
        Self {
            entity_id,
            rpc_index,
            reliable,
            payload,
        }
    }
}

impl Serde for EntityRpcMessage {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.entity_id.ser(writer);
        self.rpc_index.ser(writer);
        self.reliable.ser(writer);
        self.payload.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            entity_id: reader.read()?,
            rpc_index: reader.read()?,
            reliable: reader.read()?,
            payload: reader.read()?,
        })
    }

    fn bit_length(&self) -> u32 {
        self.entity_id.bit_length()
            + self.rpc_index.bit_length()
            + self.reliable.bit_length()
            + self.payload.bit_length()
    }
}
