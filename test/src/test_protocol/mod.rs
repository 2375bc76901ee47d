/// Payload formats used by the test world.
///
/// Entity state is a list of (property index, value) pairs carrying absolute
/// values. An empty byte slice stands for "no properties".

use netrep_serde::{BitReader, BitWrite, BitWriter, ConstBitLength, Serde, SerdeErr};

pub type PropertyIndex = u8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropertyValue {
    pub index: PropertyIndex,
    pub value: u32,
}

impl PropertyValue {
    pub fn new(index: PropertyIndex, value: u32) -> Self {
        Self { index, value }
    }
}

impl Serde for PropertyValue {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.index.ser(writer);
        self.value.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            index: reader.read()?,
            value: reader.read()?,
        })
    }

    fn bit_length(&self) -> u32 {
        <u8 as ConstBitLength>::const_bit_length() + <u32 as ConstBitLength>::const_bit_length()
    }
}

pub fn encode_state(properties: &[PropertyValue]) -> Vec<u8> {
    if properties.is_empty() {
        return Vec::new();
    }
    let mut writer = BitWriter::new();
    properties.to_vec().ser(&mut writer);
    writer.to_bytes()
}

pub fn decode_state(payload: &[u8]) -> Result<Vec<PropertyValue>, SerdeErr> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    let mut reader = BitReader::new(payload);
    reader.read()
}

/// Payload of the test RPCs: a single counter value
pub fn encode_rpc(value: u32) -> Vec<u8> {
    let mut writer = BitWriter::new();
    value.ser(&mut writer);
    writer.to_bytes()
}

pub fn decode_rpc(payload: &[u8]) -> Result<u32, SerdeErr> {
    BitReader::new(payload).read()
}
