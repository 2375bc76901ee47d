use crate::{bit_reader::BitReader, bit_writer::BitWrite, error::SerdeErr, serde::Serde, ConstBitLength};

pub type UnsignedInteger<const BITS: u8> = SerdeInteger<false, BITS>;
pub type UnsignedVariableInteger<const BITS: u8> = SerdeInteger<true, BITS>;

/// An unsigned integer written with an explicit bit width.
///
/// Fixed integers always occupy `BITS` bits. Variable integers are written
/// in `BITS`-sized chunks, each preceded by a bit telling the reader whether
/// another chunk follows, so small values stay small on the wire.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct SerdeInteger<const VARIABLE: bool, const BITS: u8> {
    value: u64,
}

impl<const VARIABLE: bool, const BITS: u8> SerdeInteger<VARIABLE, BITS> {
    pub fn new<T: Into<u64>>(value: T) -> Self {
        let value = value.into();
        if BITS == 0 || BITS > 64 {
            panic!("SerdeInteger must have between 1 and 64 bits, got {}", BITS);
        }
        if !VARIABLE && BITS < 64 && value >= (1u64 << BITS) {
            panic!("with {} bits, can't encode number {}", BITS, value);
        }
        Self { value }
    }

    pub fn get(&self) -> u64 {
        self.value
    }
}

impl<const VARIABLE: bool, const BITS: u8> Serde for SerdeInteger<VARIABLE, BITS> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let mut value = self.value;
        if VARIABLE {
            loop {
                let proceed = BITS < 64 && value >= (1u64 << BITS);
                writer.write_bit(proceed);
                for _ in 0..BITS {
                    writer.write_bit(value & 1 != 0);
                    value >>= 1;
                }
                if !proceed {
                    return;
                }
            }
        } else {
            for _ in 0..BITS {
                writer.write_bit(value & 1 != 0);
                value >>= 1;
            }
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let mut output: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let proceed = if VARIABLE { reader.read_bit()? } else { false };
            for _ in 0..BITS {
                let bit = reader.read_bit()?;
                if bit {
                    if shift >= 64 {
                        return Err(SerdeErr::ValueTooLarge { max_bits: 64 });
                    }
                    output |= 1u64 << shift;
                }
                shift += 1;
            }
            if !proceed {
                return Ok(Self { value: output });
            }
        }
    }

    fn bit_length(&self) -> u32 {
        if !VARIABLE {
            return BITS as u32;
        }
        let mut output: u32 = 0;
        let mut value = self.value;
        loop {
            output += 1 + BITS as u32;
            let proceed = BITS < 64 && value >= (1u64 << BITS);
            if !proceed {
                return output;
            }
            value >>= BITS;
        }
    }
}

impl<const BITS: u8> ConstBitLength for SerdeInteger<false, BITS> {
    fn const_bit_length() -> u32 {
        BITS as u32
    }
}
