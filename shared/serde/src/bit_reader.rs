use crate::{error::SerdeErr, serde::Serde};

pub struct BitReader<'b> {
    scratch: u8,
    scratch_index: u8,
    buffer: &'b [u8],
    buffer_index: usize,
    bits_read: u32,
}

impl<'b> BitReader<'b> {
    pub fn new(buffer: &'b [u8]) -> Self {
        Self {
            scratch: 0,
            scratch_index: 0,
            buffer,
            buffer_index: 0,
            bits_read: 0,
        }
    }

    pub fn read<T: Serde>(&mut self) -> Result<T, SerdeErr> {
        T::de(self)
    }

    pub fn read_bit(&mut self) -> Result<bool, SerdeErr> {
        if self.scratch_index == 0 {
            if self.buffer_index == self.buffer.len() {
                return Err(SerdeErr::UnexpectedEnd {
                    bits_read: self.bits_read,
                });
            }

            self.scratch = self.buffer[self.buffer_index];

            self.buffer_index += 1;
            self.scratch_index += 8;
        }

        let value = self.scratch & 1;

        self.scratch >>= 1;
        self.scratch_index -= 1;
        self.bits_read += 1;

        Ok(value != 0)
    }

    pub fn read_byte(&mut self) -> Result<u8, SerdeErr> {
        let mut output = 0;
        for _ in 0..7 {
            if self.read_bit()? {
                output |= 128;
            }
            output >>= 1;
        }
        if self.read_bit()? {
            output |= 128;
        }
        Ok(output)
    }

    pub fn bits_read(&self) -> u32 {
        self.bits_read
    }
}
