use crate::{error::WriteOverflowError, serde::Serde};

pub trait BitWrite {
    fn write_bit(&mut self, bit: bool);
    fn write_byte(&mut self, byte: u8);
    fn is_counter(&self) -> bool;
    fn count_bits(&mut self, bits: u32);
}

/// Writes bits into a growable buffer, optionally bounded by a maximum
/// number of bits (usually the connection MTU).
pub struct BitWriter {
    scratch: u8,
    scratch_index: u8,
    buffer: Vec<u8>,
    current_bits: u32,
    max_bits: u32,
}

impl BitWriter {
    /// A writer with no upper bound, for payloads that are framed later
    pub fn new() -> Self {
        Self::with_max_bits(u32::MAX)
    }

    pub fn with_max_bits(max_bits: u32) -> Self {
        Self {
            scratch: 0,
            scratch_index: 0,
            buffer: Vec::new(),
            current_bits: 0,
            max_bits,
        }
    }

    pub fn with_max_bytes(max_bytes: usize) -> Self {
        let max_bits = u32::try_from(max_bytes.saturating_mul(8)).unwrap_or(u32::MAX);
        Self::with_max_bits(max_bits)
    }

    pub fn write<T: Serde>(&mut self, target: &T) {
        target.ser(self);
    }

    /// Writes `target` only if it fits in the remaining budget.
    pub fn try_write<T: Serde>(&mut self, target: &T) -> Result<(), WriteOverflowError> {
        let bits_needed = target.bit_length();
        let bits_free = self.bits_free();
        if bits_needed > bits_free {
            return Err(WriteOverflowError {
                bits_needed,
                bits_free,
            });
        }
        target.ser(self);
        Ok(())
    }

    /// A counter that tracks writes against this writer's remaining budget
    pub fn counter(&self) -> BitCounter {
        BitCounter::new(self.current_bits, self.current_bits, self.max_bits)
    }

    /// Holds `bits` back from the budget, e.g. for a terminating bit.
    pub fn reserve_bits(&mut self, bits: u32) {
        self.max_bits = self.max_bits.saturating_sub(bits);
    }

    pub fn release_bits(&mut self, bits: u32) {
        self.max_bits = self.max_bits.saturating_add(bits);
    }

    pub fn bits_written(&self) -> u32 {
        self.current_bits
    }

    pub fn bits_free(&self) -> u32 {
        self.max_bits.saturating_sub(self.current_bits)
    }

    pub fn is_empty(&self) -> bool {
        self.current_bits == 0
    }

    pub fn to_bytes(mut self) -> Vec<u8> {
        if self.scratch_index > 0 {
            let byte = (self.scratch << (8 - self.scratch_index)).reverse_bits();
            self.buffer.push(byte);
            self.scratch = 0;
            self.scratch_index = 0;
        }
        self.buffer
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BitWrite for BitWriter {
    fn write_bit(&mut self, bit: bool) {
        self.scratch <<= 1;

        if bit {
            self.scratch |= 1;
        }

        self.scratch_index += 1;
        self.current_bits += 1;

        if self.scratch_index >= 8 {
            self.buffer.push(self.scratch.reverse_bits());
            self.scratch_index = 0;
            self.scratch = 0;
        }
    }

    fn write_byte(&mut self, byte: u8) {
        let mut temp = byte;
        for _ in 0..8 {
            self.write_bit(temp & 1 != 0);
            temp >>= 1;
        }
    }

    fn is_counter(&self) -> bool {
        false
    }

    fn count_bits(&mut self, _bits: u32) {}
}

/// Dry-run writer: counts bits without storing them so callers can check
/// whether a record fits before committing it to a real writer.
pub struct BitCounter {
    start_bits: u32,
    current_bits: u32,
    max_bits: u32,
}

impl BitCounter {
    pub fn new(start_bits: u32, current_bits: u32, max_bits: u32) -> Self {
        Self {
            start_bits,
            current_bits,
            max_bits,
        }
    }

    pub fn overflowed(&self) -> bool {
        self.current_bits > self.max_bits
    }

    pub fn bits_needed(&self) -> u32 {
        self.current_bits - self.start_bits
    }
}

impl BitWrite for BitCounter {
    fn write_bit(&mut self, _: bool) {
        self.current_bits += 1;
    }

    fn write_byte(&mut self, _: u8) {
        self.current_bits += 8;
    }

    fn is_counter(&self) -> bool {
        true
    }

    fn count_bits(&mut self, bits: u32) {
        self.current_bits += bits;
    }
}
