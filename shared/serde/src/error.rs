use thiserror::Error;

/// Errors raised while reading from a bit stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerdeErr {
    /// The reader ran past the end of its buffer
    #[error("Unexpected end of buffer after reading {bits_read} bits")]
    UnexpectedEnd { bits_read: u32 },

    /// A value was read that has no valid interpretation
    #[error("Invalid value while decoding {type_name}")]
    InvalidValue { type_name: &'static str },

    /// A variable-length value exceeded the supported width
    #[error("Encoded value exceeds {max_bits} bits")]
    ValueTooLarge { max_bits: u32 },
}

/// Error returned when a bounded writer would exceed its capacity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Write of {bits_needed} bits overflows writer with {bits_free} bits free")]
pub struct WriteOverflowError {
    pub bits_needed: u32,
    pub bits_free: u32,
}
