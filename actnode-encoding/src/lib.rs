//! Serialization support for the fixed-layout actuator node data types
//!
//! Re-exports `canadensis_encoding` for the data type implementations and adds bounds-checked
//! entry points on top of it. Applications should use the codec of the `actnode` crate instead
//! of depending on this crate directly.

#![no_std]

pub use canadensis_encoding::*;

/// Data type with a single serialized size
///
/// Implemented by sealed types and by delimited types whose current version has no
/// variable-length fields.
pub trait FixedSize {
    const SIZE_BYTES: usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingError {
    /// The input is shorter than the serialized size.
    Truncated,
    /// The output buffer is shorter than the serialized size.
    BufferTooSmall,
    /// A field holds a value its type does not allow.
    InvalidValue,
}

/// Deserializes a value from the start of `bytes`.
///
/// Bytes past the serialized size belong to newer versions of the type and are ignored.
pub fn deserialize_prefix<T: Deserialize + FixedSize>(bytes: &[u8]) -> Result<T, EncodingError> {
    let bytes = bytes.get(..T::SIZE_BYTES).ok_or(EncodingError::Truncated)?;
    T::deserialize_from_bytes(bytes).map_err(|_| EncodingError::InvalidValue)
}

/// Serializes a value to the start of `buffer` and returns the number of bytes written.
pub fn serialize_into<T: Serialize>(value: &T, buffer: &mut [u8]) -> Result<usize, EncodingError> {
    let length = value.size_bits().div_ceil(8);
    let buffer = buffer
        .get_mut(..length)
        .ok_or(EncodingError::BufferTooSmall)?;
    value.serialize_to_bytes(buffer);
    Ok(length)
}
