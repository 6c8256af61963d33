//! Bit-granular cursors in Cyphal order: least significant bit first, little-endian bytes

use crate::codec::CodecError;

pub(super) struct BitReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    pub fn read(&mut self, bits: u8) -> Result<u64, CodecError> {
        let bits = usize::from(bits);
        if self.position + bits > self.bytes.len() * 8 {
            return Err(CodecError::Truncated);
        }
        let mut value = 0u64;
        for i in 0..bits {
            let at = self.position + i;
            let bit = (self.bytes[at / 8] >> (at % 8)) & 1;
            value |= u64::from(bit) << i;
        }
        self.position += bits;
        Ok(value)
    }

    pub fn skip(&mut self, bits: usize) -> Result<(), CodecError> {
        if self.position + bits > self.bytes.len() * 8 {
            return Err(CodecError::Truncated);
        }
        self.position += bits;
        Ok(())
    }

    pub fn align(&mut self) {
        self.position = self.position.next_multiple_of(8);
    }

    /// Splits off the next `length` bytes as a separate reader.
    ///
    /// The cursor must be byte-aligned.
    pub fn take_bytes(&mut self, length: usize) -> Result<BitReader<'a>, CodecError> {
        debug_assert!(self.position % 8 == 0);
        let start = self.position / 8;
        let end = start.checked_add(length).ok_or(CodecError::Truncated)?;
        let window = self.bytes.get(start..end).ok_or(CodecError::Truncated)?;
        self.position += length * 8;
        Ok(BitReader::new(window))
    }
}

pub(super) struct BitWriter<'a> {
    bytes: &'a mut [u8],
    position: usize,
}

impl<'a> BitWriter<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        bytes.fill(0);
        Self { bytes, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn write(&mut self, bits: u8, value: u64) -> Result<(), CodecError> {
        let bits = usize::from(bits);
        if self.position + bits > self.bytes.len() * 8 {
            return Err(CodecError::BufferTooSmall);
        }
        for i in 0..bits {
            let at = self.position + i;
            if (value >> i) & 1 == 1 {
                self.bytes[at / 8] |= 1 << (at % 8);
            }
        }
        self.position += bits;
        Ok(())
    }

    /// Advances past zero-valued padding.
    pub fn skip(&mut self, bits: usize) -> Result<(), CodecError> {
        if self.position + bits > self.bytes.len() * 8 {
            return Err(CodecError::BufferTooSmall);
        }
        self.position += bits;
        Ok(())
    }

    pub fn align(&mut self) -> Result<(), CodecError> {
        let padding = self.position.next_multiple_of(8) - self.position;
        self.skip(padding)
    }

    /// Overwrites an aligned 32-bit little-endian value written earlier.
    pub fn patch_u32(&mut self, position: usize, value: u32) {
        debug_assert!(position % 8 == 0);
        let start = position / 8;
        self.bytes[start..start + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Number of bytes touched so far
    pub fn length(&self) -> usize {
        self.position.div_ceil(8)
    }
}
