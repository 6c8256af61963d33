//! Transport frame object

use crate::time::Instant;

/// A transport-layer maximum transmission unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mtu {
    Classic,
    Fd,
}

impl From<Mtu> for usize {
    fn from(value: Mtu) -> Self {
        match value {
            Mtu::Classic => 8,
            Mtu::Fd => 64,
        }
    }
}

impl Mtu {
    /// Returns true if a frame of `length` bytes fills a whole MTU.
    ///
    /// Every frame of a multi-frame transfer except the last one must.
    pub const fn is_full_frame(length: usize) -> bool {
        length == 8 || length == 64
    }
}

/// Extended-ID CAN frame, Classic or FD
///
/// `id` holds the raw 29-bit identifier; see [`crate::can_id`] for its layout.
///
/// The timestamp meaning depends on direction:
/// * reception time for frames produced by [`crate::controller::CanRx`]
/// * transmission deadline for frames passed to [`crate::controller::CanTx`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    pub id: u32,
    pub data: Data,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(id: u32, data: &[u8], timestamp: Instant) -> Result<Self, InvalidLength> {
        Ok(Self {
            id,
            data: Data::new(data)?,
            timestamp,
        })
    }
}

/// Payload length expressible by a data length code (DLC)
///
/// Lengths up to 8 bytes map to the DLC directly; CAN FD adds 12, 16, 20, 24, 32, 48 and 64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataLength(u8);

impl DataLength {
    pub const MAX: usize = 64;

    /// Payload lengths of DLC 0 to 15
    const BY_DLC: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];

    pub const fn new(value: usize) -> Option<Self> {
        match Self::new_ceil(value) {
            Some(length) if length.as_usize() == value => Some(length),
            _ => None,
        }
    }

    /// Smallest valid length that fits `value` bytes
    pub const fn new_ceil(value: usize) -> Option<Self> {
        let mut dlc = 0;
        while dlc < Self::BY_DLC.len() {
            if Self::BY_DLC[dlc] as usize >= value {
                return Some(Self(Self::BY_DLC[dlc]));
            }
            dlc += 1;
        }
        None
    }

    pub const fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl From<DataLength> for usize {
    fn from(value: DataLength) -> Self {
        value.as_usize()
    }
}

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidLength;

/// Frame payload with a DLC-compatible length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Data {
    length: DataLength,
    bytes: [u8; 64],
}

impl Data {
    /// Creates a new vector from a slice of compatible length.
    pub fn new(data: &[u8]) -> Result<Self, InvalidLength> {
        let length = DataLength::new(data.len()).ok_or(InvalidLength)?;
        let mut bytes = [0; 64];
        bytes[..data.len()].copy_from_slice(data);

        Ok(Self { length, bytes })
    }

    pub fn new_zeros(length: DataLength) -> Self {
        Self {
            length,
            bytes: [0; 64],
        }
    }

    pub fn length(&self) -> DataLength {
        self.length
    }
}

impl core::ops::Deref for Data {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.bytes[..usize::from(self.length)]
    }
}

impl core::ops::DerefMut for Data {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.bytes[..usize::from(self.length)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CAN_LENGTH: [usize; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];

    #[test]
    fn test_frame_length() {
        for len in 0usize..100 {
            let ceil = VALID_CAN_LENGTH.iter().copied().find(|&valid| valid >= len);
            assert_eq!(DataLength::new_ceil(len).map(usize::from), ceil);
            assert_eq!(
                DataLength::new(len).is_some(),
                VALID_CAN_LENGTH.contains(&len)
            );
        }
    }

    #[test]
    fn test_full_frame() {
        assert!(Mtu::is_full_frame(8));
        assert!(Mtu::is_full_frame(64));
        assert!(!Mtu::is_full_frame(7));
        assert!(!Mtu::is_full_frame(48));
    }

    #[test]
    fn test_data_rejects_invalid_length() {
        assert!(Data::new(&[0; 9]).is_err());
        let data = Data::new(&[1, 2, 3]).unwrap();
        assert_eq!(&data[..], &[1, 2, 3]);
        assert_eq!(usize::from(data.length()), 3);
    }
}
