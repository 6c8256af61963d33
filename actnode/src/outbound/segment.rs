use core::cmp::min;

use crate::core::TransferId;
use crate::format::{PAD_VALUE, SOT_TOGGLE_BIT, TAIL_LENGTH, TailByte, TransferCrc};
use crate::frame::{Data, DataLength, Mtu};

const CRC_LENGTH: usize = TransferCrc::LENGTH;

/// Number of frames a payload of `length` bytes occupies
pub fn frame_count(length: usize, mtu: Mtu) -> usize {
    let capacity = usize::from(mtu) - TAIL_LENGTH;
    if length <= capacity {
        1
    } else {
        (length + CRC_LENGTH).div_ceil(capacity)
    }
}

/// Splits a transfer payload into frame data
///
/// A payload that fits one frame is sent as is. Longer payloads are followed by the
/// big-endian transfer CRC; the last frame is zero-padded up to a valid DLC, and the
/// padding is covered by the CRC.
pub struct Segments<'a> {
    payload: &'a [u8],
    transfer_id: TransferId,
    mtu: Mtu,
    toggle: bool,
    offset: usize,
    crc: TransferCrc,
    finished: bool,
}

impl<'a> Segments<'a> {
    pub fn new(payload: &'a [u8], transfer_id: TransferId, mtu: Mtu) -> Self {
        Self {
            payload,
            transfer_id,
            mtu,
            toggle: SOT_TOGGLE_BIT,
            offset: 0,
            crc: TransferCrc::default(),
            finished: false,
        }
    }

    fn single_frame(&mut self) -> Data {
        let length = unwrap!(DataLength::new_ceil(self.payload.len() + TAIL_LENGTH));
        let mut data = Data::new_zeros(length);
        let (tail, body) = unwrap!(data.split_last_mut());
        let (head, pad) = body.split_at_mut(self.payload.len());
        head.copy_from_slice(self.payload);
        pad.fill(PAD_VALUE);
        *tail = TailByte::new(true, true, SOT_TOGGLE_BIT, self.transfer_id).into();
        self.finished = true;
        data
    }

    fn next_frame(&mut self) -> Data {
        let capacity = usize::from(self.mtu) - TAIL_LENGTH;
        let total = self.payload.len() + CRC_LENGTH;
        let chunk = min(total - self.offset, capacity);
        let length = unwrap!(DataLength::new_ceil(chunk + TAIL_LENGTH));
        let mut data = Data::new_zeros(length);
        let (tail, body) = unwrap!(data.split_last_mut());
        let sot = self.offset == 0;

        let mut written = 0;
        if self.offset < self.payload.len() {
            let count = min(self.payload.len() - self.offset, chunk);
            let bytes = &self.payload[self.offset..self.offset + count];
            body[..count].copy_from_slice(bytes);
            self.crc.add_bytes(bytes);
            self.offset += count;
            written = count;
        }

        // Only the last frame rounds up to a DLC, and it always holds the whole CRC then.
        let padding = body.len() - chunk;
        if padding > 0 {
            debug_assert!(self.offset == self.payload.len());
            let pad = &mut body[written..written + padding];
            pad.fill(PAD_VALUE);
            self.crc.add_bytes(pad);
            written += padding;
        }

        let crc = self.crc.get().to_be_bytes();
        for byte in &mut body[written..] {
            *byte = crc[self.offset - self.payload.len()];
            self.offset += 1;
        }

        let eot = self.offset == total;
        *tail = TailByte::new(sot, eot, self.toggle, self.transfer_id).into();
        self.toggle = !self.toggle;
        self.finished = eot;
        data
    }
}

impl Iterator for Segments<'_> {
    type Item = Data;

    fn next(&mut self) -> Option<Data> {
        if self.finished {
            return None;
        }
        let capacity = usize::from(self.mtu) - TAIL_LENGTH;
        if self.offset == 0 && self.payload.len() <= capacity {
            Some(self.single_frame())
        } else {
            Some(self.next_frame())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid() -> TransferId {
        TransferId::from_u8_truncating(27)
    }

    #[test]
    fn test_empty_payload() {
        let mut segments = Segments::new(&[], tid(), Mtu::Classic);
        assert_eq!(segments.next(), Some(Data::new(&[0b1110_0000 + 27]).unwrap()));
        assert_eq!(segments.next(), None);
        assert_eq!(frame_count(0, Mtu::Classic), 1);
    }

    #[test]
    fn test_full_single_frame() {
        let payload = [0, 1, 2, 3, 4, 5, 6];
        let mut segments = Segments::new(&payload, tid(), Mtu::Classic);
        assert_eq!(
            segments.next(),
            Some(Data::new(&[0, 1, 2, 3, 4, 5, 6, 0b1110_0000 + 27]).unwrap())
        );
        assert_eq!(segments.next(), None);
    }

    #[test]
    fn test_minimum_double_frame() {
        let payload = [0, 1, 2, 3, 4, 5, 6, 7];
        let mut segments = Segments::new(&payload, tid(), Mtu::Classic);
        assert_eq!(
            segments.next(),
            Some(Data::new(&[0, 1, 2, 3, 4, 5, 6, 0b1010_0000 + 27]).unwrap())
        );
        assert_eq!(
            segments.next(),
            Some(Data::new(&[7, 0x17, 0x8d, 0b0100_0000 + 27]).unwrap())
        );
        assert_eq!(segments.next(), None);
        assert_eq!(frame_count(payload.len(), Mtu::Classic), 2);
    }

    #[test]
    fn test_crc_split_across_frames() {
        let payload = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let mut segments = Segments::new(&payload, tid(), Mtu::Classic);
        assert_eq!(
            segments.next(),
            Some(Data::new(&[0, 1, 2, 3, 4, 5, 6, 0b1010_0000 + 27]).unwrap())
        );
        assert_eq!(
            segments.next(),
            Some(Data::new(&[7, 8, 9, 10, 11, 12, 0xac, 0b0000_0000 + 27]).unwrap())
        );
        assert_eq!(
            segments.next(),
            Some(Data::new(&[0xdd, 0b0110_0000 + 27]).unwrap())
        );
        assert_eq!(segments.next(), None);
        assert_eq!(frame_count(payload.len(), Mtu::Classic), 3);
    }

    #[test]
    fn test_single_fd_frame_padding() {
        let payload = [0, 1, 2, 3, 4, 5, 6, 7];
        let mut segments = Segments::new(&payload, tid(), Mtu::Fd);
        assert_eq!(
            segments.next(),
            Some(Data::new(&[0, 1, 2, 3, 4, 5, 6, 7, 0, 0, 0, 0b1110_0000 + 27]).unwrap())
        );
        assert_eq!(segments.next(), None);
    }

    #[rustfmt::skip]
    #[test]
    fn test_multi_fd_frame_padding() {
        let payload: [u8; 69] = core::array::from_fn(|i| i as u8);
        let mut segments = Segments::new(&payload, tid(), Mtu::Fd);
        let first: heapless::Vec<u8, 64> = (0u8..63).chain([0b1010_0000u8 + 27]).collect();
        assert_eq!(segments.next(), Some(Data::new(&first).unwrap()));
        assert_eq!(
            segments.next(),
            Some(Data::new(&[63, 64, 65, 66, 67, 68, 0, 0, 0, 0xd6, 0x2c, 0b0100_0000 + 27]).unwrap())
        );
        assert_eq!(segments.next(), None);
        assert_eq!(frame_count(payload.len(), Mtu::Fd), 2);
    }
}
