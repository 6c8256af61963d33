use crate::core::{Priority, TransferId};
use crate::format::{SOT_TOGGLE_BIT, TAIL_LENGTH, TailByte, TransferCrc};
use crate::frame::Mtu;
use crate::time::{Duration, Instant};

#[derive(Clone, Copy)]
struct Segment<'a> {
    transfer_id: TransferId,
    priority: Priority,
    payload: &'a [u8],
    timestamp: Instant,
}

/// Metadata of a reassembled transfer; the payload is in the session buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub id: TransferId,
    pub priority: Priority,
    /// Reception time of the start-of-transfer frame
    pub timestamp: Instant,
    pub length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rejection {
    /// Tail byte, toggle, frame length or CRC violation
    Malformed,
    /// Continuation frame without a matching start, or after the transfer timed out
    Incomplete,
    /// Payload larger than the subscription extent
    ExtentExceeded,
    /// Transfer ID not ahead of the last delivered one
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Pending,
    Complete(Transfer),
    /// Redundant frame of a transfer that is already handled
    Ignored,
    Rejected(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    AccumulatedFirst,
    AccumulatedOdd,
    AccumulatedEven,
    Assembled,
}

#[derive(Debug, Clone, Copy)]
struct Delivered {
    id: TransferId,
    timestamp: Instant,
}

/// Per-session transfer reassembly state machine
///
/// Frames of one (subject, source) session are fed in arrival order together with a
/// buffer of at least `extent + 2` bytes. The rules:
///
/// 1.  A frame without data is malformed.
/// 2.  A start frame whose transfer ID does not follow the last delivered one
///     ([`TransferId::follows`]) is stale while the transfer-ID timeout since that delivery
///     runs. After the timeout any transfer ID starts a new transfer.
/// 3.  A start frame with a cleared toggle bit is malformed and stops reassembly.
/// 4.  A start frame restarts reassembly, so a replica can complete a transfer whose
///     end frame was lost.
/// 5.  A continuation frame with another transfer ID, or received after the timeout since
///     the start frame, stops reassembly. Without reassembly in progress it is discarded.
/// 6.  A non-final frame must fill a whole MTU (8 or 64 bytes); Classic frames are accepted
///     on FD networks.
/// 7.  A non-final frame repeating the previous toggle is a duplicate and ignored. A frame
///     right after the start frame, or a final frame, with the wrong toggle is malformed.
/// 8.  The final frame must carry payload and the CRC residue must be zero.
/// 9.  Accumulating more than `extent` payload bytes (plus the CRC) stops reassembly.
/// 10. Frames of an assembled transfer arriving within the timeout are ignored.
#[derive(Debug)]
pub struct Reassembler {
    state: State,
    sot_timestamp: Option<Instant>,
    transfer_id: Option<TransferId>,
    last: Option<Delivered>,
    acc: PayloadAccumulator,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self {
            state: State::Idle,
            sot_timestamp: None,
            transfer_id: None,
            last: None,
            acc: Default::default(),
        }
    }
}

impl Reassembler {
    #[allow(clippy::too_many_arguments)]
    #[rustfmt::skip]
    pub fn push_frame(
        &mut self,
        timeout: Duration,
        extent: usize,
        buffer: &mut [u8],
        priority: Priority,
        data: &[u8],
        timestamp: Instant,
    ) -> Progress {
        let Some((tail_byte, payload)) = data.split_last() else {
            return Progress::Rejected(Rejection::Malformed);
        };
        let tail = TailByte::from(*tail_byte);
        let segment = Segment {
            transfer_id: tail.transfer_id(),
            priority,
            payload,
            timestamp,
        };
        let limit = core::cmp::min(extent + TransferCrc::LENGTH, buffer.len());

        let tid_match = match self.state {
            State::Idle => false,
            _ => {
                tail.transfer_id() == unwrap!(self.transfer_id)
                    && timestamp <= unwrap!(self.sot_timestamp).saturating_add(timeout)
            }
        };

        if tail.sot() && !(self.state == State::Assembled && tid_match)
            && self.is_stale(tail.transfer_id(), timestamp, timeout)
        {
            return Progress::Rejected(Rejection::Stale);
        }

        let toggle_odd = tail.toggle() ^ SOT_TOGGLE_BIT;

        match (self.state, tail.sot(), tail.eot(), toggle_odd, tid_match) {
            (State::Assembled, _, _, _, true) => Progress::Ignored,
            (_, true, _, true, _) => self.stop_assembly(Rejection::Malformed),
            (_, true, true, false, _) => self.single_frame_assembly(extent, buffer, segment),
            (_, true, false, false, _) => self.accumulate(State::AccumulatedFirst, limit, buffer, segment),
            (_, _, _, _, false) => self.stop_assembly(Rejection::Incomplete),
            (State::Idle, _, _, _, _) => Progress::Ignored,
            (State::AccumulatedFirst, false, false, false, true) => self.stop_assembly(Rejection::Malformed),
            (State::AccumulatedFirst, false, false, true, true) => self.accumulate(State::AccumulatedOdd, limit, buffer, segment),
            (State::AccumulatedFirst, false, true, false, true) => self.stop_assembly(Rejection::Malformed),
            (State::AccumulatedFirst, false, true, true, true) => self.finish_assembly(limit, buffer, segment),
            (State::AccumulatedOdd, false, false, false, true) => self.accumulate(State::AccumulatedEven, limit, buffer, segment),
            (State::AccumulatedOdd, false, false, true, true) => Progress::Ignored,
            (State::AccumulatedOdd, false, true, false, true) => self.finish_assembly(limit, buffer, segment),
            (State::AccumulatedOdd, false, true, true, true) => self.stop_assembly(Rejection::Malformed),
            (State::AccumulatedEven, false, false, false, true) => Progress::Ignored,
            (State::AccumulatedEven, false, false, true, true) => self.accumulate(State::AccumulatedOdd, limit, buffer, segment),
            (State::AccumulatedEven, false, true, false, true) => self.stop_assembly(Rejection::Malformed),
            (State::AccumulatedEven, false, true, true, true) => self.finish_assembly(limit, buffer, segment),
        }
    }

    fn is_stale(&self, id: TransferId, timestamp: Instant, timeout: Duration) -> bool {
        match self.last {
            Some(last) => {
                timestamp <= last.timestamp.saturating_add(timeout) && !id.follows(last.id)
            }
            None => false,
        }
    }

    fn single_frame_assembly(
        &mut self,
        extent: usize,
        buffer: &mut [u8],
        segment: Segment,
    ) -> Progress {
        let length = segment.payload.len();
        if length > extent || length > buffer.len() {
            return self.stop_assembly(Rejection::ExtentExceeded);
        }
        buffer[..length].copy_from_slice(segment.payload);

        self.state = State::Assembled;
        self.sot_timestamp = Some(segment.timestamp);
        self.transfer_id = Some(segment.transfer_id);
        self.acc = Default::default();
        self.complete(segment, length)
    }

    fn accumulate(
        &mut self,
        next: State,
        limit: usize,
        buffer: &mut [u8],
        segment: Segment,
    ) -> Progress {
        if !Mtu::is_full_frame(segment.payload.len() + TAIL_LENGTH) {
            return self.stop_assembly(Rejection::Malformed);
        }

        if next == State::AccumulatedFirst {
            self.sot_timestamp = Some(segment.timestamp);
            self.transfer_id = Some(segment.transfer_id);
            self.acc = Default::default();
        }
        self.state = next;

        match self.acc.append(limit, buffer, segment.payload) {
            Ok(()) => Progress::Pending,
            Err(reason) => self.stop_assembly(reason),
        }
    }

    fn finish_assembly(&mut self, limit: usize, buffer: &mut [u8], segment: Segment) -> Progress {
        if segment.payload.is_empty() {
            return self.stop_assembly(Rejection::Malformed);
        }
        if let Err(reason) = self.acc.append(limit, buffer, segment.payload) {
            return self.stop_assembly(reason);
        }
        let length = match self.acc.try_get() {
            Some(length) => length,
            None => return self.stop_assembly(Rejection::Malformed),
        };

        self.state = State::Assembled;
        self.acc = Default::default();
        let start = Segment {
            transfer_id: unwrap!(self.transfer_id),
            timestamp: unwrap!(self.sot_timestamp),
            ..segment
        };
        self.complete(start, length)
    }

    fn complete(&mut self, start: Segment, length: usize) -> Progress {
        self.last = Some(Delivered {
            id: start.transfer_id,
            timestamp: start.timestamp,
        });
        Progress::Complete(Transfer {
            id: start.transfer_id,
            priority: start.priority,
            timestamp: start.timestamp,
            length,
        })
    }

    fn stop_assembly(&mut self, reason: Rejection) -> Progress {
        self.state = State::Idle;
        self.transfer_id = None;
        self.sot_timestamp = None;
        self.acc = Default::default();
        Progress::Rejected(reason)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PayloadAccumulator {
    length: usize,
    crc: TransferCrc,
}

impl PayloadAccumulator {
    fn append(&mut self, limit: usize, buffer: &mut [u8], segment: &[u8]) -> Result<(), Rejection> {
        let end = self.length + segment.len();
        if end > limit {
            return Err(Rejection::ExtentExceeded);
        }
        buffer[self.length..end].copy_from_slice(segment);
        self.length = end;
        self.crc.add_bytes(segment);
        Ok(())
    }

    fn try_get(&self) -> Option<usize> {
        if self.length >= TransferCrc::LENGTH && self.crc.is_residue_valid() {
            Some(self.length - TransferCrc::LENGTH)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(2);
    const EXTENT: usize = 64;
    const PRIORITY: Priority = Priority::Nominal;

    fn ts(us: u64) -> Instant {
        Instant::MIN.saturating_add(Duration::from_micros(us))
    }

    fn complete(id: u8, timestamp: Instant, length: usize) -> Progress {
        Progress::Complete(Transfer {
            id: TransferId::from_u8_truncating(id),
            priority: PRIORITY,
            timestamp,
            length,
        })
    }

    fn push(r: &mut Reassembler, buffer: &mut [u8], data: &[u8], t: Instant) -> Progress {
        r.push_frame(TIMEOUT, EXTENT, buffer, PRIORITY, data, t)
    }

    #[test]
    fn test_single_frame_transfer() {
        let mut r = Reassembler::default();
        let mut buffer = [0xff; 66];

        let progress = push(&mut r, &mut buffer, &[0, 1, 2, 3, 0b1110_0000 + 27], ts(10));
        assert_eq!(progress, complete(27, ts(10), 4));
        assert_eq!(buffer[..4], [0, 1, 2, 3]);
    }

    #[test]
    fn test_empty_frame_is_malformed() {
        let mut r = Reassembler::default();
        let mut buffer = [0; 66];
        assert_eq!(
            push(&mut r, &mut buffer, &[], ts(10)),
            Progress::Rejected(Rejection::Malformed)
        );
    }

    #[test]
    fn test_two_frame_transfer() {
        let mut r = Reassembler::default();
        let mut buffer = [0xff; 66];

        let first = [0, 1, 2, 3, 4, 5, 6, 0b1010_0000 + 27];
        assert_eq!(push(&mut r, &mut buffer, &first, ts(10)), Progress::Pending);

        let last = [7, 0x17, 0x8d, 0b0100_0000 + 27];
        assert_eq!(push(&mut r, &mut buffer, &last, ts(20)), complete(27, ts(10), 8));
        assert_eq!(buffer[..8], [0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_three_frame_transfer_with_duplicates() {
        let mut r = Reassembler::default();
        let mut buffer = [0xff; 66];

        let first = [0, 1, 2, 3, 4, 5, 6, 0b1010_0000 + 27];
        let middle = [7, 8, 9, 10, 11, 12, 0xac, 0b0000_0000 + 27];
        let last = [0xdd, 0b0110_0000 + 27];

        assert_eq!(push(&mut r, &mut buffer, &first, ts(10)), Progress::Pending);
        assert_eq!(push(&mut r, &mut buffer, &first, ts(10)), Progress::Pending);
        assert_eq!(push(&mut r, &mut buffer, &middle, ts(10)), Progress::Pending);
        assert_eq!(push(&mut r, &mut buffer, &middle, ts(10)), Progress::Ignored);
        assert_eq!(push(&mut r, &mut buffer, &last, ts(10)), complete(27, ts(10), 13));
        assert_eq!(push(&mut r, &mut buffer, &last, ts(10)), Progress::Ignored);
        assert_eq!(buffer[..13], [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_crc_mismatch() {
        let mut r = Reassembler::default();
        let mut buffer = [0; 66];

        let first = [0, 1, 2, 3, 4, 5, 6, 0b1010_0000 + 27];
        let corrupted = [7, 0x17, 0x8e, 0b0100_0000 + 27];
        assert_eq!(push(&mut r, &mut buffer, &first, ts(10)), Progress::Pending);
        assert_eq!(
            push(&mut r, &mut buffer, &corrupted, ts(10)),
            Progress::Rejected(Rejection::Malformed)
        );
    }

    #[test]
    fn test_start_frame_with_wrong_toggle() {
        let mut r = Reassembler::default();
        let mut buffer = [0; 66];
        assert_eq!(
            push(&mut r, &mut buffer, &[1, 0b1100_0000 + 3], ts(10)),
            Progress::Rejected(Rejection::Malformed)
        );
    }

    #[test]
    fn test_short_non_final_frame() {
        let mut r = Reassembler::default();
        let mut buffer = [0; 66];
        assert_eq!(
            push(&mut r, &mut buffer, &[0, 1, 2, 0b1010_0000 + 27], ts(10)),
            Progress::Rejected(Rejection::Malformed)
        );
    }

    #[test]
    fn test_continuation_without_start() {
        let mut r = Reassembler::default();
        let mut buffer = [0; 66];
        assert_eq!(
            push(&mut r, &mut buffer, &[7, 0x17, 0x8d, 0b0100_0000 + 27], ts(10)),
            Progress::Rejected(Rejection::Incomplete)
        );
    }

    #[test]
    fn test_continuation_after_timeout() {
        let mut r = Reassembler::default();
        let mut buffer = [0; 66];

        let first = [0, 1, 2, 3, 4, 5, 6, 0b1010_0000 + 27];
        let last = [7, 0x17, 0x8d, 0b0100_0000 + 27];
        assert_eq!(push(&mut r, &mut buffer, &first, ts(10)), Progress::Pending);
        assert_eq!(
            push(&mut r, &mut buffer, &last, ts(2_000_020)),
            Progress::Rejected(Rejection::Incomplete)
        );
    }

    #[test]
    fn test_single_frame_over_extent() {
        let mut r = Reassembler::default();
        let mut buffer = [0; 66];
        let progress = r.push_frame(
            TIMEOUT,
            4,
            &mut buffer,
            PRIORITY,
            &[0, 1, 2, 3, 4, 0b1110_0000 + 1],
            ts(10),
        );
        assert_eq!(progress, Progress::Rejected(Rejection::ExtentExceeded));
    }

    #[test]
    fn test_multi_frame_over_extent() {
        let mut r = Reassembler::default();
        let mut buffer = [0; 66];

        let first = [0, 1, 2, 3, 4, 5, 6, 0b1010_0000 + 27];
        let middle = [7, 8, 9, 10, 11, 12, 0xac, 0b0000_0000 + 27];
        let progress = r.push_frame(TIMEOUT, 8, &mut buffer, PRIORITY, &first, ts(10));
        assert_eq!(progress, Progress::Pending);
        let progress = r.push_frame(TIMEOUT, 8, &mut buffer, PRIORITY, &middle, ts(10));
        assert_eq!(progress, Progress::Rejected(Rejection::ExtentExceeded));
    }

    #[test]
    fn test_consecutive_ids_in_order() {
        let mut r = Reassembler::default();
        let mut buffer = [0; 66];
        assert_eq!(push(&mut r, &mut buffer, &[1, 0b1110_0000 + 31], ts(10)), complete(31, ts(10), 1));
        assert_eq!(push(&mut r, &mut buffer, &[2, 0b1110_0000], ts(20)), complete(0, ts(20), 1));
    }

    #[test]
    fn test_consecutive_ids_reversed() {
        let mut r = Reassembler::default();
        let mut buffer = [0; 66];
        assert_eq!(push(&mut r, &mut buffer, &[2, 0b1110_0000 + 6], ts(10)), complete(6, ts(10), 1));
        assert_eq!(
            push(&mut r, &mut buffer, &[1, 0b1110_0000 + 5], ts(20)),
            Progress::Rejected(Rejection::Stale)
        );
    }

    #[test]
    fn test_duplicate_single_frame() {
        let mut r = Reassembler::default();
        let mut buffer = [0; 66];
        let data = [1, 0b1110_0000 + 9];
        assert_eq!(push(&mut r, &mut buffer, &data, ts(10)), complete(9, ts(10), 1));
        assert_eq!(push(&mut r, &mut buffer, &data, ts(20)), Progress::Ignored);
    }

    #[test]
    fn test_stale_id_accepted_after_timeout() {
        let mut r = Reassembler::default();
        let mut buffer = [0; 66];
        assert_eq!(push(&mut r, &mut buffer, &[2, 0b1110_0000 + 6], ts(10)), complete(6, ts(10), 1));
        assert_eq!(
            push(&mut r, &mut buffer, &[1, 0b1110_0000 + 5], ts(2_000_011)),
            complete(5, ts(2_000_011), 1)
        );
    }

    #[test]
    fn test_replica_completes_interrupted_transfer() {
        let mut r = Reassembler::default();
        let mut buffer = [0; 66];

        let first = [0, 1, 2, 3, 4, 5, 6, 0b1010_0000 + 27];
        let last = [7, 0x17, 0x8d, 0b0100_0000 + 27];
        assert_eq!(push(&mut r, &mut buffer, &first, ts(10)), Progress::Pending);
        assert_eq!(push(&mut r, &mut buffer, &first, ts(30)), Progress::Pending);
        assert_eq!(push(&mut r, &mut buffer, &last, ts(40)), complete(27, ts(30), 8));
    }
}
