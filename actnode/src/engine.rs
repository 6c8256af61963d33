//! Protocol engine: frame to transfer reconstruction and subscription dispatch
//!
//! The engine runs in task context. It parses each frame identifier, looks the subject up
//! in a fixed subscription table, feeds the frame to the reassembly session of its
//! (subject, source) pair, and hands every completed transfer to a [`TransferHandler`]
//! together with the tag of the matching subscription.

mod reassembly;

pub use reassembly::Rejection;

use heapless::Vec;

use crate::core::{NodeId, Priority, SubjectId, TransferId};
use crate::frame::Frame;
use crate::time::{Duration, Instant};
use crate::can_id::Header;
use reassembly::{Progress, Reassembler};

/// Subscription table size
pub const MAX_SUBSCRIPTIONS: usize = 8;
/// Largest extent a subscription may declare
pub const MAX_EXTENT: usize = 64;
/// Number of concurrently tracked (subject, source) sessions
pub const SESSION_COUNT: usize = 16;

const SESSION_BUFFER_SIZE: usize = MAX_EXTENT + crate::format::TransferCrc::LENGTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Subscription<K> {
    pub subject: SubjectId,
    /// Largest payload accepted, in bytes
    pub extent: usize,
    /// Transfer-ID timeout, also bounds multi-frame reassembly
    pub timeout: Duration,
    pub tag: K,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubscriptionError {
    TableFull,
    DuplicateSubject,
    ExtentTooLarge,
}

/// Startup-time builder of the immutable subscription table
#[derive(Debug, Clone)]
pub struct SubscriptionTable<K> {
    entries: Vec<Subscription<K>, MAX_SUBSCRIPTIONS>,
}

impl<K: Copy> SubscriptionTable<K> {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, subscription: Subscription<K>) -> Result<(), SubscriptionError> {
        if subscription.extent > MAX_EXTENT {
            return Err(SubscriptionError::ExtentTooLarge);
        }
        if self.find(subscription.subject).is_some() {
            return Err(SubscriptionError::DuplicateSubject);
        }
        self.entries
            .push(subscription)
            .map_err(|_| SubscriptionError::TableFull)
    }

    pub fn find(&self, subject: SubjectId) -> Option<&Subscription<K>> {
        self.entries.iter().find(|entry| entry.subject == subject)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription<K>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Copy> Default for SubscriptionTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// A reassembled message transfer
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transfer<'a> {
    pub subject: SubjectId,
    /// `None` for anonymous transfers
    pub source: Option<NodeId>,
    pub transfer_id: TransferId,
    pub priority: Priority,
    pub payload: &'a [u8],
    /// Reception time of the first frame
    pub timestamp: Instant,
}

/// Receiver of completed transfers
///
/// Called synchronously from [`Engine::process_pending`] in task context.
pub trait TransferHandler<K> {
    fn on_transfer(&mut self, tag: K, transfer: &Transfer<'_>);
}

/// Transport error counters; they never stop frame processing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransportStats {
    pub frames: u32,
    pub transfers: u32,
    /// Service frames, reserved bit violations and subjects without subscription
    pub unmatched: u32,
    pub malformed: u32,
    pub incomplete: u32,
    pub extent_violations: u32,
    pub stale: u32,
    pub pool_exhausted: u32,
}

impl TransportStats {
    fn count(&mut self, reason: Rejection) {
        let counter = match reason {
            Rejection::Malformed => &mut self.malformed,
            Rejection::Incomplete => &mut self.incomplete,
            Rejection::ExtentExceeded => &mut self.extent_violations,
            Rejection::Stale => &mut self.stale,
        };
        *counter = counter.wrapping_add(1);
    }
}

struct Session {
    subject: SubjectId,
    source: NodeId,
    last_activity: Instant,
    reassembler: Reassembler,
    buffer: [u8; SESSION_BUFFER_SIZE],
}

impl Session {
    fn new(subject: SubjectId, source: NodeId, now: Instant) -> Self {
        Self {
            subject,
            source,
            last_activity: now,
            reassembler: Reassembler::default(),
            buffer: [0; SESSION_BUFFER_SIZE],
        }
    }

    fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        now > self.last_activity.saturating_add(timeout)
    }
}

pub struct Engine<K> {
    table: SubscriptionTable<K>,
    sessions: [Option<Session>; SESSION_COUNT],
    anonymous_buffer: [u8; MAX_EXTENT],
    stats: TransportStats,
}

impl<K: Copy> Engine<K> {
    pub fn new(table: SubscriptionTable<K>) -> Self {
        Self {
            table,
            sessions: core::array::from_fn(|_| None),
            anonymous_buffer: [0; MAX_EXTENT],
            stats: TransportStats::default(),
        }
    }

    pub fn subscriptions(&self) -> &SubscriptionTable<K> {
        &self.table
    }

    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    /// Processes every frame the iterator yields, in order.
    ///
    /// Returns the number of transfers delivered.
    pub fn process_pending<I, H>(&mut self, frames: I, handler: &mut H) -> usize
    where
        I: IntoIterator<Item = Frame>,
        H: TransferHandler<K>,
    {
        let mut delivered = 0;
        for frame in frames {
            if self.accept(&frame, handler) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Feeds a single frame. Returns true if it completed a transfer.
    pub fn accept<H: TransferHandler<K>>(&mut self, frame: &Frame, handler: &mut H) -> bool {
        self.stats.frames = self.stats.frames.wrapping_add(1);

        let Some(header) = Header::parse(frame.id) else {
            self.stats.unmatched = self.stats.unmatched.wrapping_add(1);
            return false;
        };
        let Some(subscription) = self.table.find(header.subject).copied() else {
            self.stats.unmatched = self.stats.unmatched.wrapping_add(1);
            return false;
        };

        match header.source {
            Some(source) => self.accept_session(subscription, header, source, frame, handler),
            None => self.accept_anonymous(subscription, header, frame, handler),
        }
    }

    fn accept_session<H: TransferHandler<K>>(
        &mut self,
        subscription: Subscription<K>,
        header: Header,
        source: NodeId,
        frame: &Frame,
        handler: &mut H,
    ) -> bool {
        let Some(index) = self.session_index(&subscription, source, frame.timestamp) else {
            self.stats.pool_exhausted = self.stats.pool_exhausted.wrapping_add(1);
            warn!(
                "session pool exhausted, subject {} source {}",
                subscription.subject.into_u16(),
                source.into_u8()
            );
            return false;
        };
        let session = unwrap!(self.sessions[index].as_mut());
        session.last_activity = frame.timestamp;

        let progress = session.reassembler.push_frame(
            subscription.timeout,
            subscription.extent,
            &mut session.buffer,
            header.priority,
            &frame.data,
            frame.timestamp,
        );
        match progress {
            Progress::Complete(transfer) => {
                self.stats.transfers = self.stats.transfers.wrapping_add(1);
                let transfer = Transfer {
                    subject: subscription.subject,
                    source: Some(source),
                    transfer_id: transfer.id,
                    priority: transfer.priority,
                    payload: &session.buffer[..transfer.length],
                    timestamp: transfer.timestamp,
                };
                handler.on_transfer(subscription.tag, &transfer);
                true
            }
            Progress::Pending | Progress::Ignored => false,
            Progress::Rejected(reason) => {
                trace!(
                    "transfer dropped, subject {} source {}",
                    subscription.subject.into_u16(),
                    source.into_u8()
                );
                self.stats.count(reason);
                false
            }
        }
    }

    // Anonymous transfers are single-frame only and have no session to deduplicate them.
    fn accept_anonymous<H: TransferHandler<K>>(
        &mut self,
        subscription: Subscription<K>,
        header: Header,
        frame: &Frame,
        handler: &mut H,
    ) -> bool {
        let mut reassembler = Reassembler::default();
        let progress = reassembler.push_frame(
            subscription.timeout,
            subscription.extent,
            &mut self.anonymous_buffer,
            header.priority,
            &frame.data,
            frame.timestamp,
        );
        match progress {
            Progress::Complete(transfer) => {
                self.stats.transfers = self.stats.transfers.wrapping_add(1);
                let transfer = Transfer {
                    subject: subscription.subject,
                    source: None,
                    transfer_id: transfer.id,
                    priority: transfer.priority,
                    payload: &self.anonymous_buffer[..transfer.length],
                    timestamp: transfer.timestamp,
                };
                handler.on_transfer(subscription.tag, &transfer);
                true
            }
            Progress::Pending | Progress::Ignored => {
                self.stats.count(Rejection::Malformed);
                false
            }
            Progress::Rejected(reason) => {
                self.stats.count(reason);
                false
            }
        }
    }

    /// Finds the session of the pair or claims a slot for it.
    ///
    /// A slot is free when empty, or when its session has been silent for longer than the
    /// transfer-ID timeout of its subject. A transfer left unfinished that long is dead.
    fn session_index(
        &mut self,
        subscription: &Subscription<K>,
        source: NodeId,
        now: Instant,
    ) -> Option<usize> {
        let existing = self.sessions.iter().position(|slot| {
            slot.as_ref()
                .is_some_and(|s| s.subject == subscription.subject && s.source == source)
        });
        if existing.is_some() {
            return existing;
        }

        let table = &self.table;
        let vacant = self.sessions.iter().position(|slot| match slot {
            None => true,
            Some(session) => {
                let timeout = table
                    .find(session.subject)
                    .map_or(Duration::from_ticks(0), |entry| entry.timeout);
                session.is_expired(now, timeout)
            }
        })?;
        self.sessions[vacant] = Some(Session::new(subscription.subject, source, now));
        Some(vacant)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::outbound::Segments;
    use crate::frame::Mtu;
    use std::vec::Vec as StdVec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Tag {
        A,
        B,
    }

    #[derive(Default)]
    struct Recorder {
        transfers: StdVec<(Tag, u16, Option<u8>, u8, StdVec<u8>)>,
    }

    impl TransferHandler<Tag> for Recorder {
        fn on_transfer(&mut self, tag: Tag, transfer: &Transfer<'_>) {
            self.transfers.push((
                tag,
                transfer.subject.into_u16(),
                transfer.source.map(NodeId::into_u8),
                transfer.transfer_id.into_u8(),
                transfer.payload.to_vec(),
            ));
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn ts(ms: u64) -> Instant {
        Instant::MIN.saturating_add(Duration::from_millis(ms))
    }

    fn subject(value: u16) -> SubjectId {
        SubjectId::new(value).unwrap()
    }

    fn engine(extent: usize) -> Engine<Tag> {
        let mut table = SubscriptionTable::new();
        table
            .subscribe(Subscription {
                subject: subject(3010),
                extent,
                timeout: TIMEOUT,
                tag: Tag::A,
            })
            .unwrap();
        table
            .subscribe(Subscription {
                subject: subject(3020),
                extent,
                timeout: TIMEOUT,
                tag: Tag::B,
            })
            .unwrap();
        Engine::new(table)
    }

    fn frames(
        subject_id: u16,
        source: u8,
        tid: u8,
        payload: &[u8],
        mtu: Mtu,
        at: Instant,
    ) -> StdVec<Frame> {
        let id = Header::message_id(
            Priority::Nominal,
            subject(subject_id),
            NodeId::new(source).unwrap(),
        );
        Segments::new(payload, TransferId::from_u8_truncating(tid), mtu)
            .map(|data| Frame {
                id,
                data,
                timestamp: at,
            })
            .collect()
    }

    #[test]
    fn test_subscription_table_limits() {
        let mut table: SubscriptionTable<u8> = SubscriptionTable::new();
        for i in 0..MAX_SUBSCRIPTIONS as u16 {
            let entry = Subscription {
                subject: subject(i),
                extent: 8,
                timeout: TIMEOUT,
                tag: 0,
            };
            table.subscribe(entry).unwrap();
        }
        let entry = Subscription {
            subject: subject(100),
            extent: 8,
            timeout: TIMEOUT,
            tag: 0,
        };
        assert_eq!(table.subscribe(entry), Err(SubscriptionError::TableFull));

        let mut table: SubscriptionTable<u8> = SubscriptionTable::new();
        table.subscribe(Subscription { subject: subject(1), ..entry }).unwrap();
        assert_eq!(
            table.subscribe(Subscription { subject: subject(1), ..entry }),
            Err(SubscriptionError::DuplicateSubject)
        );
        assert_eq!(
            table.subscribe(Subscription { extent: 65, ..entry }),
            Err(SubscriptionError::ExtentTooLarge)
        );
    }

    #[test]
    fn test_dispatch_by_subject() {
        let mut engine = engine(64);
        let mut recorder = Recorder::default();

        let mut input = frames(3020, 5, 0, &[1], Mtu::Classic, ts(1));
        input.extend(frames(3010, 5, 0, &[2, 3], Mtu::Classic, ts(2)));
        input.extend(frames(3011, 5, 0, &[4], Mtu::Classic, ts(3)));

        assert_eq!(engine.process_pending(input, &mut recorder), 2);
        assert_eq!(
            recorder.transfers,
            [
                (Tag::B, 3020, Some(5), 0, std::vec![1]),
                (Tag::A, 3010, Some(5), 0, std::vec![2, 3]),
            ]
        );
        assert_eq!(engine.stats().unmatched, 1);
    }

    #[test]
    fn test_multi_frame_transfer_from_segmenter() {
        let mut engine = engine(64);
        let mut recorder = Recorder::default();
        let payload: [u8; 40] = core::array::from_fn(|i| i as u8);

        let input = frames(3010, 9, 17, &payload, Mtu::Classic, ts(1));
        assert_eq!(input.len(), 6);
        assert_eq!(engine.process_pending(input, &mut recorder), 1);
        assert_eq!(recorder.transfers[0].4, payload);
    }

    #[test]
    fn test_interleaved_sources() {
        let mut engine = engine(64);
        let mut recorder = Recorder::default();
        let a = frames(3010, 1, 3, &[0xaa; 10], Mtu::Classic, ts(1));
        let b = frames(3010, 2, 7, &[0xbb; 10], Mtu::Classic, ts(1));

        let input = [a[0], b[0], a[1], b[1]];
        assert_eq!(engine.process_pending(input, &mut recorder), 2);
        assert_eq!(recorder.transfers[0].2, Some(1));
        assert_eq!(recorder.transfers[0].4, [0xaa; 10]);
        assert_eq!(recorder.transfers[1].2, Some(2));
        assert_eq!(recorder.transfers[1].4, [0xbb; 10]);
    }

    #[test]
    fn test_extent_violation_is_not_delivered() {
        let mut engine = engine(8);
        let mut recorder = Recorder::default();

        let input = frames(3010, 5, 0, &[0; 20], Mtu::Classic, ts(1));
        assert_eq!(engine.process_pending(input, &mut recorder), 0);
        assert!(recorder.transfers.is_empty());
        assert_eq!(engine.stats().extent_violations, 1);
    }

    #[test]
    fn test_transfer_id_ordering() {
        let mut engine = engine(64);
        let mut recorder = Recorder::default();

        let mut input = frames(3010, 5, 4, &[1], Mtu::Classic, ts(1));
        input.extend(frames(3010, 5, 5, &[2], Mtu::Classic, ts(2)));
        assert_eq!(engine.process_pending(input, &mut recorder), 2);

        let mut engine = self::engine(64);
        let mut input = frames(3010, 5, 5, &[2], Mtu::Classic, ts(1));
        input.extend(frames(3010, 5, 4, &[1], Mtu::Classic, ts(2)));
        assert_eq!(engine.process_pending(input, &mut recorder), 1);
        assert_eq!(engine.stats().stale, 1);
    }

    #[test]
    fn test_anonymous_single_frame() {
        let mut engine = engine(64);
        let mut recorder = Recorder::default();

        let mut id = crate::can_id::MessageCanId::new();
        id.set_subject(subject(3020));
        id.set_anonymous(true);
        let frame = Frame::new(id.into_u32(), &[1, 0b1110_0000], ts(1)).unwrap();
        assert!(engine.accept(&frame, &mut recorder));
        assert_eq!(recorder.transfers[0].2, None);

        let frame = Frame::new(id.into_u32(), &[1, 2, 3, 4, 5, 6, 7, 0b1010_0001], ts(2)).unwrap();
        assert!(!engine.accept(&frame, &mut recorder));
        assert_eq!(engine.stats().malformed, 1);
    }

    #[test]
    fn test_session_pool_exhaustion_and_reclaim() {
        let mut engine = engine(64);
        let mut recorder = Recorder::default();

        for source in 0..SESSION_COUNT as u8 {
            let input = frames(3010, source, 0, &[source], Mtu::Classic, ts(1));
            assert_eq!(engine.process_pending(input, &mut recorder), 1);
        }
        let input = frames(3010, 100, 0, &[0], Mtu::Classic, ts(2));
        assert_eq!(engine.process_pending(input, &mut recorder), 0);
        assert_eq!(engine.stats().pool_exhausted, 1);

        let input = frames(3010, 100, 0, &[0], Mtu::Classic, ts(3_000));
        assert_eq!(engine.process_pending(input, &mut recorder), 1);
    }

    #[test]
    fn test_abandoned_transfers_are_reclaimed() {
        let mut engine = engine(64);
        let mut recorder = Recorder::default();

        // Start frames only; the rest of each transfer never arrives.
        for source in 0..SESSION_COUNT as u8 {
            let input = frames(3010, source, 0, &[source; 10], Mtu::Classic, ts(1));
            assert_eq!(engine.process_pending(input.into_iter().take(1), &mut recorder), 0);
        }
        let input = frames(3010, 100, 0, &[0], Mtu::Classic, ts(2));
        assert_eq!(engine.process_pending(input, &mut recorder), 0);
        assert_eq!(engine.stats().pool_exhausted, 1);

        let input = frames(3010, 100, 0, &[7], Mtu::Classic, ts(3_600_000));
        assert_eq!(engine.process_pending(input, &mut recorder), 1);
        assert_eq!(engine.stats().pool_exhausted, 1);
        assert_eq!(recorder.transfers.last().unwrap().4, [7]);
    }
}
