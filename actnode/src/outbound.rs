//! Outbound queue and transmission scheduler
//!
//! Transfers are segmented into frames at enqueue time. Frames wait in a priority FIFO
//! and are handed to the controller mailbox by [`OutboundQueue::drain`], most urgent
//! priority first and in insertion order within a priority. Every frame carries the
//! deadline of its transfer; a frame past its deadline is dropped instead of sent.

mod segment;

pub use segment::{Segments, frame_count};

use crate::controller::CanTx;
use crate::core::{NodeId, Priority, SubjectId, TransferId};
use crate::frame::{Frame, Mtu};
use crate::time::Instant;
use crate::utils::PriorityFifo;
use crate::can_id::Header;

/// Default number of frames the queue holds
pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EnqueueError {
    /// Not enough free slots for every frame of the transfer; nothing was queued.
    QueueFull,
}

/// Outcome of one [`OutboundQueue::drain`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DrainReport {
    pub sent: usize,
    pub expired: usize,
    /// The mailbox refused a frame; the rest waits for the next cycle.
    pub blocked: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutboundStats {
    pub sent: u32,
    pub expired: u32,
    pub rejected: u32,
}

pub struct OutboundQueue<const N: usize = DEFAULT_CAPACITY> {
    source: NodeId,
    mtu: Mtu,
    frames: PriorityFifo<Frame, N>,
    stats: OutboundStats,
}

impl<const N: usize> OutboundQueue<N> {
    pub fn new(source: NodeId, mtu: Mtu) -> Self {
        Self {
            source,
            mtu,
            frames: PriorityFifo::new(),
            stats: OutboundStats::default(),
        }
    }

    pub fn mtu(&self) -> Mtu {
        self.mtu
    }

    /// Number of queued frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn stats(&self) -> OutboundStats {
        self.stats
    }

    /// Segments a message transfer and queues its frames.
    ///
    /// Returns the number of frames queued. The transfer is rejected as a whole when the
    /// queue cannot take all of its frames.
    pub fn enqueue(
        &mut self,
        subject: SubjectId,
        transfer_id: TransferId,
        priority: Priority,
        payload: &[u8],
        deadline: Instant,
    ) -> Result<usize, EnqueueError> {
        let count = frame_count(payload.len(), self.mtu);
        if count > self.frames.vacant() {
            self.stats.rejected = self.stats.rejected.wrapping_add(1);
            debug!(
                "outbound queue full, subject {} needs {} frames",
                subject.into_u16(),
                count
            );
            return Err(EnqueueError::QueueFull);
        }

        let id = Header::message_id(priority, subject, self.source);
        for data in Segments::new(payload, transfer_id, self.mtu) {
            let frame = Frame {
                id,
                data,
                timestamp: deadline,
            };
            // Capacity was checked above for the whole transfer.
            unwrap!(self.frames.push(priority, frame));
        }
        Ok(count)
    }

    /// Hands queued frames to the controller until the queue is empty or the mailbox is full.
    ///
    /// Frames whose deadline is before `now` are discarded without transmission.
    pub fn drain<T: CanTx>(&mut self, now: Instant, tx: &mut T) -> DrainReport {
        let mut report = DrainReport::default();
        while let Some(priority) = self.frames.priorities().first() {
            let Some(frame) = self.frames.front(priority) else {
                break;
            };
            if frame.timestamp < now {
                self.frames.pop(priority);
                report.expired += 1;
                continue;
            }
            match tx.try_push(frame) {
                Ok(()) => {
                    self.frames.pop(priority);
                    report.sent += 1;
                }
                Err(_) => {
                    report.blocked = true;
                    break;
                }
            }
        }

        if report.expired > 0 {
            debug!("dropped {} expired outbound frames", report.expired);
        }
        self.stats.sent = self.stats.sent.wrapping_add(report.sent as u32);
        self.stats.expired = self.stats.expired.wrapping_add(report.expired as u32);
        report
    }
}
