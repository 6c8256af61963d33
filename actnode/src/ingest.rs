//! Interrupt-to-task frame handoff
//!
//! The receive interrupt owns a [`FrameSink`], the node task owns the matching
//! [`FrameSource`]. They share a lock-free single-producer/single-consumer queue and a
//! wake signal. The interrupt side never blocks and never retries: when the queue is full
//! the newest frame is dropped and counted.

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::with_timeout;
use heapless::spsc::{Consumer, Producer, Queue};

use crate::controller::CanRx;
use crate::frame::Frame;
use crate::time::Duration;

/// Default ingestion queue size; the queue holds one frame less than this.
pub const DEFAULT_QUEUE_SIZE: usize = 17;

struct Shared {
    wake: Signal<CriticalSectionRawMutex, ()>,
    dropped: AtomicU32,
}

/// Storage for the frame handoff
///
/// Place it in a `static` (e.g. with `static_cell`) so that both halves get a `'static`
/// lifetime. `N` follows `heapless::spsc::Queue`: at most `N - 1` frames are buffered.
pub struct FrameChannel<const N: usize = DEFAULT_QUEUE_SIZE> {
    queue: Queue<Frame, N>,
    shared: Shared,
}

impl<const N: usize> FrameChannel<N> {
    pub const fn new() -> Self {
        Self {
            queue: Queue::new(),
            shared: Shared {
                wake: Signal::new(),
                dropped: AtomicU32::new(0),
            },
        }
    }

    /// Number of frames the queue holds before dropping
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    pub fn split(&mut self) -> (FrameSink<'_, N>, FrameSource<'_, N>) {
        let (producer, consumer) = self.queue.split();
        let shared = &self.shared;
        (
            FrameSink { producer, shared },
            FrameSource { consumer, shared },
        )
    }
}

impl<const N: usize> Default for FrameChannel<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Interrupt half of the handoff
pub struct FrameSink<'a, const N: usize> {
    producer: Producer<'a, Frame, N>,
    shared: &'a Shared,
}

impl<const N: usize> FrameSink<'_, N> {
    /// Queues a single frame and wakes the task.
    ///
    /// Returns false if the frame was dropped.
    pub fn on_frame_received(&mut self, frame: Frame) -> bool {
        let queued = self.push(frame);
        self.shared.wake.signal(());
        queued
    }

    /// Drains the controller receive FIFO into the queue.
    ///
    /// Intended as the body of the receive interrupt handler. The task is woken once per
    /// call, and only if a frame was pulled. Returns the number of frames pulled,
    /// including dropped ones.
    pub fn on_interrupt<R: CanRx>(&mut self, rx: &mut R) -> usize {
        let mut pulled = 0;
        while let Some(frame) = rx.pop() {
            self.push(frame);
            pulled += 1;
        }
        if pulled > 0 {
            self.shared.wake.signal(());
        }
        pulled
    }

    fn push(&mut self, frame: Frame) -> bool {
        match self.producer.enqueue(frame) {
            Ok(()) => true,
            Err(_) => {
                // Single writer, so load/store is enough where RMW atomics are missing.
                let dropped = self.shared.dropped.load(Ordering::Relaxed);
                self.shared
                    .dropped
                    .store(dropped.wrapping_add(1), Ordering::Relaxed);
                false
            }
        }
    }
}

/// Task half of the handoff
pub struct FrameSource<'a, const N: usize> {
    consumer: Consumer<'a, Frame, N>,
    shared: &'a Shared,
}

impl<const N: usize> FrameSource<'_, N> {
    /// Yields queued frames in arrival order without waiting.
    pub fn drain(&mut self) -> impl Iterator<Item = Frame> + '_ {
        core::iter::from_fn(move || self.consumer.dequeue())
    }

    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames dropped on a full queue since the channel was created
    pub fn dropped_frames(&self) -> u32 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Waits for the interrupt side to signal new frames.
    pub async fn wait(&self) {
        self.shared.wake.wait().await
    }

    /// Waits for new frames for at most `max`.
    ///
    /// Returns false on timeout.
    pub async fn wait_timeout(&self, max: Duration) -> bool {
        with_timeout(max, self.shared.wake.wait()).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Instant;

    struct Fifo(heapless::Deque<Frame, 32>);

    impl CanRx for Fifo {
        fn pop(&mut self) -> Option<Frame> {
            self.0.pop_front()
        }
    }

    fn frame(tag: u8) -> Frame {
        Frame::new(0x107D_552A, &[tag], Instant::from_ticks(u64::from(tag))).unwrap()
    }

    #[test]
    fn test_no_drop_at_capacity() {
        let mut channel: FrameChannel<9> = FrameChannel::new();
        assert_eq!(channel.capacity(), 8);
        let (mut sink, mut source) = channel.split();

        for tag in 0..8 {
            assert!(sink.on_frame_received(frame(tag)));
        }
        assert_eq!(source.dropped_frames(), 0);

        let tags: heapless::Vec<u8, 8> = source.drain().map(|f| f.data[0]).collect();
        assert_eq!(tags, [0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_overflow_drops_newest() {
        let mut channel: FrameChannel<5> = FrameChannel::new();
        let (mut sink, mut source) = channel.split();

        let mut rx = Fifo(heapless::Deque::new());
        for tag in 0..7 {
            rx.0.push_back(frame(tag)).unwrap();
        }
        assert_eq!(sink.on_interrupt(&mut rx), 7);
        assert_eq!(source.dropped_frames(), 3);

        let tags: heapless::Vec<u8, 8> = source.drain().map(|f| f.data[0]).collect();
        assert_eq!(tags, [0, 1, 2, 3]);
        assert!(source.is_empty());
    }

    #[test]
    fn test_interrupt_without_frames_does_not_signal() {
        let mut channel: FrameChannel<5> = FrameChannel::new();
        let (mut sink, _source) = channel.split();
        let mut rx = Fifo(heapless::Deque::new());

        assert_eq!(sink.on_interrupt(&mut rx), 0);
        assert!(!channel_signaled(&sink));

        rx.0.push_back(frame(1)).unwrap();
        sink.on_interrupt(&mut rx);
        assert!(channel_signaled(&sink));
    }

    fn channel_signaled<const N: usize>(sink: &FrameSink<'_, N>) -> bool {
        sink.shared.wake.signaled()
    }
}
