//! CAN controller collaborator interface

use crate::frame::Frame;

/// Receive side of a CAN controller
///
/// Called from the receive interrupt handler. Implementations must not block:
/// `pop` returns `None` as soon as the hardware FIFO is empty.
pub trait CanRx {
    /// Fetches the next received frame, timestamped with its reception instant.
    fn pop(&mut self) -> Option<Frame>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MailboxFull;

/// Transmit side of a CAN controller
///
/// Called from the node task. The frame timestamp is the transmission deadline;
/// a driver that defers transmission should drop frames it cannot send in time.
pub trait CanTx {
    fn try_push(&mut self, frame: &Frame) -> Result<(), MailboxFull>;
}

impl<T: CanRx + ?Sized> CanRx for &mut T {
    fn pop(&mut self) -> Option<Frame> {
        (**self).pop()
    }
}

impl<T: CanTx + ?Sized> CanTx for &mut T {
    fn try_push(&mut self, frame: &Frame) -> Result<(), MailboxFull> {
        (**self).try_push(frame)
    }
}
