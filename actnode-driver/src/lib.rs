//! Actuator node driver interface
//!
//! The crate describes what the node stack expects from a CAN controller driver.
//! Limited scope keeps driver crates compatible across stack versions.
//! Driver crates should depend on this crate. Firmware should depend on `actnode` instead.
//!
//! The controller is split into two halves:
//! * [`controller::CanRx`] is pulled from the receive interrupt, one frame at a time,
//!   until it runs dry;
//! * [`controller::CanTx`] is pushed from the node task and reports a full mailbox
//!   instead of blocking.
//!
//! Unlike async link designs, the stack never waits on the controller. Back-pressure on the
//! transmit side stops the outbound drain until the next cycle. Receive overflow is handled by
//! the ingestion queue of the stack, not by the driver.

#![no_std]

pub mod can_id;
pub mod controller;
pub mod frame;

pub mod time {
    pub use embassy_time::{Duration, Instant};
}
