//! Cyphal/CAN actuator node stack
//!
//! The stack bridges Cyphal message subjects to actuator outputs: four servo setpoints,
//! a pump enable and a readiness level. Commands that stop arriving put the outputs into
//! a safe state.
//!
//! ## Architecture
//!
//! ```text
//!   interrupt context  │                       task context
//!                      │
//! ┌────────────┐       │   ┌──────────────┐   ┌─────────┐   ┌────────────┐   ┌────────┐
//! │ CAN RX     ├──► FrameSink ──► FrameSource ─┤ Engine  ├──►│ Codec      ├──►│ Super- │
//! │ (CanRx)    │   (spsc queue + signal)       │ reasm.  │   │ decode     │   │ visor  │
//! └────────────┘       │                       └─────────┘   └────────────┘   └───┬────┘
//!                      │                                                          │ apply
//! ┌────────────┐       │   ┌──────────────┐   ┌────────────┐                  ┌───▼────┐
//! │ CAN TX     │◄──────┼───┤ Outbound     │◄──┤ Codec      │◄── publish       │ Output │
//! │ (CanTx)    │       │   │ queue        │   │ encode     │    heartbeat     └────────┘
//! └────────────┘       │   └──────────────┘   └────────────┘
//! ```
//! Components:
//! * _Ingest_ ([`ingest`]) moves frames from the receive interrupt to the node task through a
//!   lock-free single-producer/single-consumer queue and wakes the task. It never blocks;
//!   overflow drops the newest frame and is counted.
//! * _Engine_ ([`engine`]) filters frames by subject, reassembles multi-frame transfers per
//!   (subject, source) session and hands completed transfers to a handler.
//! * _Codec_ ([`codec`]) translates payloads to messages, either with fixed-layout types or by
//!   interpreting DSDL definitions at run time.
//! * _Supervisor_ ([`supervisor`]) stores the command state and substitutes the safe state when
//!   commands go stale.
//! * _Outbound queue_ ([`outbound`]) segments published transfers into frames and sends them in
//!   priority order, dropping frames past their deadline.
//! * _Node_ ([`node`]) owns all of the above and runs the cycle.
//!
//! ## Concurrency model
//!
//! Only [`ingest::FrameSink`] runs in interrupt context. Everything else runs in a single task,
//! so the command state needs no lock. The task suspends in exactly one place: waiting for the
//! ingestion signal, bounded by the cycle period.
//!
//! All storage is fixed-capacity. Exhaustion of any pool is local and counted:
//! * ingestion queue: 16 frames,
//! * subscriptions: 8,
//! * reassembly sessions: 16 of 66 bytes,
//! * outbound queue: 64 frames.
//!
//! # References:
//!
//! * \[1\] Cyphal Specification v1.0
//!   <https://opencyphal.org/specification/Cyphal_Specification.pdf>
//! * \[2\] UDRAL service and physics types, `reg.udral` namespace
//!   <https://github.com/OpenCyphal/public_regulated_data_types>
#![no_std]

pub use actnode_core as core;
pub use actnode_driver::{can_id, controller, frame, time};

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod codec;
pub mod config;
pub mod data_types;
pub mod engine;
mod format;
pub mod ingest;
pub mod node;
pub mod outbound;
pub mod supervisor;
mod utils;
