//! (De)serializable Rust representations of the message types the node exchanges
//!
//! The types follow the shape of `canadensis`-generated code so that a generated crate
//! can replace them without touching the codec.

mod bit;
mod node;
mod planar;
mod readiness;

pub use actnode_encoding::FixedSize;
pub use bit::Bit;
pub use node::{Health, Heartbeat, Mode};
pub use planar::{Planar, PlanarKinematics};
pub use readiness::Readiness;
