//! Message codec
//!
//! Two interchangeable strategies translate between payload bytes and [`Message`] values:
//! * [`CompiledCodec`] uses the fixed-layout types of [`crate::data_types`].
//! * [`SchemaCodec`] interprets DSDL definitions embedded in the firmware at run time.
//!
//! Both reject payloads shorter than the message layout and apply the same cast rules, so the
//! node behaves identically whichever is selected.

mod compiled;
pub mod schema;

pub use compiled::CompiledCodec;
pub use schema::{Record, SchemaCodec, SchemaError, Value};

use crate::data_types::{Bit, FixedSize, Heartbeat, Planar, Readiness};

/// Message types known to the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageKind {
    Planar,
    Readiness,
    Bit,
    Heartbeat,
}

impl MessageKind {
    /// Full DSDL name with version
    pub const fn type_name(self) -> &'static str {
        match self {
            MessageKind::Planar => "reg.udral.physics.dynamics.rotation.Planar.0.1",
            MessageKind::Readiness => "reg.udral.service.common.Readiness.0.1",
            MessageKind::Bit => "uavcan.primitive.scalar.Bit.1.0",
            MessageKind::Heartbeat => "uavcan.node.Heartbeat.1.0",
        }
    }

    /// Serialized length of the message, in bytes
    pub const fn size_bytes(self) -> usize {
        match self {
            MessageKind::Planar => <Planar as FixedSize>::SIZE_BYTES,
            MessageKind::Readiness => <Readiness as FixedSize>::SIZE_BYTES,
            MessageKind::Bit => <Bit as FixedSize>::SIZE_BYTES,
            MessageKind::Heartbeat => <Heartbeat as FixedSize>::SIZE_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Message {
    Planar(Planar),
    Readiness(Readiness),
    Bit(Bit),
    Heartbeat(Heartbeat),
}

impl Message {
    pub const fn kind(&self) -> MessageKind {
        match self {
            Message::Planar(_) => MessageKind::Planar,
            Message::Readiness(_) => MessageKind::Readiness,
            Message::Bit(_) => MessageKind::Bit,
            Message::Heartbeat(_) => MessageKind::Heartbeat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// The payload ends before the last field of the message.
    Truncated,
    /// The output buffer cannot hold the serialized message.
    BufferTooSmall,
    /// A field carries a value the type does not define.
    InvalidValue,
    Schema(SchemaError),
}

impl From<SchemaError> for CodecError {
    fn from(value: SchemaError) -> Self {
        CodecError::Schema(value)
    }
}

pub trait Codec {
    /// Deserializes a payload of the given kind.
    ///
    /// Bytes past the message layout are ignored (implicit truncation).
    fn decode(&self, kind: MessageKind, bytes: &[u8]) -> Result<Message, CodecError>;

    /// Serializes a message into `buffer` and returns the payload length.
    fn encode(&self, message: &Message, buffer: &mut [u8]) -> Result<usize, CodecError>;
}

impl<C: Codec + ?Sized> Codec for &C {
    fn decode(&self, kind: MessageKind, bytes: &[u8]) -> Result<Message, CodecError> {
        (**self).decode(kind, bytes)
    }

    fn encode(&self, message: &Message, buffer: &mut [u8]) -> Result<usize, CodecError> {
        (**self).encode(message, buffer)
    }
}

/// Codec strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecKind {
    #[default]
    Compiled,
    Schema,
}

/// The codec strategy chosen at startup
pub enum SelectedCodec {
    Compiled(CompiledCodec),
    Schema(SchemaCodec),
}

impl SelectedCodec {
    pub fn new(kind: CodecKind) -> Self {
        match kind {
            CodecKind::Compiled => SelectedCodec::Compiled(CompiledCodec),
            CodecKind::Schema => SelectedCodec::Schema(SchemaCodec::new()),
        }
    }

    pub fn kind(&self) -> CodecKind {
        match self {
            SelectedCodec::Compiled(_) => CodecKind::Compiled,
            SelectedCodec::Schema(_) => CodecKind::Schema,
        }
    }
}

impl Codec for SelectedCodec {
    fn decode(&self, kind: MessageKind, bytes: &[u8]) -> Result<Message, CodecError> {
        match self {
            SelectedCodec::Compiled(codec) => codec.decode(kind, bytes),
            SelectedCodec::Schema(codec) => codec.decode(kind, bytes),
        }
    }

    fn encode(&self, message: &Message, buffer: &mut [u8]) -> Result<usize, CodecError> {
        match self {
            SelectedCodec::Compiled(codec) => codec.encode(message, buffer),
            SelectedCodec::Schema(codec) => codec.encode(message, buffer),
        }
    }
}
