use super::{Codec, CodecError, Message, MessageKind};
use crate::data_types::{Bit, Heartbeat, Planar, Readiness};
use actnode_encoding::{self as enc, EncodingError};

/// Codec backed by the fixed-layout types of [`crate::data_types`]
#[derive(Debug, Clone, Copy, Default)]
pub struct CompiledCodec;

impl Codec for CompiledCodec {
    fn decode(&self, kind: MessageKind, bytes: &[u8]) -> Result<Message, CodecError> {
        let message = match kind {
            MessageKind::Planar => Message::Planar(enc::deserialize_prefix::<Planar>(bytes)?),
            MessageKind::Readiness => {
                Message::Readiness(enc::deserialize_prefix::<Readiness>(bytes)?)
            }
            MessageKind::Bit => Message::Bit(enc::deserialize_prefix::<Bit>(bytes)?),
            MessageKind::Heartbeat => {
                Message::Heartbeat(enc::deserialize_prefix::<Heartbeat>(bytes)?)
            }
        };
        Ok(message)
    }

    fn encode(&self, message: &Message, buffer: &mut [u8]) -> Result<usize, CodecError> {
        let length = match message {
            Message::Planar(payload) => enc::serialize_into(payload, buffer)?,
            Message::Readiness(payload) => enc::serialize_into(payload, buffer)?,
            Message::Bit(payload) => enc::serialize_into(payload, buffer)?,
            Message::Heartbeat(payload) => enc::serialize_into(payload, buffer)?,
        };
        Ok(length)
    }
}

impl From<EncodingError> for CodecError {
    fn from(value: EncodingError) -> Self {
        match value {
            EncodingError::Truncated => CodecError::Truncated,
            EncodingError::BufferTooSmall => CodecError::BufferTooSmall,
            EncodingError::InvalidValue => CodecError::InvalidValue,
        }
    }
}
