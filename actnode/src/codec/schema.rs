//! Run-time DSDL interpreter
//!
//! Type definitions are embedded as DSDL source and parsed the first time a type is used.
//! Parsed layouts stay cached in a fixed-capacity registry for the life of the codec.
//! Payloads are decoded into a [`Record`] of leaf values addressed by dotted field path,
//! and encoded from one.

mod bits;
mod definitions;
mod parser;
mod record;

pub use record::{FieldPath, MAX_LEAVES, Record, Value};

use core::cell::RefCell;

use half::f16;
use heapless::Vec;

use super::{Codec, CodecError, Message, MessageKind};
use crate::data_types::{Bit, Health, Heartbeat, Mode, Planar, PlanarKinematics, Readiness};
use bits::{BitReader, BitWriter};
use parser::{CastMode, Definition, FieldType, Primitive};

/// Maximum number of cached composite types
pub const MAX_TYPES: usize = 16;

const MAX_NESTING: usize = 8;
const DELIMITER_HEADER_BITS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchemaError {
    /// No embedded definition carries the requested name.
    UnknownType,
    Syntax,
    /// The definition uses arrays, unions or nests too deep.
    Unsupported,
    /// A fixed-capacity table (registry, fields, record) is full.
    CapacityExceeded,
    /// Encoding needs a field the record does not carry.
    MissingField,
    /// A record value does not fit the field type.
    TypeMismatch,
}

struct Layout {
    definition: Definition,
    /// Serialized length without delimiter header
    size_bits: usize,
}

impl Layout {
    fn is_delimited(&self) -> bool {
        self.definition.extent_bits.is_some()
    }
}

#[derive(Default)]
struct Registry {
    layouts: Vec<Layout, MAX_TYPES>,
}

impl Registry {
    fn find(&self, name: &str) -> Option<&Layout> {
        self.layouts.iter().find(|l| l.definition.name == name)
    }

    fn resolve(&mut self, name: &str) -> Result<&Layout, SchemaError> {
        let index = self.resolve_index(name, 0)?;
        Ok(&self.layouts[index])
    }

    fn resolve_index(&mut self, name: &str, depth: usize) -> Result<usize, SchemaError> {
        if let Some(index) = self.layouts.iter().position(|l| l.definition.name == name) {
            return Ok(index);
        }
        if depth >= MAX_NESTING {
            return Err(SchemaError::Unsupported);
        }

        let (name, source) = definitions::find(name).ok_or(SchemaError::UnknownType)?;
        let definition = parser::parse(name, source)?;

        let mut size_bits = 0;
        for field in &definition.fields {
            match field.ty {
                FieldType::Primitive(primitive, _) => size_bits += usize::from(primitive.bits()),
                FieldType::Void(bits) => size_bits += usize::from(bits),
                FieldType::Composite(nested) => {
                    let index = self.resolve_index(nested, depth + 1)?;
                    let nested = &self.layouts[index];
                    let header = if nested.is_delimited() {
                        DELIMITER_HEADER_BITS
                    } else {
                        0
                    };
                    size_bits = size_bits.next_multiple_of(8)
                        + header
                        + nested.size_bits.next_multiple_of(8);
                }
            }
        }
        if let Some(extent) = definition.extent_bits
            && extent < size_bits.next_multiple_of(8)
        {
            return Err(SchemaError::Syntax);
        }

        debug!("dsdl type resolved, {} bits", size_bits);
        self.layouts
            .push(Layout {
                definition,
                size_bits,
            })
            .map_err(|_| SchemaError::CapacityExceeded)?;
        Ok(self.layouts.len() - 1)
    }
}

/// Codec that interprets embedded DSDL definitions
pub struct SchemaCodec {
    registry: RefCell<Registry>,
}

impl SchemaCodec {
    pub fn new() -> Self {
        Self {
            registry: RefCell::new(Registry::default()),
        }
    }

    /// Parses a type and its dependencies ahead of first use.
    pub fn resolve(&self, type_name: &str) -> Result<(), SchemaError> {
        self.registry.borrow_mut().resolve(type_name).map(|_| ())
    }

    /// Number of composite types parsed so far
    pub fn cached_types(&self) -> usize {
        self.registry.borrow().layouts.len()
    }

    /// Serialized length of a type in bytes, delimiter headers of nested types included
    pub fn size_bytes(&self, type_name: &str) -> Result<usize, SchemaError> {
        let mut registry = self.registry.borrow_mut();
        Ok(registry.resolve(type_name)?.size_bits.div_ceil(8))
    }

    pub fn decode_record(&self, type_name: &str, bytes: &[u8]) -> Result<Record, CodecError> {
        let mut registry = self.registry.borrow_mut();
        registry.resolve(type_name)?;
        let registry = &*registry;
        let layout = registry.find(type_name).ok_or(SchemaError::UnknownType)?;

        let mut record = Record::new();
        let mut path = FieldPath::new();
        let mut reader = BitReader::new(bytes);
        read_composite(registry, layout, &mut reader, &mut path, &mut record)?;
        Ok(record)
    }

    pub fn encode_record(
        &self,
        type_name: &str,
        record: &Record,
        buffer: &mut [u8],
    ) -> Result<usize, CodecError> {
        let mut registry = self.registry.borrow_mut();
        registry.resolve(type_name)?;
        let registry = &*registry;
        let layout = registry.find(type_name).ok_or(SchemaError::UnknownType)?;

        let mut path = FieldPath::new();
        let mut writer = BitWriter::new(buffer);
        write_composite(registry, layout, &mut writer, &mut path, record)?;
        Ok(writer.length())
    }
}

impl Default for SchemaCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for SchemaCodec {
    fn decode(&self, kind: MessageKind, bytes: &[u8]) -> Result<Message, CodecError> {
        let record = self.decode_record(kind.type_name(), bytes)?;
        message_from_record(kind, &record)
    }

    fn encode(&self, message: &Message, buffer: &mut [u8]) -> Result<usize, CodecError> {
        let record = record_from_message(message)?;
        self.encode_record(message.kind().type_name(), &record, buffer)
    }
}

const PLANAR_POSITION: &str = "kinematics.angular_position.radian";
const PLANAR_VELOCITY: &str = "kinematics.angular_velocity.radian_per_second";
const PLANAR_ACCELERATION: &str = "kinematics.angular_acceleration.radian_per_second_per_second";
const PLANAR_TORQUE: &str = "torque.newton_meter";

fn message_from_record(kind: MessageKind, record: &Record) -> Result<Message, CodecError> {
    let message = match kind {
        MessageKind::Planar => Message::Planar(Planar {
            kinematics: PlanarKinematics {
                angular_position: record.field_f32(PLANAR_POSITION)?,
                angular_velocity: record.field_f32(PLANAR_VELOCITY)?,
                angular_acceleration: record.field_f32(PLANAR_ACCELERATION)?,
            },
            torque: record.field_f32(PLANAR_TORQUE)?,
        }),
        MessageKind::Readiness => {
            Message::Readiness(Readiness::new(record.field_u64("value")? as u8))
        }
        MessageKind::Bit => Message::Bit(Bit {
            value: record.field_bool("value")?,
        }),
        MessageKind::Heartbeat => Message::Heartbeat(Heartbeat {
            uptime: record.field_u64("uptime")? as u32,
            health: Health::from_u8_truncating(record.field_u64("health.value")? as u8),
            mode: Mode::try_from_u8(record.field_u64("mode.value")? as u8)
                .ok_or(CodecError::InvalidValue)?,
            vendor_specific_status_code: record.field_u64("vendor_specific_status_code")? as u8,
        }),
    };
    Ok(message)
}

fn record_from_message(message: &Message) -> Result<Record, SchemaError> {
    let mut record = Record::new();
    match message {
        Message::Planar(planar) => {
            let kinematics = &planar.kinematics;
            record.set(PLANAR_POSITION, Value::Float(kinematics.angular_position.into()))?;
            record.set(PLANAR_VELOCITY, Value::Float(kinematics.angular_velocity.into()))?;
            record.set(
                PLANAR_ACCELERATION,
                Value::Float(kinematics.angular_acceleration.into()),
            )?;
            record.set(PLANAR_TORQUE, Value::Float(planar.torque.into()))?;
        }
        Message::Readiness(readiness) => {
            record.set("value", Value::Unsigned(readiness.value.into()))?;
        }
        Message::Bit(bit) => {
            record.set("value", Value::Bool(bit.value))?;
        }
        Message::Heartbeat(heartbeat) => {
            record.set("uptime", Value::Unsigned(heartbeat.uptime.into()))?;
            record.set("health.value", Value::Unsigned(heartbeat.health.into_u8().into()))?;
            record.set("mode.value", Value::Unsigned(heartbeat.mode.into_u8().into()))?;
            record.set(
                "vendor_specific_status_code",
                Value::Unsigned(heartbeat.vendor_specific_status_code.into()),
            )?;
        }
    }
    Ok(record)
}

fn push_segment(path: &mut FieldPath, name: &str) -> Result<(), SchemaError> {
    if !path.is_empty() {
        path.push('.').map_err(|_| SchemaError::CapacityExceeded)?;
    }
    path.push_str(name)
        .map_err(|_| SchemaError::CapacityExceeded)
}

fn read_composite(
    registry: &Registry,
    layout: &Layout,
    reader: &mut BitReader<'_>,
    path: &mut FieldPath,
    record: &mut Record,
) -> Result<(), CodecError> {
    for field in &layout.definition.fields {
        let mark = path.len();
        match field.ty {
            FieldType::Primitive(primitive, _) => {
                push_segment(path, field.name)?;
                let value = read_primitive(primitive, reader)?;
                record.set(path.as_str(), value)?;
            }
            FieldType::Void(bits) => reader.skip(usize::from(bits))?,
            FieldType::Composite(name) => {
                push_segment(path, field.name)?;
                let nested = registry.find(name).ok_or(SchemaError::UnknownType)?;
                reader.align();
                if nested.is_delimited() {
                    let length = reader.read(DELIMITER_HEADER_BITS as u8)? as usize;
                    let mut window = reader.take_bytes(length)?;
                    read_composite(registry, nested, &mut window, path, record)?;
                } else {
                    read_composite(registry, nested, reader, path, record)?;
                    reader.align();
                }
            }
        }
        path.truncate(mark);
    }
    Ok(())
}

fn read_primitive(primitive: Primitive, reader: &mut BitReader<'_>) -> Result<Value, CodecError> {
    let raw = reader.read(primitive.bits())?;
    let value = match primitive {
        Primitive::Bool => Value::Bool(raw != 0),
        Primitive::Unsigned(_) => Value::Unsigned(raw),
        Primitive::Signed(bits) => {
            let shift = 64 - u32::from(bits);
            Value::Signed(((raw << shift) as i64) >> shift)
        }
        Primitive::Float(16) => Value::Float(f16::from_bits(raw as u16).to_f64()),
        Primitive::Float(32) => Value::Float(f32::from_bits(raw as u32).into()),
        Primitive::Float(_) => Value::Float(f64::from_bits(raw)),
    };
    Ok(value)
}

fn write_composite(
    registry: &Registry,
    layout: &Layout,
    writer: &mut BitWriter<'_>,
    path: &mut FieldPath,
    record: &Record,
) -> Result<(), CodecError> {
    for field in &layout.definition.fields {
        let mark = path.len();
        match field.ty {
            FieldType::Primitive(primitive, cast) => {
                push_segment(path, field.name)?;
                let value = record.get(path.as_str()).ok_or(SchemaError::MissingField)?;
                let bits = primitive.bits();
                writer.write(bits, cast_primitive(primitive, cast, value)?)?;
            }
            FieldType::Void(bits) => writer.skip(usize::from(bits))?,
            FieldType::Composite(name) => {
                push_segment(path, field.name)?;
                let nested = registry.find(name).ok_or(SchemaError::UnknownType)?;
                writer.align()?;
                if nested.is_delimited() {
                    let header = writer.position();
                    writer.write(DELIMITER_HEADER_BITS as u8, 0)?;
                    write_composite(registry, nested, writer, path, record)?;
                    writer.align()?;
                    let length = (writer.position() - header - DELIMITER_HEADER_BITS) / 8;
                    writer.patch_u32(header, length as u32);
                } else {
                    write_composite(registry, nested, writer, path, record)?;
                    writer.align()?;
                }
            }
        }
        path.truncate(mark);
    }
    Ok(())
}

/// Applies the cast mode of the field and returns the raw bits to serialize.
fn cast_primitive(primitive: Primitive, cast: CastMode, value: Value) -> Result<u64, SchemaError> {
    let raw = match primitive {
        Primitive::Bool => u64::from(value.as_bool().ok_or(SchemaError::TypeMismatch)?),
        Primitive::Unsigned(bits) => {
            let mask = mask(bits);
            match (value, cast) {
                (Value::Unsigned(v), CastMode::Saturated) => v.min(mask),
                (Value::Signed(v), CastMode::Saturated) => (v.max(0) as u64).min(mask),
                (Value::Unsigned(v), CastMode::Truncated) => v & mask,
                (Value::Signed(v), CastMode::Truncated) => v as u64 & mask,
                _ => return Err(SchemaError::TypeMismatch),
            }
        }
        Primitive::Signed(bits) => {
            let max = (mask(bits) >> 1) as i64;
            let min = -max - 1;
            let value = match value {
                Value::Signed(v) => v,
                Value::Unsigned(v) => match cast {
                    CastMode::Saturated => i64::try_from(v).unwrap_or(i64::MAX),
                    CastMode::Truncated => v as i64,
                },
                _ => return Err(SchemaError::TypeMismatch),
            };
            match cast {
                CastMode::Saturated => value.clamp(min, max) as u64 & mask(bits),
                CastMode::Truncated => value as u64 & mask(bits),
            }
        }
        Primitive::Float(bits) => {
            let Value::Float(value) = value else {
                return Err(SchemaError::TypeMismatch);
            };
            match (bits, cast) {
                (16, CastMode::Saturated) => {
                    let value = if value.is_finite() {
                        value.clamp(-65504.0, 65504.0)
                    } else {
                        value
                    };
                    f16::from_f64(value).to_bits().into()
                }
                (16, CastMode::Truncated) => f16::from_f64(value).to_bits().into(),
                (32, CastMode::Saturated) => {
                    let value = if value.is_finite() {
                        value.clamp(f32::MIN.into(), f32::MAX.into())
                    } else {
                        value
                    };
                    (value as f32).to_bits().into()
                }
                (32, CastMode::Truncated) => (value as f32).to_bits().into(),
                _ => value.to_bits(),
            }
        }
    };
    Ok(raw)
}

const fn mask(bits: u8) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1 << bits) - 1
    }
}
