use heapless::{String, Vec};

use super::SchemaError;

/// Maximum number of leaf fields in a record
pub const MAX_LEAVES: usize = 16;

/// Dotted path of a leaf field, e.g. `kinematics.angular_position.radian`
pub type FieldPath = String<64>;

/// Value of a primitive field
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Value {
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl Value {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_u64(self) -> Option<u64> {
        match self {
            Value::Unsigned(value) => Some(value),
            Value::Signed(value) => u64::try_from(value).ok(),
            _ => None,
        }
    }

    pub fn as_f32(self) -> Option<f32> {
        match self {
            Value::Float(value) => Some(value as f32),
            _ => None,
        }
    }
}

/// Leaf values of a composite, in serialization order
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Record {
    leaves: Vec<(FieldPath, Value), MAX_LEAVES>,
}

impl Record {
    pub const fn new() -> Self {
        Self { leaves: Vec::new() }
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.leaves
            .iter()
            .find(|(key, _)| key.as_str() == path)
            .map(|(_, value)| *value)
    }

    /// Inserts or replaces a leaf value.
    pub fn set(&mut self, path: &str, value: Value) -> Result<(), SchemaError> {
        if let Some((_, slot)) = self.leaves.iter_mut().find(|(key, _)| key.as_str() == path) {
            *slot = value;
            return Ok(());
        }
        let key = FieldPath::try_from(path).map_err(|_| SchemaError::CapacityExceeded)?;
        self.leaves
            .push((key, value))
            .map_err(|_| SchemaError::CapacityExceeded)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Value)> {
        self.leaves.iter().map(|(key, value)| (key.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub(super) fn field_f32(&self, path: &str) -> Result<f32, SchemaError> {
        self.get(path)
            .ok_or(SchemaError::MissingField)?
            .as_f32()
            .ok_or(SchemaError::TypeMismatch)
    }

    pub(super) fn field_u64(&self, path: &str) -> Result<u64, SchemaError> {
        self.get(path)
            .ok_or(SchemaError::MissingField)?
            .as_u64()
            .ok_or(SchemaError::TypeMismatch)
    }

    pub(super) fn field_bool(&self, path: &str) -> Result<bool, SchemaError> {
        self.get(path)
            .ok_or(SchemaError::MissingField)?
            .as_bool()
            .ok_or(SchemaError::TypeMismatch)
    }
}
