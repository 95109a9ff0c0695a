//! Decoded values and ordered records

use serde::Serialize;

use super::PrimitiveType;

/// Runtime value produced by the decoder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    UInt8(u8),
    Int8(i8),
    UInt16(u16),
    Int16(i16),
    UInt32(u32),
    Int32(i32),
    UInt64(u64),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Array(Vec<Value>),
    Record(Record),
}

impl Value {
    /// Read one little-endian primitive from the start of `bytes`.
    ///
    /// Returns `None` when fewer than `ty.size()` bytes are available.
    pub fn read(ty: PrimitiveType, bytes: &[u8]) -> Option<Value> {
        let value = match ty {
            PrimitiveType::UInt8 => Value::UInt8(*bytes.first()?),
            PrimitiveType::Int8 => Value::Int8(*bytes.first()? as i8),
            PrimitiveType::UInt16 => Value::UInt16(u16::from_le_bytes(take(bytes)?)),
            PrimitiveType::Int16 => Value::Int16(i16::from_le_bytes(take(bytes)?)),
            PrimitiveType::UInt32 => Value::UInt32(u32::from_le_bytes(take(bytes)?)),
            PrimitiveType::Int32 => Value::Int32(i32::from_le_bytes(take(bytes)?)),
            PrimitiveType::UInt64 => Value::UInt64(u64::from_le_bytes(take(bytes)?)),
            PrimitiveType::Int64 => Value::Int64(i64::from_le_bytes(take(bytes)?)),
            PrimitiveType::Float32 => Value::Float32(f32::from_le_bytes(take(bytes)?)),
            PrimitiveType::Float64 => Value::Float64(f64::from_le_bytes(take(bytes)?)),
        };
        Some(value)
    }

    /// Whether this is a single number rather than an array or record.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Array(_) | Value::Record(_))
    }

    /// Integer view of an unsigned or non-negative signed scalar.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::UInt8(v) => Some(v.into()),
            Value::UInt16(v) => Some(v.into()),
            Value::UInt32(v) => Some(v.into()),
            Value::UInt64(v) => Some(v),
            Value::Int8(v) => u64::try_from(v).ok(),
            Value::Int16(v) => u64::try_from(v).ok(),
            Value::Int32(v) => u64::try_from(v).ok(),
            Value::Int64(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Signed integer view of an integer scalar.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int8(v) => Some(v.into()),
            Value::Int16(v) => Some(v.into()),
            Value::Int32(v) => Some(v.into()),
            Value::Int64(v) => Some(v),
            Value::UInt8(v) => Some(v.into()),
            Value::UInt16(v) => Some(v.into()),
            Value::UInt32(v) => Some(v.into()),
            Value::UInt64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Floating point view of any numeric scalar.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float32(v) => Some(v.into()),
            Value::Float64(v) => Some(v),
            Value::Array(_) | Value::Record(_) => None,
            _ => self.as_i64().map(|v| v as f64).or_else(|| self.as_u64().map(|v| v as f64)),
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }
}

fn take<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
    bytes.get(..N)?.try_into().ok()
}

/// Ordered mapping from field name to decoded value.
///
/// Field order is declaration order in the specification, which is also the
/// on-wire order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { fields: Vec::with_capacity(capacity) }
    }

    /// Append a field without checking for an existing one of the same name.
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.fields.push((name.into(), value));
    }

    /// Append a field, replacing the value in place if the name already exists.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(existing, _)| existing == name).map(|(_, value)| value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let index = self.fields.iter().position(|(existing, _)| existing == name)?;
        Some(self.fields.remove(index).1)
    }

    /// Merge `other` into this record; fields in `other` win on name collisions.
    pub fn merge(&mut self, other: Record) {
        for (name, value) in other.fields {
            self.insert(name, value);
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Convenience typed helpers
    pub fn u64(&self, name: &str) -> Option<u64> {
        self.get(name)?.as_u64()
    }
    pub fn i64(&self, name: &str) -> Option<i64> {
        self.get(name)?.as_i64()
    }
    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_f64()
    }
    pub fn array(&self, name: &str) -> Option<&[Value]> {
        self.get(name)?.as_array()
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}
