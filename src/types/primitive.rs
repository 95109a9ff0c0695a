//! Primitive wire type definitions

use serde::{Deserialize, Serialize};

/// Numeric interpretation of a primitive's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumericKind {
    Unsigned,
    Signed,
    Float,
}

/// Primitive types a wire-format specification may name.
/// All primitives are little-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    /// `uint8`
    UInt8,
    /// `int8`
    Int8,
    /// `uint16`
    UInt16,
    /// `int16`
    Int16,
    /// `uint32`
    UInt32,
    /// `int32`
    Int32,
    /// `uint64`
    UInt64,
    /// `int64`
    Int64,
    /// `float` (IEEE 754 single precision)
    Float32,
    /// `double` (IEEE 754 double precision)
    Float64,
}

impl PrimitiveType {
    /// Every primitive, in table order.
    pub const ALL: [PrimitiveType; 10] = [
        PrimitiveType::UInt8,
        PrimitiveType::Int8,
        PrimitiveType::UInt16,
        PrimitiveType::Int16,
        PrimitiveType::UInt32,
        PrimitiveType::Int32,
        PrimitiveType::UInt64,
        PrimitiveType::Int64,
        PrimitiveType::Float32,
        PrimitiveType::Float64,
    ];

    /// Resolve a specification type name through the fixed primitive table.
    pub fn from_spec_name(name: &str) -> Option<Self> {
        match name {
            "uint8" => Some(PrimitiveType::UInt8),
            "int8" => Some(PrimitiveType::Int8),
            "uint16" => Some(PrimitiveType::UInt16),
            "int16" => Some(PrimitiveType::Int16),
            "uint32" => Some(PrimitiveType::UInt32),
            "int32" => Some(PrimitiveType::Int32),
            "uint64" => Some(PrimitiveType::UInt64),
            "int64" => Some(PrimitiveType::Int64),
            "float" => Some(PrimitiveType::Float32),
            "double" => Some(PrimitiveType::Float64),
            _ => None,
        }
    }

    /// The name this primitive is spelled with in specification text.
    pub const fn spec_name(&self) -> &'static str {
        match self {
            PrimitiveType::UInt8 => "uint8",
            PrimitiveType::Int8 => "int8",
            PrimitiveType::UInt16 => "uint16",
            PrimitiveType::Int16 => "int16",
            PrimitiveType::UInt32 => "uint32",
            PrimitiveType::Int32 => "int32",
            PrimitiveType::UInt64 => "uint64",
            PrimitiveType::Int64 => "int64",
            PrimitiveType::Float32 => "float",
            PrimitiveType::Float64 => "double",
        }
    }

    /// Returns the size in bytes of this data type.
    pub const fn size(&self) -> usize {
        match self {
            PrimitiveType::UInt8 | PrimitiveType::Int8 => 1,
            PrimitiveType::UInt16 | PrimitiveType::Int16 => 2,
            PrimitiveType::UInt32 | PrimitiveType::Int32 | PrimitiveType::Float32 => 4,
            PrimitiveType::UInt64 | PrimitiveType::Int64 | PrimitiveType::Float64 => 8,
        }
    }

    pub const fn kind(&self) -> NumericKind {
        match self {
            PrimitiveType::UInt8
            | PrimitiveType::UInt16
            | PrimitiveType::UInt32
            | PrimitiveType::UInt64 => NumericKind::Unsigned,
            PrimitiveType::Int8
            | PrimitiveType::Int16
            | PrimitiveType::Int32
            | PrimitiveType::Int64 => NumericKind::Signed,
            PrimitiveType::Float32 | PrimitiveType::Float64 => NumericKind::Float,
        }
    }
}
