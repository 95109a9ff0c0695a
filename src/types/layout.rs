//! Compiled binary layout descriptors

use std::collections::HashSet;
use std::sync::Arc;

use super::PrimitiveType;
use crate::{Result, TelemetryError};

/// Whether a layout lays its fields out one after another or on top of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    Struct,
    Union,
}

/// What a single element of a field is made of.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Primitive(PrimitiveType),
    Nested(Arc<Layout>),
}

impl FieldKind {
    /// Width in bytes of one element.
    pub fn width(&self) -> usize {
        match self {
            FieldKind::Primitive(ty) => ty.size(),
            FieldKind::Nested(layout) => layout.size,
        }
    }
}

/// Scalar or fixed-length array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    Array(usize),
}

/// One entry in a layout's field table.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    /// Normalized field name (e.g. `sector1_time_in_ms`)
    pub name: String,
    /// Name as declared in the specification (e.g. `m_sector1TimeInMS`)
    pub wire_name: String,
    pub kind: FieldKind,
    pub shape: Shape,
    /// Byte offset from the start of the enclosing layout
    pub offset: usize,
}

impl FieldLayout {
    pub fn new(
        name: impl Into<String>,
        wire_name: impl Into<String>,
        kind: FieldKind,
        shape: Shape,
    ) -> Self {
        Self { name: name.into(), wire_name: wire_name.into(), kind, shape, offset: 0 }
    }

    /// Width of a single element in bytes.
    pub fn element_width(&self) -> usize {
        self.kind.width()
    }

    /// Array length, or 1 for scalars.
    pub fn count(&self) -> usize {
        match self.shape {
            Shape::Scalar => 1,
            Shape::Array(len) => len,
        }
    }

    /// Total width of the field in bytes.
    pub fn width(&self) -> usize {
        self.element_width() * self.count()
    }

    pub fn nested(&self) -> Option<&Arc<Layout>> {
        match &self.kind {
            FieldKind::Nested(layout) => Some(layout),
            FieldKind::Primitive(_) => None,
        }
    }
}

/// Immutable description of how a named structure or union sits on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub name: String,
    pub kind: LayoutKind,
    /// Fields in declaration order
    pub fields: Vec<FieldLayout>,
    /// Total size in bytes
    pub size: usize,
}

impl Layout {
    /// Build a layout, assigning field offsets and computing the total size.
    ///
    /// Struct fields are packed back to back with no padding; union members
    /// all start at offset zero and the union is as wide as its widest member.
    pub fn new(name: impl Into<String>, kind: LayoutKind, mut fields: Vec<FieldLayout>) -> Self {
        let mut size = 0;
        for field in &mut fields {
            match kind {
                LayoutKind::Struct => {
                    field.offset = size;
                    size += field.width();
                }
                LayoutKind::Union => {
                    field.offset = 0;
                    size = size.max(field.width());
                }
            }
        }

        Self { name: name.into(), kind, fields, size }
    }

    /// Validate the layout for consistency.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.fields.len());
        for field in &self.fields {
            if field.count() == 0 {
                return Err(TelemetryError::invalid_layout(
                    &self.name,
                    format!("{} is an empty array", field.wire_name),
                ));
            }

            if !seen.insert(field.name.as_str()) {
                return Err(TelemetryError::invalid_layout(
                    &self.name,
                    format!("'{}' is declared more than once", field.name),
                ));
            }

            if field.offset + field.width() > self.size {
                return Err(TelemetryError::size_mismatch(
                    self.name.clone(),
                    self.size,
                    field.offset + field.width(),
                ));
            }
        }

        Ok(())
    }

    /// Get a field by its normalized name.
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Get the number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}
