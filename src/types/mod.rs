//! Core types for binary telemetry representation.
//!
//! This module provides the data structures shared by the specification
//! compiler, the decoder and the session tracker:
//!
//! - [`PrimitiveType`] is the fixed table of wire primitives with their widths
//! - [`Layout`] is a compiled, immutable field table for one structure or union
//! - [`Value`] and [`Record`] hold decoded data in declaration order
//! - [`decode`] turns a layout plus a byte buffer into a record
//!
//! ## Usage Example
//!
//! ```rust
//! use boxbox::types::{decode, FieldKind, FieldLayout, Layout, LayoutKind, PrimitiveType, Shape};
//!
//! let layout = Layout::new(
//!     "S",
//!     LayoutKind::Struct,
//!     vec![
//!         FieldLayout::new("a", "a", FieldKind::Primitive(PrimitiveType::UInt8), Shape::Scalar),
//!         FieldLayout::new("b", "b", FieldKind::Primitive(PrimitiveType::UInt16), Shape::Array(2)),
//!     ],
//! );
//! assert_eq!(layout.size, 5);
//!
//! let (record, consumed) = decode(&layout, &[0x01, 0x02, 0x00, 0x03, 0x00], 0).unwrap();
//! assert_eq!(consumed, 5);
//! assert_eq!(record.u64("a"), Some(1));
//! ```

mod decode;
mod layout;
mod primitive;
mod value;

pub use decode::decode;
pub use layout::{FieldKind, FieldLayout, Layout, LayoutKind, Shape};
pub use primitive::{NumericKind, PrimitiveType};
pub use value::{Record, Value};
