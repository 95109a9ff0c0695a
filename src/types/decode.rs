//! Layout-driven decoding of raw bytes into records

use super::{FieldKind, FieldLayout, Layout, LayoutKind, Record, Value};
use crate::{Result, TelemetryError};

/// Decode `layout` from `data` starting at `base`.
///
/// Returns the decoded record and the number of bytes consumed. Struct fields
/// are read back to back; union members are each read from `base` and the
/// union consumes as many bytes as its widest member.
pub fn decode(layout: &Layout, data: &[u8], base: usize) -> Result<(Record, usize)> {
    let mut record = Record::with_capacity(layout.fields.len());
    let mut cursor = base;
    let mut widest = 0;

    for field in &layout.fields {
        let start = match layout.kind {
            LayoutKind::Struct => cursor,
            LayoutKind::Union => base,
        };
        debug_assert_eq!(start - base, field.offset, "{}.{}", layout.name, field.name);

        let (value, consumed) = decode_field(field, data, start)?;
        record.push(field.name.clone(), value);

        match layout.kind {
            LayoutKind::Struct => cursor += consumed,
            LayoutKind::Union => widest = widest.max(consumed),
        }
    }

    let consumed = match layout.kind {
        LayoutKind::Struct => cursor - base,
        LayoutKind::Union => widest,
    };

    Ok((record, consumed))
}

fn decode_field(field: &FieldLayout, data: &[u8], start: usize) -> Result<(Value, usize)> {
    match field.shape {
        super::Shape::Scalar => decode_element(&field.kind, data, start),
        super::Shape::Array(len) => {
            let mut items = Vec::with_capacity(len);
            let mut offset = start;
            for _ in 0..len {
                let (item, consumed) = decode_element(&field.kind, data, offset)?;
                items.push(item);
                offset += consumed;
            }
            Ok((Value::Array(items), offset - start))
        }
    }
}

fn decode_element(kind: &FieldKind, data: &[u8], offset: usize) -> Result<(Value, usize)> {
    match kind {
        FieldKind::Primitive(ty) => {
            let value = data.get(offset..).and_then(|bytes| Value::read(*ty, bytes)).ok_or(
                TelemetryError::Truncated { needed: offset + ty.size(), available: data.len() },
            )?;
            Ok((value, ty.size()))
        }
        FieldKind::Nested(layout) => {
            let (record, consumed) = decode(layout, data, offset)?;
            Ok((Value::Record(record), consumed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PrimitiveType, Shape};
    use std::sync::Arc;

    fn scalar(name: &str, ty: PrimitiveType) -> FieldLayout {
        FieldLayout::new(name, name, FieldKind::Primitive(ty), Shape::Scalar)
    }

    #[test]
    fn decodes_scalars_and_arrays_little_endian() {
        let layout = Layout::new(
            "S",
            LayoutKind::Struct,
            vec![
                scalar("a", PrimitiveType::UInt8),
                FieldLayout::new(
                    "b",
                    "b",
                    FieldKind::Primitive(PrimitiveType::UInt16),
                    Shape::Array(2),
                ),
            ],
        );
        assert_eq!(layout.size, 5);

        let (record, consumed) = decode(&layout, &[0x01, 0x02, 0x00, 0x03, 0x00], 0).unwrap();
        assert_eq!(consumed, 5);
        assert_eq!(record.get("a"), Some(&Value::UInt8(1)));
        assert_eq!(
            record.get("b"),
            Some(&Value::Array(vec![Value::UInt16(2), Value::UInt16(3)]))
        );
    }

    #[test]
    fn decodes_signed_and_float_values() {
        let layout = Layout::new(
            "Mixed",
            LayoutKind::Struct,
            vec![
                scalar("gear", PrimitiveType::Int8),
                scalar("steer", PrimitiveType::Float32),
                scalar("uid", PrimitiveType::UInt64),
            ],
        );
        let mut data = vec![0xFF];
        data.extend_from_slice(&(-0.5f32).to_le_bytes());
        data.extend_from_slice(&0x0102_0304_0506_0708u64.to_le_bytes());

        let (record, consumed) = decode(&layout, &data, 0).unwrap();
        assert_eq!(consumed, 13);
        assert_eq!(record.i64("gear"), Some(-1));
        assert_eq!(record.f64("steer"), Some(-0.5));
        assert_eq!(record.u64("uid"), Some(0x0102_0304_0506_0708));
    }

    #[test]
    fn nested_records_consume_their_children() {
        let inner = Arc::new(Layout::new(
            "Inner",
            LayoutKind::Struct,
            vec![scalar("x", PrimitiveType::UInt16), scalar("y", PrimitiveType::UInt8)],
        ));
        let outer = Layout::new(
            "Outer",
            LayoutKind::Struct,
            vec![
                FieldLayout::new("cars", "cars", FieldKind::Nested(inner), Shape::Array(2)),
                scalar("tail", PrimitiveType::UInt8),
            ],
        );
        assert_eq!(outer.size, 7);

        let data = [0x10, 0x00, 0x01, 0x20, 0x00, 0x02, 0x09];
        let (record, consumed) = decode(&outer, &data, 0).unwrap();
        assert_eq!(consumed, 7);

        let cars = record.array("cars").unwrap();
        assert_eq!(cars.len(), 2);
        assert_eq!(cars[1].as_record().unwrap().u64("x"), Some(0x20));
        assert_eq!(record.u64("tail"), Some(9));
    }

    #[test]
    fn union_members_share_the_base_offset() {
        let layout = Layout::new(
            "U",
            LayoutKind::Union,
            vec![scalar("word", PrimitiveType::UInt32), scalar("byte", PrimitiveType::UInt8)],
        );
        assert_eq!(layout.size, 4);

        let (record, consumed) = decode(&layout, &[0xAA, 0x00, 0x00, 0x01], 0).unwrap();
        assert_eq!(consumed, 4);
        assert_eq!(record.u64("word"), Some(0x0100_00AA));
        assert_eq!(record.u64("byte"), Some(0xAA));
    }

    #[test]
    fn decoding_honors_the_base_offset() {
        let layout = Layout::new("S", LayoutKind::Struct, vec![scalar("v", PrimitiveType::UInt16)]);
        let (record, consumed) = decode(&layout, &[0xFF, 0xFF, 0x34, 0x12], 2).unwrap();
        assert_eq!(consumed, 2);
        assert_eq!(record.u64("v"), Some(0x1234));
    }

    #[test]
    fn short_buffers_are_truncation_errors() {
        let layout = Layout::new("S", LayoutKind::Struct, vec![scalar("v", PrimitiveType::UInt32)]);
        let err = decode(&layout, &[0x01, 0x02], 0).unwrap_err();
        assert!(matches!(err, TelemetryError::Truncated { needed: 4, available: 2 }));
    }
}
