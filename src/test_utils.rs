//! Test utilities for building layouts, records and F1 datagrams
//!
//! Shared by unit tests, integration tests and the decode benchmark. The
//! [`F1Datagrams`] builder produces byte-exact F1 2021 packets from the
//! bundled specification, so tests never depend on captured fixtures.

#![cfg(any(test, feature = "benchmark"))]

use std::sync::Arc;

use proptest::prelude::*;

use crate::packet::{DISPATCH_TABLE, HEADER_LAYOUT, PacketKind};
use crate::schema::LayoutRegistry;
use crate::types::{FieldKind, FieldLayout, Layout, LayoutKind, PrimitiveType, Record, Shape, Value};
use crate::{Result, TelemetryError};

/// Strategy producing a record that matches `layout` field for field.
///
/// Floats are finite so decoded records compare equal to the originals.
/// Union members overlap on the wire, so only struct layouts survive a
/// pack-then-decode cycle unchanged.
pub fn arbitrary_value(layout: &Layout) -> BoxedStrategy<Record> {
    let names: Vec<String> = layout.fields.iter().map(|f| f.name.clone()).collect();
    let values: Vec<BoxedStrategy<Value>> = layout.fields.iter().map(arbitrary_field).collect();
    values
        .prop_map(move |values| names.iter().cloned().zip(values).collect::<Record>())
        .boxed()
}

fn arbitrary_field(field: &FieldLayout) -> BoxedStrategy<Value> {
    let element = arbitrary_element(&field.kind);
    match field.shape {
        Shape::Scalar => element,
        Shape::Array(len) => prop::collection::vec(element, len).prop_map(Value::Array).boxed(),
    }
}

fn arbitrary_element(kind: &FieldKind) -> BoxedStrategy<Value> {
    match kind {
        FieldKind::Nested(layout) => arbitrary_value(layout).prop_map(Value::Record).boxed(),
        FieldKind::Primitive(ty) => match ty {
            PrimitiveType::UInt8 => any::<u8>().prop_map(Value::UInt8).boxed(),
            PrimitiveType::Int8 => any::<i8>().prop_map(Value::Int8).boxed(),
            PrimitiveType::UInt16 => any::<u16>().prop_map(Value::UInt16).boxed(),
            PrimitiveType::Int16 => any::<i16>().prop_map(Value::Int16).boxed(),
            PrimitiveType::UInt32 => any::<u32>().prop_map(Value::UInt32).boxed(),
            PrimitiveType::Int32 => any::<i32>().prop_map(Value::Int32).boxed(),
            PrimitiveType::UInt64 => any::<u64>().prop_map(Value::UInt64).boxed(),
            PrimitiveType::Int64 => any::<i64>().prop_map(Value::Int64).boxed(),
            PrimitiveType::Float32 => (-1.0e6f32..1.0e6f32).prop_map(Value::Float32).boxed(),
            PrimitiveType::Float64 => (-1.0e12f64..1.0e12f64).prop_map(Value::Float64).boxed(),
        },
    }
}

/// Encode `record` with `layout`, the inverse of [`decode`](crate::types::decode).
pub fn pack(layout: &Layout, record: &Record) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; layout.size];
    pack_into(layout, record, &mut buf, 0)?;
    Ok(buf)
}

fn pack_into(layout: &Layout, record: &Record, buf: &mut [u8], base: usize) -> Result<()> {
    let mut cursor = base;
    for field in &layout.fields {
        let start = match layout.kind {
            LayoutKind::Struct => cursor,
            LayoutKind::Union => base,
        };
        let value = record
            .get(&field.name)
            .ok_or_else(|| TelemetryError::field_not_found(&field.name, &layout.name))?;

        match (field.shape, value) {
            (Shape::Scalar, value) => pack_element(field, value, buf, start)?,
            (Shape::Array(len), Value::Array(items)) if items.len() == len => {
                for (i, item) in items.iter().enumerate() {
                    pack_element(field, item, buf, start + i * field.element_width())?;
                }
            }
            _ => return Err(TelemetryError::field_not_found(&field.name, &layout.name)),
        }
        cursor += field.width();
    }
    Ok(())
}

fn pack_element(field: &FieldLayout, value: &Value, buf: &mut [u8], at: usize) -> Result<()> {
    let bytes: Vec<u8> = match (&field.kind, value) {
        (FieldKind::Nested(layout), Value::Record(record)) => return pack_into(layout, record, buf, at),
        (FieldKind::Primitive(PrimitiveType::UInt8), Value::UInt8(v)) => v.to_le_bytes().to_vec(),
        (FieldKind::Primitive(PrimitiveType::Int8), Value::Int8(v)) => v.to_le_bytes().to_vec(),
        (FieldKind::Primitive(PrimitiveType::UInt16), Value::UInt16(v)) => v.to_le_bytes().to_vec(),
        (FieldKind::Primitive(PrimitiveType::Int16), Value::Int16(v)) => v.to_le_bytes().to_vec(),
        (FieldKind::Primitive(PrimitiveType::UInt32), Value::UInt32(v)) => v.to_le_bytes().to_vec(),
        (FieldKind::Primitive(PrimitiveType::Int32), Value::Int32(v)) => v.to_le_bytes().to_vec(),
        (FieldKind::Primitive(PrimitiveType::UInt64), Value::UInt64(v)) => v.to_le_bytes().to_vec(),
        (FieldKind::Primitive(PrimitiveType::Int64), Value::Int64(v)) => v.to_le_bytes().to_vec(),
        (FieldKind::Primitive(PrimitiveType::Float32), Value::Float32(v)) => v.to_le_bytes().to_vec(),
        (FieldKind::Primitive(PrimitiveType::Float64), Value::Float64(v)) => v.to_le_bytes().to_vec(),
        _ => return Err(TelemetryError::field_not_found(&field.name, "mistyped value")),
    };
    let end = at + bytes.len();
    let available = buf.len();
    buf.get_mut(at..end)
        .ok_or(TelemetryError::Truncated { needed: end, available })?
        .copy_from_slice(&bytes);
    Ok(())
}

/// Record of all-zero values for `layout`.
pub fn zero_record(layout: &Layout) -> Record {
    layout
        .fields
        .iter()
        .map(|field| {
            let element = || match &field.kind {
                FieldKind::Nested(nested) => Value::Record(zero_record(nested)),
                FieldKind::Primitive(ty) => typed(*ty, 0.0),
            };
            let value = match field.shape {
                Shape::Scalar => element(),
                Shape::Array(len) => Value::Array((0..len).map(|_| element()).collect()),
            };
            (field.name.clone(), value)
        })
        .collect()
}

/// Convert `x` to a value of primitive type `ty`, saturating like `as`.
pub fn typed(ty: PrimitiveType, x: f64) -> Value {
    match ty {
        PrimitiveType::UInt8 => Value::UInt8(x as u8),
        PrimitiveType::Int8 => Value::Int8(x as i8),
        PrimitiveType::UInt16 => Value::UInt16(x as u16),
        PrimitiveType::Int16 => Value::Int16(x as i16),
        PrimitiveType::UInt32 => Value::UInt32(x as u32),
        PrimitiveType::Int32 => Value::Int32(x as i32),
        PrimitiveType::UInt64 => Value::UInt64(x as u64),
        PrimitiveType::Int64 => Value::Int64(x as i64),
        PrimitiveType::Float32 => Value::Float32(x as f32),
        PrimitiveType::Float64 => Value::Float64(x),
    }
}

/// Builder for byte-exact F1 2021 datagrams.
///
/// Every datagram carries packet format 2021, packet version 1 and the
/// builder's session UID. Player-specific values are written into the car
/// slot named by the player index; an index past the end of the per-car
/// array is still reported in the header but writes land in the last slot.
#[derive(Debug, Clone)]
pub struct F1Datagrams {
    registry: Arc<LayoutRegistry>,
    session_uid: u64,
    player_index: u8,
}

impl F1Datagrams {
    pub fn new(session_uid: u64) -> Self {
        let registry = LayoutRegistry::f1_2021().expect("bundled F1 2021 specification compiles");
        Self { registry: Arc::new(registry), session_uid, player_index: 0 }
    }

    pub fn with_player_index(mut self, index: u8) -> Self {
        self.player_index = index;
        self
    }

    pub fn motion(&self, world_position_x: f32) -> Result<Vec<u8>> {
        self.build(PacketKind::Motion, |body| {
            body.player(&[("world_position_x", f64::from(world_position_x))])
        })
    }

    /// Session body with the given weather code and `(weather, rain%)` forecast samples.
    pub fn session(&self, weather: u8, forecasts: &[(u8, u8)]) -> Result<Vec<u8>> {
        self.build(PacketKind::Session, |body| {
            body.set("weather", f64::from(weather))?;
            body.set("num_weather_forecast_samples", forecasts.len() as f64)?;
            for (i, &(code, rain)) in forecasts.iter().enumerate() {
                body.element(
                    "weather_forecast_samples",
                    i,
                    &[("weather", f64::from(code)), ("rain_percentage", f64::from(rain))],
                )?;
            }
            Ok(())
        })
    }

    pub fn lap_data(&self, sector: u8, lap: u8, s1: u16, s2: u16, last_lap_ms: u32) -> Result<Vec<u8>> {
        self.build(PacketKind::LapData, |body| {
            body.player(&[
                ("sector", f64::from(sector)),
                ("current_lap_num", f64::from(lap)),
                ("sector1_time_in_ms", f64::from(s1)),
                ("sector2_time_in_ms", f64::from(s2)),
                ("last_lap_time_in_ms", f64::from(last_lap_ms)),
            ])
        })
    }

    pub fn car_telemetry(&self, speed: u16) -> Result<Vec<u8>> {
        self.build(PacketKind::CarTelemetry, |body| {
            body.player(&[("speed", f64::from(speed)), ("gear", 7.0), ("engine_rpm", 11_250.0)])?;
            body.player_array("tyres_pressure", &[22.5, 22.5, 21.0, 21.0])
        })
    }

    pub fn car_status(&self, visual_compound: u8, age_laps: u8) -> Result<Vec<u8>> {
        self.build(PacketKind::CarStatus, |body| {
            body.player(&[
                ("visual_tyre_compound", f64::from(visual_compound)),
                ("tyres_age_laps", f64::from(age_laps)),
            ])
        })
    }

    pub fn car_damage(&self, tyres_wear: [f32; 4]) -> Result<Vec<u8>> {
        self.build(PacketKind::CarDamage, |body| {
            let wear = tyres_wear.map(f64::from);
            body.player_array("tyres_wear", &wear)
        })
    }

    fn build<F>(&self, kind: PacketKind, edit: F) -> Result<Vec<u8>>
    where
        F: FnOnce(&mut BodyEditor<'_>) -> Result<()>,
    {
        let packet_id = DISPATCH_TABLE
            .iter()
            .find(|(key, k)| *k == kind && key.format == 2021)
            .map(|(key, _)| key.packet_id)
            .ok_or_else(|| TelemetryError::config(format!("{:?} has no F1 2021 packet id", kind)))?;

        let header_layout = self.registry.require(HEADER_LAYOUT, "test datagram")?;
        let layout = self.registry.require(kind.layout_name(), "test datagram")?;

        let mut header = zero_record(&header_layout);
        header.insert("packet_format", Value::UInt16(2021));
        header.insert("game_major_version", Value::UInt8(1));
        header.insert("game_minor_version", Value::UInt8(16));
        header.insert("packet_version", Value::UInt8(1));
        header.insert("packet_id", Value::UInt8(packet_id));
        header.insert("session_uid", Value::UInt64(self.session_uid));
        header.insert("player_car_index", Value::UInt8(self.player_index));
        header.insert("secondary_player_car_index", Value::UInt8(255));

        let mut record = zero_record(&layout);
        record.insert("header", Value::Record(header));

        let mut editor = BodyEditor {
            layout: &layout,
            record: &mut record,
            per_car: kind.per_car_field(),
            player_index: usize::from(self.player_index),
        };
        edit(&mut editor)?;

        pack(&layout, &record)
    }
}

struct BodyEditor<'a> {
    layout: &'a Layout,
    record: &'a mut Record,
    per_car: Option<&'static str>,
    player_index: usize,
}

impl BodyEditor<'_> {
    fn set(&mut self, name: &str, x: f64) -> Result<()> {
        let ty = primitive_of(self.layout, name)?;
        self.record.insert(name, typed(ty, x));
        Ok(())
    }

    /// Set scalar fields of element `index` of the record array `array`.
    fn element(&mut self, array: &str, index: usize, values: &[(&str, f64)]) -> Result<()> {
        self.edit_element(array, index, |layout, element| {
            for &(name, x) in values {
                element.insert(name, typed(primitive_of(layout, name)?, x));
            }
            Ok(())
        })
    }

    fn player(&mut self, values: &[(&str, f64)]) -> Result<()> {
        let (array, index) = self.player_slot()?;
        self.element(array, index, values)
    }

    fn player_array(&mut self, name: &str, values: &[f64]) -> Result<()> {
        let (array, index) = self.player_slot()?;
        self.edit_element(array, index, |layout, element| {
            let ty = primitive_of(layout, name)?;
            element.insert(name, Value::Array(values.iter().map(|&x| typed(ty, x)).collect()));
            Ok(())
        })
    }

    fn player_slot(&self) -> Result<(&'static str, usize)> {
        let array = self
            .per_car
            .ok_or_else(|| TelemetryError::field_not_found("per-car array", &self.layout.name))?;
        let len = self.layout.field(array).map(FieldLayout::count).unwrap_or(1);
        Ok((array, self.player_index.min(len.saturating_sub(1))))
    }

    fn edit_element<F>(&mut self, array: &str, index: usize, edit: F) -> Result<()>
    where
        F: FnOnce(&Layout, &mut Record) -> Result<()>,
    {
        let field = self
            .layout
            .field(array)
            .ok_or_else(|| TelemetryError::field_not_found(array, &self.layout.name))?;
        let nested = field
            .nested()
            .ok_or_else(|| TelemetryError::field_not_found(array, "record array"))?
            .clone();

        let mut items = self.record.array(array).map(<[Value]>::to_vec).unwrap_or_default();
        let len = items.len();
        let element = items
            .get_mut(index)
            .and_then(|item| match item {
                Value::Record(record) => Some(record),
                _ => None,
            })
            .ok_or(TelemetryError::IndexOutOfRange { index, len })?;
        edit(&nested, element)?;
        self.record.insert(array, Value::Array(items));
        Ok(())
    }
}

fn primitive_of(layout: &Layout, name: &str) -> Result<PrimitiveType> {
    match layout.field(name).map(|f| &f.kind) {
        Some(FieldKind::Primitive(ty)) => Ok(*ty),
        _ => Err(TelemetryError::field_not_found(name, &layout.name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datagrams_have_the_wire_sizes() {
        let builder = F1Datagrams::new(9);
        assert_eq!(builder.motion(0.0).unwrap().len(), 1464);
        assert_eq!(builder.session(0, &[(1, 0)]).unwrap().len(), 625);
        assert_eq!(builder.lap_data(1, 2, 3, 4, 5).unwrap().len(), 970);
        assert_eq!(builder.car_telemetry(1).unwrap().len(), 1347);
        assert_eq!(builder.car_status(16, 1).unwrap().len(), 1058);
        assert_eq!(builder.car_damage([0.0; 4]).unwrap().len(), 882);
    }

    #[test]
    fn header_bytes_follow_the_wire_layout() {
        let bytes = F1Datagrams::new(0x0102).with_player_index(3).lap_data(0, 1, 0, 0, 0).unwrap();
        assert_eq!(&bytes[0..2], &2021u16.to_le_bytes());
        assert_eq!(bytes[4], 1);
        assert_eq!(bytes[5], 2);
        assert_eq!(&bytes[6..14], &0x0102u64.to_le_bytes());
        assert_eq!(bytes[22], 3);
        assert_eq!(bytes[23], 255);
    }
}
