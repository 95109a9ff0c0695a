//! Destinations for derived telemetry points
//!
//! The session tracker issues two kinds of writes:
//! - **lap points**, scoped to a session label and lap number
//! - **live points**, samples not tied to any lap
//!
//! Writes are fire-and-forget from the tracker's side: a failing sink is
//! logged and the point is lost, never retried.

mod line_protocol;
mod memory;

pub use line_protocol::LineProtocolSink;
pub use memory::{MemorySink, RecordedPoint};

use serde::Serialize;

use crate::Result;
use crate::types::Value;

/// Measurement name used for live points.
pub const LIVE_MEASUREMENT: &str = "live";

/// A single field value as written to a sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

impl FieldValue {
    /// Convert a decoded scalar; arrays and records have no field form.
    pub fn from_value(value: &Value) -> Option<Self> {
        match *value {
            Value::UInt8(v) => Some(FieldValue::UInt(v.into())),
            Value::UInt16(v) => Some(FieldValue::UInt(v.into())),
            Value::UInt32(v) => Some(FieldValue::UInt(v.into())),
            Value::UInt64(v) => Some(FieldValue::UInt(v)),
            Value::Int8(v) => Some(FieldValue::Int(v.into())),
            Value::Int16(v) => Some(FieldValue::Int(v.into())),
            Value::Int32(v) => Some(FieldValue::Int(v.into())),
            Value::Int64(v) => Some(FieldValue::Int(v)),
            Value::Float32(v) => Some(FieldValue::Float(v.into())),
            Value::Float64(v) => Some(FieldValue::Float(v)),
            Value::Array(_) | Value::Record(_) => None,
        }
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::UInt(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::UInt(v.into())
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

/// Ordered field set of one point.
pub type Fields = Vec<(String, FieldValue)>;

/// A point ready to be written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub measurement: String,
    pub fields: Fields,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: i64,
}

impl Point {
    /// Lap point, measured as `<label>-<lap>` with the lap zero-padded to two digits.
    pub fn lap(label: &str, lap: u32, fields: Fields, timestamp_ms: i64) -> Self {
        Self { measurement: lap_measurement(label, lap), fields, timestamp_ms }
    }

    pub fn live(fields: Fields, timestamp_ms: i64) -> Self {
        Self { measurement: LIVE_MEASUREMENT.to_string(), fields, timestamp_ms }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

pub fn lap_measurement(label: &str, lap: u32) -> String {
    format!("{}-{:02}", label, lap)
}

/// Accepts lap and live point writes.
pub trait Sink: Send {
    fn write_lap_point(&mut self, label: &str, lap: u32, fields: Fields) -> Result<()>;

    fn write_live_point(&mut self, fields: Fields) -> Result<()>;
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn write_lap_point(&mut self, label: &str, lap: u32, fields: Fields) -> Result<()> {
        (**self).write_lap_point(label, lap, fields)
    }

    fn write_live_point(&mut self, fields: Fields) -> Result<()> {
        (**self).write_live_point(fields)
    }
}
