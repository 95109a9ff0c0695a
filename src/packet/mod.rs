//! Packet kinds, header decoding and dispatch
//!
//! Every datagram starts with a [`PacketHeader`]. The header's
//! `(packetFormat, packetVersion, packetId)` triple selects a [`PacketKind`]
//! through a static table, and the kind names the body layout the
//! [`Dispatcher`] decodes the datagram with.

mod dispatch;
mod header;

pub use dispatch::{Dispatcher, Packet};
pub use header::{HEADER_LAYOUT, PacketHeader};

use serde::Serialize;

use crate::types::{Record, Value};
use crate::{Result, TelemetryError};

/// Packet bodies the session tracker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PacketKind {
    Motion,
    Session,
    LapData,
    CarTelemetry,
    CarStatus,
    CarDamage,
}

impl PacketKind {
    pub const ALL: [PacketKind; 6] = [
        PacketKind::Motion,
        PacketKind::Session,
        PacketKind::LapData,
        PacketKind::CarTelemetry,
        PacketKind::CarStatus,
        PacketKind::CarDamage,
    ];

    /// Name of the body layout in the specification.
    pub fn layout_name(self) -> &'static str {
        match self {
            PacketKind::Motion => "PacketMotionData",
            PacketKind::Session => "PacketSessionData",
            PacketKind::LapData => "PacketLapData",
            PacketKind::CarTelemetry => "PacketCarTelemetryData",
            PacketKind::CarStatus => "PacketCarStatusData",
            PacketKind::CarDamage => "PacketCarDamageData",
        }
    }

    /// Field holding one record per car, if the body has one.
    pub fn per_car_field(self) -> Option<&'static str> {
        match self {
            PacketKind::Motion => Some("car_motion_data"),
            PacketKind::Session => None,
            PacketKind::LapData => Some("lap_data"),
            PacketKind::CarTelemetry => Some("car_telemetry_data"),
            PacketKind::CarStatus => Some("car_status_data"),
            PacketKind::CarDamage => Some("car_damage_data"),
        }
    }
}

/// Header discriminator selecting a body layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DispatchKey {
    pub format: u16,
    pub version: u8,
    pub packet_id: u8,
}

impl DispatchKey {
    pub const fn new(format: u16, version: u8, packet_id: u8) -> Self {
        Self { format, version, packet_id }
    }
}

/// Static mapping from header discriminator to packet kind.
pub const DISPATCH_TABLE: &[(DispatchKey, PacketKind)] = &[
    (DispatchKey::new(2021, 1, 0), PacketKind::Motion),
    (DispatchKey::new(2021, 1, 1), PacketKind::Session),
    (DispatchKey::new(2021, 1, 2), PacketKind::LapData),
    (DispatchKey::new(2021, 1, 6), PacketKind::CarTelemetry),
    (DispatchKey::new(2021, 1, 7), PacketKind::CarStatus),
    (DispatchKey::new(2021, 1, 10), PacketKind::CarDamage),
];

/// Look up the packet kind for a header discriminator.
pub fn lookup(key: DispatchKey) -> Option<PacketKind> {
    DISPATCH_TABLE.iter().find(|(k, _)| *k == key).map(|(_, kind)| *kind)
}

/// A decoded packet body, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedBody {
    Motion(Record),
    Session(Record),
    LapData(Record),
    CarTelemetry(Record),
    CarStatus(Record),
    CarDamage(Record),
}

impl DecodedBody {
    pub fn new(kind: PacketKind, record: Record) -> Self {
        match kind {
            PacketKind::Motion => DecodedBody::Motion(record),
            PacketKind::Session => DecodedBody::Session(record),
            PacketKind::LapData => DecodedBody::LapData(record),
            PacketKind::CarTelemetry => DecodedBody::CarTelemetry(record),
            PacketKind::CarStatus => DecodedBody::CarStatus(record),
            PacketKind::CarDamage => DecodedBody::CarDamage(record),
        }
    }

    pub fn kind(&self) -> PacketKind {
        match self {
            DecodedBody::Motion(_) => PacketKind::Motion,
            DecodedBody::Session(_) => PacketKind::Session,
            DecodedBody::LapData(_) => PacketKind::LapData,
            DecodedBody::CarTelemetry(_) => PacketKind::CarTelemetry,
            DecodedBody::CarStatus(_) => PacketKind::CarStatus,
            DecodedBody::CarDamage(_) => PacketKind::CarDamage,
        }
    }

    pub fn record(&self) -> &Record {
        match self {
            DecodedBody::Motion(record)
            | DecodedBody::Session(record)
            | DecodedBody::LapData(record)
            | DecodedBody::CarTelemetry(record)
            | DecodedBody::CarStatus(record)
            | DecodedBody::CarDamage(record) => record,
        }
    }
}

/// Extract the record at `index` from the per-car array field `field`.
///
/// Fails with `IndexOutOfRange` when the index is beyond the decoded array.
pub fn player_record(body: &Record, field: &str, index: usize) -> Result<Record> {
    let cars = body.array(field).ok_or_else(|| TelemetryError::field_not_found(field, "packet body"))?;
    let car = cars.get(index).ok_or(TelemetryError::IndexOutOfRange { index, len: cars.len() })?;
    match car {
        Value::Record(record) => Ok(record.clone()),
        _ => Err(TelemetryError::field_not_found(field, "packet body")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_table_covers_every_kind_once() {
        for kind in PacketKind::ALL {
            assert_eq!(DISPATCH_TABLE.iter().filter(|(_, k)| *k == kind).count(), 1, "{kind:?}");
        }
        assert_eq!(lookup(DispatchKey::new(2021, 1, 6)), Some(PacketKind::CarTelemetry));
        assert_eq!(lookup(DispatchKey::new(2021, 1, 3)), None);
        assert_eq!(lookup(DispatchKey::new(2020, 1, 0)), None);
        assert_eq!(lookup(DispatchKey::new(2021, 2, 0)), None);
    }

    #[test]
    fn player_record_is_bounds_checked() {
        let car = |speed: u16| {
            let mut record = Record::new();
            record.push("speed", Value::UInt16(speed));
            Value::Record(record)
        };
        let mut body = Record::new();
        body.push("car_telemetry_data", Value::Array(vec![car(100), car(200)]));

        let record = player_record(&body, "car_telemetry_data", 1).unwrap();
        assert_eq!(record.u64("speed"), Some(200));

        let err = player_record(&body, "car_telemetry_data", 22).unwrap_err();
        assert!(matches!(err, TelemetryError::IndexOutOfRange { index: 22, len: 2 }));
        assert!(!err.is_fatal());

        assert!(matches!(
            player_record(&body, "lap_data", 0),
            Err(TelemetryError::FieldNotFound { .. })
        ));
    }

    #[test]
    fn body_kind_round_trips() {
        for kind in PacketKind::ALL {
            assert_eq!(DecodedBody::new(kind, Record::new()).kind(), kind);
        }
    }
}
