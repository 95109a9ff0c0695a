//! Fixed packet header present at the start of every datagram

use serde::Serialize;

use super::DispatchKey;
use crate::types::Record;
use crate::{Result, TelemetryError};

/// Name of the header layout every specification must declare.
pub const HEADER_LAYOUT: &str = "PacketHeader";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PacketHeader {
    pub packet_format: u16,
    pub game_major_version: u8,
    pub game_minor_version: u8,
    /// Version of this packet type
    pub packet_version: u8,
    pub packet_id: u8,
    /// Unique identifier for the session
    pub session_uid: u64,
    pub session_time: f32,
    pub frame_identifier: u32,
    /// Index of the player's car in per-car arrays
    pub player_car_index: u8,
    /// 255 if there is no secondary player
    pub secondary_player_car_index: u8,
}

impl PacketHeader {
    /// Build a typed header from a record decoded with the `PacketHeader` layout.
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            packet_format: int(record, "packet_format")?,
            game_major_version: int(record, "game_major_version")?,
            game_minor_version: int(record, "game_minor_version")?,
            packet_version: int(record, "packet_version")?,
            packet_id: int(record, "packet_id")?,
            session_uid: int(record, "session_uid")?,
            session_time: record
                .f64("session_time")
                .ok_or_else(|| TelemetryError::field_not_found("session_time", HEADER_LAYOUT))?
                as f32,
            frame_identifier: int(record, "frame_identifier")?,
            player_car_index: int(record, "player_car_index")?,
            secondary_player_car_index: int(record, "secondary_player_car_index")?,
        })
    }

    /// The `(packetFormat, packetVersion, packetId)` discriminator.
    pub fn dispatch_key(&self) -> DispatchKey {
        DispatchKey::new(self.packet_format, self.packet_version, self.packet_id)
    }
}

fn int<T: TryFrom<u64>>(record: &Record, name: &'static str) -> Result<T> {
    record
        .u64(name)
        .and_then(|value| T::try_from(value).ok())
        .ok_or_else(|| TelemetryError::field_not_found(name, HEADER_LAYOUT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn mistyped_fields_are_reported() {
        let mut record = Record::new();
        record.push("packet_format", Value::UInt32(70_000));
        let err = PacketHeader::from_record(&record).unwrap_err();
        match err {
            TelemetryError::FieldNotFound { field, context } => {
                assert_eq!(field, "packet_format");
                assert_eq!(context, HEADER_LAYOUT);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
