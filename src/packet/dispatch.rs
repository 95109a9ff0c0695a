//! Header-driven dispatch of raw datagrams to body layouts

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use super::{DISPATCH_TABLE, DecodedBody, DispatchKey, HEADER_LAYOUT, PacketHeader, PacketKind};
use crate::schema::LayoutRegistry;
use crate::types::{Layout, decode};
use crate::{Result, TelemetryError};

/// A datagram decoded into its header and body.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub header: PacketHeader,
    pub body: DecodedBody,
}

#[derive(Debug, Clone)]
struct Route {
    kind: PacketKind,
    layout: Arc<Layout>,
}

/// Resolves every body layout up front and decodes datagrams against them.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    header: Arc<Layout>,
    routes: HashMap<DispatchKey, Route>,
}

impl Dispatcher {
    /// Build a dispatcher for the packet kinds of `packet_format`.
    ///
    /// Fails if the registry lacks the header or any body layout the
    /// dispatch table names, or if a per-car body has no per-car array.
    pub fn new(registry: &LayoutRegistry, packet_format: u16) -> Result<Self> {
        let header = registry.require(HEADER_LAYOUT, "packet dispatcher")?;

        let mut routes = HashMap::new();
        for (key, kind) in DISPATCH_TABLE.iter().filter(|(key, _)| key.format == packet_format) {
            let layout = registry.require(kind.layout_name(), "packet dispatcher")?;
            let missing_cars = kind
                .per_car_field()
                .filter(|field| layout.field(field).and_then(|f| f.nested()).is_none());
            if let Some(field) = missing_cars {
                return Err(TelemetryError::config(format!(
                    "{} has no per-car array '{}'",
                    layout.name, field
                )));
            }
            routes.insert(*key, Route { kind: *kind, layout });
        }

        if routes.is_empty() {
            return Err(TelemetryError::config(format!(
                "no packet kinds are known for packet format {}",
                packet_format
            )));
        }

        Ok(Self { header, routes })
    }

    pub fn header_size(&self) -> usize {
        self.header.size
    }

    /// Body layout for a packet kind, if routed.
    pub fn layout(&self, kind: PacketKind) -> Option<&Arc<Layout>> {
        self.routes.values().find(|route| route.kind == kind).map(|route| &route.layout)
    }

    pub fn decode_header(&self, datagram: &[u8]) -> Result<PacketHeader> {
        if datagram.len() < self.header.size {
            return Err(TelemetryError::Truncated { needed: self.header.size, available: datagram.len() });
        }
        let (record, _) = decode(&self.header, datagram, 0)?;
        PacketHeader::from_record(&record)
    }

    /// Decode one datagram.
    ///
    /// Unknown discriminators are `UnknownPacket`; a datagram whose length
    /// differs from the declared body size is `SizeMismatch`. Both are
    /// per-datagram drops.
    pub fn dispatch(&self, datagram: &[u8]) -> Result<Packet> {
        let header = self.decode_header(datagram)?;
        let key = header.dispatch_key();
        let route = self.routes.get(&key).ok_or(TelemetryError::UnknownPacket {
            format: key.format,
            version: key.version,
            packet_id: key.packet_id,
        })?;

        let layout = &route.layout;
        if datagram.len() != layout.size {
            return Err(TelemetryError::size_mismatch(layout.name.clone(), layout.size, datagram.len()));
        }

        let (record, consumed) = decode(layout, datagram, 0)?;
        if consumed != layout.size {
            return Err(TelemetryError::size_mismatch(layout.name.clone(), layout.size, consumed));
        }

        trace!(
            kind = ?route.kind,
            frame = header.frame_identifier,
            bytes = consumed,
            "Decoded packet"
        );

        Ok(Packet { header, body: DecodedBody::new(route.kind, record) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::F1Datagrams;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(&LayoutRegistry::f1_2021().unwrap(), 2021).unwrap()
    }

    #[test]
    fn dispatches_every_f1_2021_packet_kind() {
        let dispatcher = dispatcher();
        let builder = F1Datagrams::new(42);
        let datagrams = [
            (builder.motion(0.0).unwrap(), PacketKind::Motion),
            (builder.session(0, &[]).unwrap(), PacketKind::Session),
            (builder.lap_data(0, 1, 0, 0, 0).unwrap(), PacketKind::LapData),
            (builder.car_telemetry(200).unwrap(), PacketKind::CarTelemetry),
            (builder.car_status(16, 3).unwrap(), PacketKind::CarStatus),
            (builder.car_damage([0.1, 0.2, 0.3, 0.4]).unwrap(), PacketKind::CarDamage),
        ];

        for (bytes, kind) in datagrams {
            let packet = dispatcher.dispatch(&bytes).unwrap();
            assert_eq!(packet.body.kind(), kind);
            assert_eq!(packet.header.session_uid, 42);
            assert_eq!(packet.header.packet_format, 2021);
        }
    }

    #[test]
    fn unknown_packet_ids_are_soft_failures() {
        let dispatcher = dispatcher();
        let mut bytes = F1Datagrams::new(1).motion(0.0).unwrap();
        bytes[5] = 3; // packetId 3 (Event) is not routed
        let err = dispatcher.dispatch(&bytes).unwrap_err();
        assert!(matches!(err, TelemetryError::UnknownPacket { format: 2021, version: 1, packet_id: 3 }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn wrong_length_is_a_size_mismatch() {
        let dispatcher = dispatcher();
        let mut bytes = F1Datagrams::new(1).car_status(16, 0).unwrap();
        bytes.pop();
        let err = dispatcher.dispatch(&bytes).unwrap_err();
        assert!(matches!(
            err,
            TelemetryError::SizeMismatch { expected: 1058, actual: 1057, .. }
        ));

        bytes.extend_from_slice(&[0, 0]);
        assert!(matches!(dispatcher.dispatch(&bytes), Err(TelemetryError::SizeMismatch { .. })));
    }

    #[test]
    fn short_datagrams_are_truncated() {
        let err = dispatcher().dispatch(&[0xE5, 0x07, 1]).unwrap_err();
        assert!(matches!(err, TelemetryError::Truncated { needed: 24, available: 3 }));
    }

    #[test]
    fn unsupported_format_is_a_config_error() {
        let err = Dispatcher::new(&LayoutRegistry::f1_2021().unwrap(), 2020).unwrap_err();
        assert!(matches!(err, TelemetryError::Config { .. }));
    }

    #[test]
    fn missing_body_layouts_are_fatal() {
        let registry = LayoutRegistry::compile("struct PacketHeader { uint16 m_packetFormat; };").unwrap();
        let err = Dispatcher::new(&registry, 2021).unwrap_err();
        assert!(err.is_fatal());
    }
}
