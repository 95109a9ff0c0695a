//! Sealed name -> layout registry

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::{compiler, parse};
use crate::types::Layout;
use crate::{Result, TelemetryError};

/// Wire-format specification for the F1 2021 UDP telemetry, embedded at build time.
pub const F1_2021_SPEC: &str = include_str!("../../specs/f1_2021.h");

/// Immutable mapping from type name to compiled layout.
///
/// Built once from specification text and never modified afterwards. Clones
/// share the underlying layouts.
#[derive(Debug, Clone, Default)]
pub struct LayoutRegistry {
    layouts: Vec<Arc<Layout>>,
    by_name: HashMap<String, usize>,
}

impl LayoutRegistry {
    /// Compile specification text into a registry.
    ///
    /// Any syntax error or unresolved type fails the whole compile; no
    /// partial registry is returned.
    pub fn compile(text: &str) -> Result<Self> {
        let ast = parse(text)?;
        let layouts = compiler::compile(&ast)?;
        let by_name = layouts.iter().enumerate().map(|(i, layout)| (layout.name.clone(), i)).collect();

        let registry = Self { layouts, by_name };
        info!(layouts = registry.len(), "Compiled wire-format specification");
        Ok(registry)
    }

    /// Compile the embedded F1 2021 specification.
    pub fn f1_2021() -> Result<Self> {
        Self::compile(F1_2021_SPEC)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Layout>> {
        self.by_name.get(name).map(|&i| &self.layouts[i])
    }

    /// Look up a layout that the caller cannot work without.
    pub fn require(&self, name: &str, needed_by: &str) -> Result<Arc<Layout>> {
        self.get(name).cloned().ok_or_else(|| TelemetryError::unresolved_type(name, needed_by))
    }

    /// Layouts in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Layout>> {
        self.layouts.iter()
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_spec_compiles_to_documented_sizes() {
        let registry = LayoutRegistry::f1_2021().unwrap();
        let expected = [
            ("PacketHeader", 24),
            ("CarMotionData", 60),
            ("PacketMotionData", 1464),
            ("MarshalZone", 5),
            ("WeatherForecastSample", 8),
            ("PacketSessionData", 625),
            ("LapData", 43),
            ("PacketLapData", 970),
            ("CarTelemetryData", 60),
            ("PacketCarTelemetryData", 1347),
            ("CarStatusData", 47),
            ("PacketCarStatusData", 1058),
            ("CarDamageData", 39),
            ("PacketCarDamageData", 882),
        ];
        for (name, size) in expected {
            assert_eq!(registry.get(name).map(|l| l.size), Some(size), "{name}");
        }
    }

    #[test]
    fn layouts_keep_declaration_order() {
        let registry = LayoutRegistry::f1_2021().unwrap();
        let names: Vec<_> = registry.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names.first(), Some(&"PacketHeader"));
        assert_eq!(names.last(), Some(&"PacketCarDamageData"));
        assert_eq!(registry.len(), 14);
    }

    #[test]
    fn header_fields_are_normalized() {
        let registry = LayoutRegistry::f1_2021().unwrap();
        let header = registry.get("PacketHeader").unwrap();
        let names: Vec<_> = header.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "packet_format",
                "game_major_version",
                "game_minor_version",
                "packet_version",
                "packet_id",
                "session_uid",
                "session_time",
                "frame_identifier",
                "player_car_index",
                "secondary_player_car_index",
            ]
        );
    }

    #[test]
    fn failed_compile_publishes_nothing() {
        assert!(LayoutRegistry::compile("struct A { uint8 a; }; struct B { Missing m; };").is_err());
    }

    #[test]
    fn require_reports_missing_layouts() {
        let registry = LayoutRegistry::compile("struct A { uint8 a; };").unwrap();
        assert!(registry.require("A", "test").is_ok());
        let err = registry.require("B", "dispatch table").unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("dispatch table"));
    }
}
