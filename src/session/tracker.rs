//! Session, lap and sector state machine

use chrono::Local;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::state::{SessionSnapshot, SessionState, TyreLatch};
use super::tyre::{TyreCompound, flatten_tyre_arrays};
use super::weather::weather_fields;
use crate::packet::{DecodedBody, Packet, player_record};
use crate::sink::{FieldValue, Fields, Sink};
use crate::types::Record;
use crate::{Result, TelemetryError};

/// Produces the label of a newly seen session.
pub type Labeler = Box<dyn FnMut() -> String + Send>;

/// Session label from the local wall clock, e.g. `2021-07-18@14:05`.
pub fn wall_clock_label() -> String {
    Local::now().format("%Y-%m-%d@%H:%M").to_string()
}

/// Counters kept by the tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    pub sessions: u64,
    pub lap_points: u64,
    pub live_points: u64,
    /// Writes the sink rejected; those points are lost
    pub sink_errors: u64,
}

/// Folds decoded packets into session state and writes derived points.
///
/// The tracker is single-threaded and owns its state exclusively. Packets
/// arriving before the first session body are ignored.
pub struct SessionTracker<S> {
    sink: S,
    state: Option<SessionState>,
    labeler: Labeler,
    stats: TrackerStats,
}

impl<S: Sink> SessionTracker<S> {
    pub fn new(sink: S) -> Self {
        Self::with_labeler(sink, wall_clock_label)
    }

    /// Use a custom session labeler instead of the wall clock.
    pub fn with_labeler(sink: S, labeler: impl FnMut() -> String + Send + 'static) -> Self {
        Self { sink, state: None, labeler: Box::new(labeler), stats: TrackerStats::default() }
    }

    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.as_ref().map(SessionState::snapshot).unwrap_or_default()
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Fold one packet into the session state.
    ///
    /// Errors describe why a record was dropped (`UnpairedTelemetry`,
    /// `IndexOutOfRange`, `FieldNotFound`); the state stays consistent and
    /// the next packet can be handled normally.
    pub fn handle(&mut self, packet: Packet) -> Result<()> {
        let Packet { header, body } = packet;
        let index = usize::from(header.player_car_index);

        if let DecodedBody::Session(record) = &body {
            return self.on_session(header.session_uid, record);
        }

        if self.state.is_none() {
            trace!(kind = ?body.kind(), "No session yet, ignoring packet");
            return Ok(());
        }

        match body {
            DecodedBody::Motion(_) => self.on_motion(&body, index),
            DecodedBody::CarTelemetry(_) => self.on_car_telemetry(&body, index),
            DecodedBody::LapData(_) => self.on_lap_data(&body, index),
            DecodedBody::CarStatus(_) => self.on_car_status(&body, index),
            DecodedBody::CarDamage(_) => self.on_car_damage(&body, index),
            DecodedBody::Session(_) => Ok(()),
        }
    }

    fn on_session(&mut self, session_uid: u64, record: &Record) -> Result<()> {
        let is_new = self.state.as_ref().is_none_or(|state| state.session_id != session_uid);
        if is_new {
            let label = (self.labeler)();
            info!(session_uid, label = %label, "New session");
            self.state = Some(SessionState::new(session_uid, label));
            self.stats.sessions += 1;
        }

        let fields = weather_fields(record);
        if !fields.is_empty() {
            self.write_live(fields);
        }
        Ok(())
    }

    fn on_motion(&mut self, body: &DecodedBody, index: usize) -> Result<()> {
        let motion = player(body, index)?;
        if let Some(state) = self.state.as_mut() {
            state.pending_motion = Some(motion);
        }
        Ok(())
    }

    fn on_car_telemetry(&mut self, body: &DecodedBody, index: usize) -> Result<()> {
        let Some(state) = self.state.as_mut() else { return Ok(()) };
        if state.pending_motion.is_none() {
            return Err(TelemetryError::UnpairedTelemetry);
        }

        let mut telemetry = player(body, index)?;
        if let Some(motion) = state.pending_motion.take() {
            telemetry.merge(motion);
        }

        let lap = state.current_lap;
        self.write_lap(lap, record_fields(flatten_tyre_arrays(telemetry)));
        Ok(())
    }

    fn on_lap_data(&mut self, body: &DecodedBody, index: usize) -> Result<()> {
        let lap_data = player(body, index)?;
        let sector = required::<u8>(&lap_data, "sector")?;
        let lap_num = required::<u32>(&lap_data, "current_lap_num")?;
        let last_lap_ms = required::<u32>(&lap_data, "last_lap_time_in_ms")?;

        let Some(state) = self.state.as_mut() else { return Ok(()) };

        if sector != state.current_sector {
            debug!(from = state.current_sector, to = sector, "Sector change");
            state.current_sector = sector;
            if sector > 0 {
                let finished = usize::from(sector - 1);
                let time = lap_data
                    .u64(&format!("sector{}_time_in_ms", sector))
                    .and_then(|t| u32::try_from(t).ok())
                    .unwrap_or(0);
                match state.sector_times.get_mut(finished) {
                    Some(slot) if time > 0 => *slot = time,
                    _ => {}
                }
            }
            self.emit_tyre();
        }

        let Some(state) = self.state.as_mut() else { return Ok(()) };
        if lap_num != state.current_lap {
            let [s1, s2, _] = state.sector_times;
            if s1 > 0 && s2 > 0 {
                let s3 = i64::from(last_lap_ms) - (i64::from(s1) + i64::from(s2));
                match u32::try_from(s3) {
                    Ok(s3) => state.sector_times[2] = s3,
                    Err(_) => debug!(last_lap_ms, s1, s2, "Sector times exceed lap time, leaving sector 3 unset"),
                }
                info!(
                    lap = state.current_lap,
                    time = %format_lap_time(last_lap_ms),
                    sectors = %format_sectors(&state.sector_times),
                    "Lap complete"
                );
            }

            let finished_lap = state.current_lap;
            let mut fields: Fields = state
                .sector_times
                .iter()
                .enumerate()
                .map(|(i, &t)| (format!("sector_{}_ms", i + 1), FieldValue::from(t)))
                .collect();
            fields.push(("total_time_ms".to_string(), FieldValue::from(last_lap_ms)));

            self.write_lap(finished_lap, fields);
            self.emit_tyre();
            if let Some(state) = self.state.as_mut() {
                state.reset_lap();
            }
        }

        if let Some(state) = self.state.as_mut() {
            state.current_lap = lap_num;
        }
        Ok(())
    }

    fn on_car_status(&mut self, body: &DecodedBody, index: usize) -> Result<()> {
        let status = player(body, index)?;
        let code = required::<u64>(&status, "visual_tyre_compound")?;
        let age_laps = required::<u64>(&status, "tyres_age_laps")?;

        let Some(compound) = TyreCompound::from_visual_code(code) else {
            debug!(code, "Unknown visual tyre compound");
            return Ok(());
        };

        if let Some(state) = self.state.as_mut() {
            state.tyre = Some(TyreLatch { compound, age_laps });
        }
        Ok(())
    }

    fn on_car_damage(&mut self, body: &DecodedBody, index: usize) -> Result<()> {
        let damage = player(body, index)?;
        self.write_live(record_fields(flatten_tyre_arrays(damage)));
        Ok(())
    }

    /// Write the latched tyre as a lap point, if any.
    fn emit_tyre(&mut self) {
        let Some(state) = self.state.as_ref() else { return };
        let Some(tyre) = state.tyre else { return };
        let lap = state.current_lap;
        let fields = vec![
            ("tyre_compound".to_string(), FieldValue::from(tyre.compound.label())),
            ("tyre_age".to_string(), FieldValue::from(tyre.age_laps)),
        ];
        self.write_lap(lap, fields);
    }

    fn write_lap(&mut self, lap: u32, fields: Fields) {
        let Some(state) = self.state.as_ref() else { return };
        if lap == 0 {
            trace!("Suppressing lap point before the first lap");
            return;
        }
        match self.sink.write_lap_point(&state.label, lap, fields) {
            Ok(()) => self.stats.lap_points += 1,
            Err(e) => {
                self.stats.sink_errors += 1;
                warn!(error = %e, lap, "Dropping lap point");
            }
        }
    }

    fn write_live(&mut self, fields: Fields) {
        if self.state.is_none() {
            return;
        }
        match self.sink.write_live_point(fields) {
            Ok(()) => self.stats.live_points += 1,
            Err(e) => {
                self.stats.sink_errors += 1;
                warn!(error = %e, "Dropping live point");
            }
        }
    }
}

fn player(body: &DecodedBody, index: usize) -> Result<Record> {
    let kind = body.kind();
    let field = kind
        .per_car_field()
        .ok_or_else(|| TelemetryError::field_not_found("per-car array", kind.layout_name()))?;
    player_record(body.record(), field, index)
}

fn required<T: TryFrom<u64>>(record: &Record, name: &str) -> Result<T> {
    record
        .u64(name)
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| TelemetryError::field_not_found(name, "player record"))
}

/// Scalar fields of a record; arrays and records that survive flattening are skipped.
fn record_fields(record: Record) -> Fields {
    record
        .into_iter()
        .filter_map(|(name, value)| match FieldValue::from_value(&value) {
            Some(field) => Some((name, field)),
            None => {
                trace!(field = %name, "Skipping non-scalar field");
                None
            }
        })
        .collect()
}

/// `m:ss.mmm`
pub fn format_lap_time(ms: u32) -> String {
    let (secs, millis) = (ms / 1000, ms % 1000);
    format!("{}:{:02}.{:03}", secs / 60, secs % 60, millis)
}

fn format_sectors(times: &[u32; 3]) -> String {
    times.iter().map(|&t| format!("{:.3}", f64::from(t) / 1000.0)).collect::<Vec<_>>().join(" / ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Dispatcher;
    use crate::schema::LayoutRegistry;
    use crate::sink::{MemorySink, RecordedPoint};
    use crate::test_utils::F1Datagrams;
    use proptest::prelude::*;

    struct Harness {
        dispatcher: Dispatcher,
        tracker: SessionTracker<MemorySink>,
        sink: MemorySink,
        datagrams: F1Datagrams,
    }

    impl Harness {
        fn new() -> Self {
            let dispatcher = Dispatcher::new(&LayoutRegistry::f1_2021().unwrap(), 2021).unwrap();
            let sink = MemorySink::new();
            let tracker = SessionTracker::with_labeler(sink.clone(), || "2021-07-18@14:05".to_string());
            Self { dispatcher, tracker, sink, datagrams: F1Datagrams::new(7) }
        }

        fn feed(&mut self, bytes: Vec<u8>) -> Result<()> {
            let packet = self.dispatcher.dispatch(&bytes).unwrap();
            self.tracker.handle(packet)
        }

        fn start_session(&mut self) {
            let bytes = self.datagrams.session(0, &[]).unwrap();
            self.feed(bytes).unwrap();
            self.sink.clear();
        }

        fn lap(&mut self, sector: u8, lap: u8, s1: u16, s2: u16, last: u32) {
            let bytes = self.datagrams.lap_data(sector, lap, s1, s2, last).unwrap();
            self.feed(bytes).unwrap();
        }
    }

    #[test]
    fn packets_before_a_session_are_ignored() {
        let mut h = Harness::new();
        let motion = h.datagrams.motion(1.0).unwrap();
        let damage = h.datagrams.car_damage([0.0; 4]).unwrap();
        h.feed(motion).unwrap();
        h.feed(damage).unwrap();
        assert!(h.sink.is_empty());
        assert!(h.tracker.state().is_none());
        assert!(!h.tracker.snapshot().has_session());
    }

    #[test]
    fn session_body_starts_a_session_and_reports_weather() {
        let mut h = Harness::new();
        let bytes = h.datagrams.session(3, &[(3, 40), (0, 0)]).unwrap();
        h.feed(bytes).unwrap();

        let state = h.tracker.state().unwrap();
        assert_eq!(state.session_id, 7);
        assert_eq!(state.label, "2021-07-18@14:05");

        let points = h.sink.live_points();
        assert_eq!(points.len(), 1);
        let fields = points[0].fields();
        assert_eq!(fields[0], ("weather".to_string(), FieldValue::Str("Light Rain".into())));
        assert_eq!(fields[1], ("forecast_0".to_string(), FieldValue::Str("Light Rain\n(40%)".into())));
        assert_eq!(fields[2], ("forecast_1".to_string(), FieldValue::Str("Clear".into())));
    }

    #[test]
    fn motion_then_telemetry_produces_one_merged_lap_point() {
        let mut h = Harness::new();
        h.start_session();
        h.lap(0, 1, 0, 0, 0);

        let motion = h.datagrams.motion(12.5).unwrap();
        let telemetry = h.datagrams.car_telemetry(287).unwrap();
        h.feed(motion).unwrap();
        h.feed(telemetry).unwrap();

        let points = h.sink.lap_points();
        assert_eq!(points.len(), 1);
        let RecordedPoint::Lap { label, lap, fields } = &points[0] else { panic!("expected lap point") };
        assert_eq!(label, "2021-07-18@14:05");
        assert_eq!(*lap, 1);

        let get = |name: &str| fields.iter().find(|(n, _)| n == name).map(|(_, v)| v.clone());
        assert_eq!(get("speed"), Some(FieldValue::UInt(287)));
        assert_eq!(get("world_position_x"), Some(FieldValue::Float(12.5)));
        assert!(get("tyres_pressure_front_left").is_some());
        assert!(get("tyres_pressure_rear_right").is_some());
        assert!(get("tyres_pressure").is_none());
        assert!(h.tracker.state().unwrap().pending_motion.is_none());
    }

    #[test]
    fn telemetry_without_motion_is_dropped() {
        let mut h = Harness::new();
        h.start_session();
        h.lap(0, 1, 0, 0, 0);

        let telemetry = h.datagrams.car_telemetry(100).unwrap();
        let err = h.feed(telemetry).unwrap_err();
        assert!(matches!(err, TelemetryError::UnpairedTelemetry));
        assert!(h.sink.is_empty());
    }

    #[test]
    fn motion_pairs_with_one_telemetry_only() {
        let mut h = Harness::new();
        h.start_session();
        h.lap(0, 1, 0, 0, 0);

        for bytes in [
            h.datagrams.motion(1.0).unwrap(),
            h.datagrams.motion(2.0).unwrap(),
            h.datagrams.car_telemetry(1).unwrap(),
        ] {
            h.feed(bytes).unwrap();
        }
        let second = h.datagrams.car_telemetry(2).unwrap();
        assert!(h.feed(second).is_err());

        let points = h.sink.lap_points();
        assert_eq!(points.len(), 1);
        let motion_x = points[0].fields().iter().find(|(n, _)| n == "world_position_x").map(|(_, v)| v.clone());
        assert_eq!(motion_x, Some(FieldValue::Float(2.0)));
    }

    #[test]
    fn out_of_range_player_index_is_a_soft_drop() {
        let mut h = Harness::new();
        h.start_session();
        let motion = h.datagrams.motion(1.0).unwrap();
        h.feed(motion).unwrap();

        let bytes = h.datagrams.clone().with_player_index(30).car_telemetry(1).unwrap();
        let err = h.feed(bytes).unwrap_err();
        assert!(matches!(err, TelemetryError::IndexOutOfRange { index: 30, len: 22 }));
        assert!(h.tracker.state().unwrap().pending_motion.is_some());
    }

    #[test]
    fn lap_sequence_derives_sector_three() {
        let mut h = Harness::new();
        h.start_session();

        h.lap(0, 1, 0, 0, 0);
        h.lap(1, 1, 15000, 0, 0);
        h.lap(2, 1, 15000, 16000, 0);
        h.lap(0, 2, 0, 0, 47000);

        let points = h.sink.lap_points();
        assert_eq!(points.len(), 1);
        let RecordedPoint::Lap { lap, fields, .. } = &points[0] else { panic!("expected lap point") };
        assert_eq!(*lap, 1);
        assert_eq!(
            fields,
            &vec![
                ("sector_1_ms".to_string(), FieldValue::UInt(15000)),
                ("sector_2_ms".to_string(), FieldValue::UInt(16000)),
                ("sector_3_ms".to_string(), FieldValue::UInt(16000)),
                ("total_time_ms".to_string(), FieldValue::UInt(47000)),
            ]
        );

        let state = h.tracker.state().unwrap();
        assert_eq!(state.current_lap, 2);
        assert_eq!(state.current_sector, 0);
        assert_eq!(state.sector_times, [0, 0, 0]);
    }

    #[test]
    fn sector_three_is_never_negative() {
        let mut h = Harness::new();
        h.start_session();
        h.lap(0, 1, 0, 0, 0);
        h.lap(1, 1, 30000, 0, 0);
        h.lap(2, 1, 30000, 30000, 0);
        h.lap(0, 2, 0, 0, 50000);

        let fields = h.sink.lap_points()[0].fields().clone();
        assert_eq!(fields[2], ("sector_3_ms".to_string(), FieldValue::UInt(0)));
    }

    #[test]
    fn tyre_is_emitted_at_sector_and_lap_boundaries() {
        let mut h = Harness::new();
        h.start_session();
        h.lap(0, 1, 0, 0, 0);

        let status = h.datagrams.car_status(17, 4).unwrap();
        h.feed(status).unwrap();
        assert!(h.sink.is_empty(), "tyre emission is deferred");

        h.lap(1, 1, 15000, 0, 0);
        let points = h.sink.lap_points();
        assert_eq!(points.len(), 1);
        assert_eq!(
            points[0].fields(),
            &vec![
                ("tyre_compound".to_string(), FieldValue::Str("Medium".into())),
                ("tyre_age".to_string(), FieldValue::UInt(4)),
            ]
        );

        h.lap(2, 1, 15000, 16000, 0);
        h.lap(0, 2, 0, 0, 47000);
        // sector change, lap point, tyre again
        let points = h.sink.lap_points();
        assert_eq!(points.len(), 5);
        assert!(points[4].fields().iter().any(|(n, _)| n == "tyre_compound"));
        assert!(h.tracker.state().unwrap().tyre.is_none());
    }

    #[test]
    fn unknown_compound_codes_do_not_latch() {
        let mut h = Harness::new();
        h.start_session();
        let status = h.datagrams.car_status(99, 1).unwrap();
        h.feed(status).unwrap();
        assert!(h.tracker.state().unwrap().tyre.is_none());
    }

    #[test]
    fn damage_is_written_live_with_flattened_tyres() {
        let mut h = Harness::new();
        h.start_session();
        let bytes = h.datagrams.car_damage([0.25, 0.5, 0.75, 1.0]).unwrap();
        h.feed(bytes).unwrap();

        let points = h.sink.live_points();
        assert_eq!(points.len(), 1);
        let fields = points[0].fields();
        assert!(fields.contains(&("tyres_wear_rear_left".to_string(), FieldValue::Float(0.75))));
        assert!(fields.iter().any(|(n, _)| n == "engine_mguh_wear"));
    }

    #[test]
    fn new_session_uid_resets_the_state() {
        let mut h = Harness::new();
        h.start_session();
        h.lap(0, 3, 0, 0, 0);
        h.lap(1, 3, 15000, 0, 0);
        let motion = h.datagrams.motion(1.0).unwrap();
        h.feed(motion).unwrap();

        let other = F1Datagrams::new(8).session(0, &[]).unwrap();
        h.feed(other).unwrap();

        let state = h.tracker.state().unwrap();
        assert_eq!(state.session_id, 8);
        assert_eq!((state.current_sector, state.sector_times, state.current_lap), (0, [0, 0, 0], 0));
        assert!(state.pending_motion.is_none());
        assert_eq!(h.tracker.stats().sessions, 2);
    }

    #[test]
    fn repeated_session_bodies_keep_the_label() {
        let mut calls = 0;
        let mut h = Harness::new();
        h.tracker = SessionTracker::with_labeler(h.sink.clone(), move || {
            calls += 1;
            format!("label-{calls}")
        });
        for _ in 0..3 {
            let bytes = h.datagrams.session(0, &[]).unwrap();
            h.feed(bytes).unwrap();
        }
        assert_eq!(h.tracker.state().unwrap().label, "label-1");
    }

    struct FailingSink;

    impl Sink for FailingSink {
        fn write_lap_point(&mut self, _: &str, _: u32, _: Fields) -> Result<()> {
            Err(TelemetryError::sink_failed("unreachable"))
        }

        fn write_live_point(&mut self, _: Fields) -> Result<()> {
            Err(TelemetryError::sink_failed("unreachable"))
        }
    }

    #[test]
    fn sink_failures_are_swallowed() {
        let dispatcher = Dispatcher::new(&LayoutRegistry::f1_2021().unwrap(), 2021).unwrap();
        let mut tracker = SessionTracker::new(FailingSink);
        let datagrams = F1Datagrams::new(1);

        for bytes in [datagrams.session(0, &[]).unwrap(), datagrams.car_damage([0.0; 4]).unwrap()] {
            tracker.handle(dispatcher.dispatch(&bytes).unwrap()).unwrap();
        }
        assert_eq!(tracker.stats().sink_errors, 2);
        assert_eq!(tracker.stats().live_points, 0);
    }

    #[test]
    fn lap_times_format_as_minutes_seconds_millis() {
        assert_eq!(format_lap_time(47000), "0:47.000");
        assert_eq!(format_lap_time(83_456), "1:23.456");
        assert_eq!(format_sectors(&[15000, 16000, 16000]), "15.000 / 16.000 / 16.000");
    }

    #[test]
    fn wall_clock_label_has_minute_precision() {
        let label = wall_clock_label();
        assert_eq!(label.len(), "2021-07-18@14:05".len());
        assert_eq!(&label[10..11], "@");
    }

    proptest! {
        #[test]
        fn completed_laps_sum_to_total_time(
            s1 in 1u16..40_000,
            s2 in 1u16..40_000,
            s3 in 0u32..40_000,
        ) {
            let mut h = Harness::new();
            h.start_session();
            let total = u32::from(s1) + u32::from(s2) + s3;
            h.lap(0, 1, 0, 0, 0);
            h.lap(1, 1, s1, 0, 0);
            h.lap(2, 1, s1, s2, 0);
            h.lap(0, 2, 0, 0, total);

            let points = h.sink.lap_points();
            prop_assert_eq!(points.len(), 1);
            let value = |name: &str| match points[0].fields().iter().find(|(n, _)| n == name) {
                Some((_, FieldValue::UInt(v))) => *v,
                _ => u64::MAX,
            };
            prop_assert_eq!(
                value("sector_1_ms") + value("sector_2_ms") + value("sector_3_ms"),
                value("total_time_ms")
            );
        }
    }
}
