//! Session tracking
//!
//! [`SessionTracker`] consumes decoded packets in arrival order and keeps
//! session, lap and sector state, writing derived points to a
//! [`Sink`](crate::sink::Sink):
//!
//! | Body | Effect |
//! |------|--------|
//! | Session | starts or replaces the session; writes weather as a live point |
//! | Motion | buffered until the next car telemetry body |
//! | CarTelemetry | merged with the buffered motion sample and written as a lap point |
//! | LapData | tracks sector and lap changes; writes sector times and the latched tyre |
//! | CarStatus | latches tyre compound and age |
//! | CarDamage | written as a live point |
//!
//! Lap and sector changes are detected by value, so lost or reordered
//! datagrams can skew the bookkeeping until the next change corrects it.

mod state;
mod tracker;
mod tyre;
mod weather;

pub use state::{SessionSnapshot, SessionState, TyreLatch};
pub use tracker::{Labeler, SessionTracker, TrackerStats, format_lap_time, wall_clock_label};
pub use tyre::{TyreCompound, TyrePosition, flatten_tyre_arrays};
pub use weather::{MAX_FORECAST_SAMPLES, Weather, forecast_label, weather_fields};
