//! Datagram-to-point pipeline
//!
//! A [`Collector`] owns a [`Dispatcher`] and a [`SessionTracker`] and runs
//! each datagram through both before the next one is accepted.

use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::packet::Dispatcher;
use crate::session::{SessionSnapshot, SessionTracker, TrackerStats};
use crate::sink::Sink;
use crate::{Result, TelemetryError};

/// Per-outcome datagram counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectorStats {
    pub received: u64,
    pub processed: u64,
    pub unknown_packets: u64,
    /// Size mismatches and truncated datagrams
    pub malformed: u64,
    /// Records dropped by the tracker (unpaired telemetry, bad car index)
    pub dropped_records: u64,
    pub tracker: TrackerStats,
}

pub struct Collector<S> {
    dispatcher: Dispatcher,
    tracker: SessionTracker<S>,
    stats: CollectorStats,
}

impl<S: Sink> Collector<S> {
    pub fn new(dispatcher: Dispatcher, tracker: SessionTracker<S>) -> Self {
        Self { dispatcher, tracker, stats: CollectorStats::default() }
    }

    /// Compile the configured specification and build a collector around `sink`.
    pub fn from_config(config: &Config, sink: S) -> Result<Self> {
        let registry = config.compile_spec()?;
        let dispatcher = Dispatcher::new(&registry, config.packet_format)?;
        Ok(Self::new(dispatcher, SessionTracker::new(sink)))
    }

    /// Decode one datagram and fold it into the session state.
    pub fn process(&mut self, datagram: &[u8]) -> Result<()> {
        let packet = self.dispatcher.dispatch(datagram)?;
        self.tracker.handle(packet)
    }

    /// Like [`process`](Self::process), but logs and counts failures
    /// instead of returning them. Returns whether the datagram was used.
    pub fn ingest(&mut self, datagram: &[u8]) -> bool {
        self.stats.received += 1;
        let result = self.process(datagram);
        match &result {
            Ok(()) => self.stats.processed += 1,
            Err(TelemetryError::UnknownPacket { .. }) => self.stats.unknown_packets += 1,
            Err(TelemetryError::SizeMismatch { .. } | TelemetryError::Truncated { .. }) => {
                self.stats.malformed += 1
            }
            Err(_) => self.stats.dropped_records += 1,
        }
        if let Err(e) = result {
            debug!(error = %e, bytes = datagram.len(), "Dropping datagram");
            return false;
        }
        true
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.tracker.snapshot()
    }

    pub fn stats(&self) -> CollectorStats {
        CollectorStats { tracker: self.tracker.stats(), ..self.stats }
    }

    pub fn tracker(&self) -> &SessionTracker<S> {
        &self.tracker
    }

    pub fn into_tracker(self) -> SessionTracker<S> {
        self.tracker
    }
}
