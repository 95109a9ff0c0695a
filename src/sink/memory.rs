//! In-memory sink

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use super::{Fields, Sink};
use crate::Result;

/// A write received by a [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RecordedPoint {
    Lap { label: String, lap: u32, fields: Fields },
    Live { fields: Fields },
}

impl RecordedPoint {
    pub fn fields(&self) -> &Fields {
        match self {
            RecordedPoint::Lap { fields, .. } | RecordedPoint::Live { fields } => fields,
        }
    }

    pub fn lap(&self) -> Option<u32> {
        match self {
            RecordedPoint::Lap { lap, .. } => Some(*lap),
            RecordedPoint::Live { .. } => None,
        }
    }
}

/// Records every write in order. Clones share the same recording, so a
/// handle kept outside a tracker or driver sees what the sink received.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    points: Arc<Mutex<Vec<RecordedPoint>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded write.
    pub fn points(&self) -> Vec<RecordedPoint> {
        self.lock().clone()
    }

    pub fn lap_points(&self) -> Vec<RecordedPoint> {
        self.lock().iter().filter(|p| p.lap().is_some()).cloned().collect()
    }

    pub fn live_points(&self) -> Vec<RecordedPoint> {
        self.lock().iter().filter(|p| p.lap().is_none()).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedPoint>> {
        self.points.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Sink for MemorySink {
    fn write_lap_point(&mut self, label: &str, lap: u32, fields: Fields) -> Result<()> {
        self.lock().push(RecordedPoint::Lap { label: label.to_string(), lap, fields });
        Ok(())
    }

    fn write_live_point(&mut self, fields: Fields) -> Result<()> {
        self.lock().push(RecordedPoint::Live { fields });
        Ok(())
    }
}
