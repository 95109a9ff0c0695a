//! Per-session bookkeeping

use serde::Serialize;

use super::TyreCompound;
use crate::types::Record;

/// Latched tyre information, cleared on every new lap or session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TyreLatch {
    pub compound: TyreCompound,
    pub age_laps: u64,
}

/// State of the active session.
///
/// Created on the first session body and replaced, never merged, whenever
/// the session UID changes.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub session_id: u64,
    /// Wall-clock label assigned when the session was first seen
    pub label: String,
    pub current_lap: u32,
    pub current_sector: u8,
    /// Sector times in milliseconds; never negative, reset together
    pub sector_times: [u32; 3],
    /// Most recent unpaired motion sample
    pub pending_motion: Option<Record>,
    pub tyre: Option<TyreLatch>,
}

impl SessionState {
    pub fn new(session_id: u64, label: String) -> Self {
        Self {
            session_id,
            label,
            current_lap: 0,
            current_sector: 0,
            sector_times: [0; 3],
            pending_motion: None,
            tyre: None,
        }
    }

    /// Clear the per-lap sub-state after a lap boundary.
    pub fn reset_lap(&mut self) {
        self.current_sector = 0;
        self.sector_times = [0; 3];
        self.tyre = None;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: Some(self.session_id),
            label: Some(self.label.clone()),
            current_lap: self.current_lap,
            current_sector: self.current_sector,
            sector_times: self.sector_times,
            tyre: self.tyre,
        }
    }
}

/// Cloneable view of the session state published to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// `None` until the first session body arrives
    pub session_id: Option<u64>,
    pub label: Option<String>,
    pub current_lap: u32,
    pub current_sector: u8,
    pub sector_times: [u32; 3],
    pub tyre: Option<TyreLatch>,
}

impl SessionSnapshot {
    pub fn has_session(&self) -> bool {
        self.session_id.is_some()
    }
}
