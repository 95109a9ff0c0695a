//! Tyre positions, compounds and per-tyre array flattening

use serde::{Deserialize, Serialize};

use crate::types::{Record, Value};

/// Canonical order of 4-wide per-tyre arrays on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TyrePosition {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
}

impl TyrePosition {
    pub const ALL: [TyrePosition; 4] =
        [TyrePosition::FrontLeft, TyrePosition::FrontRight, TyrePosition::RearLeft, TyrePosition::RearRight];

    pub fn suffix(self) -> &'static str {
        match self {
            TyrePosition::FrontLeft => "front_left",
            TyrePosition::FrontRight => "front_right",
            TyrePosition::RearLeft => "rear_left",
            TyrePosition::RearRight => "rear_right",
        }
    }
}

/// Visual tyre compound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TyreCompound {
    Soft,
    Medium,
    Hard,
    Inter,
    Wet,
}

impl TyreCompound {
    /// Decode the `visualTyreCompound` code.
    pub fn from_visual_code(code: u64) -> Option<Self> {
        match code {
            16 => Some(TyreCompound::Soft),
            17 => Some(TyreCompound::Medium),
            18 => Some(TyreCompound::Hard),
            7 => Some(TyreCompound::Inter),
            8 => Some(TyreCompound::Wet),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TyreCompound::Soft => "Soft",
            TyreCompound::Medium => "Medium",
            TyreCompound::Hard => "Hard",
            TyreCompound::Inter => "Inter",
            TyreCompound::Wet => "Wet",
        }
    }
}

/// Replace every 4-element scalar array with four fields named
/// `<field>_<position>`, keeping the record's field order.
pub fn flatten_tyre_arrays(record: Record) -> Record {
    let mut out = Record::with_capacity(record.len() + 3 * 4);
    for (name, value) in record {
        match value {
            Value::Array(items) if is_tyre_array(&items) => {
                for (position, item) in TyrePosition::ALL.into_iter().zip(items) {
                    out.insert(format!("{}_{}", name, position.suffix()), item);
                }
            }
            other => out.insert(name, other),
        }
    }
    out
}

fn is_tyre_array(items: &[Value]) -> bool {
    items.len() == TyrePosition::ALL.len() && items.iter().all(Value::is_scalar)
}
