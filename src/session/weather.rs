//! Weather labels and the session weather live point

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sink::{FieldValue, Fields};
use crate::types::Record;

/// At most this many forecast samples are reported.
pub const MAX_FORECAST_SAMPLES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weather {
    Clear,
    LightCloud,
    Overcast,
    LightRain,
    HeavyRain,
    Storm,
}

impl Weather {
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Weather::Clear),
            1 => Some(Weather::LightCloud),
            2 => Some(Weather::Overcast),
            3 => Some(Weather::LightRain),
            4 => Some(Weather::HeavyRain),
            5 => Some(Weather::Storm),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Weather::Clear => "Clear",
            Weather::LightCloud => "Light Cloud",
            Weather::Overcast => "Overcast",
            Weather::LightRain => "Light Rain",
            Weather::HeavyRain => "Heavy Rain",
            Weather::Storm => "Storm",
        }
    }
}

/// Format one forecast sample: the label alone when no rain is expected,
/// otherwise the label followed by the rain percentage on a second line.
pub fn forecast_label(weather: Weather, rain_percentage: u64) -> String {
    if rain_percentage == 0 {
        weather.label().to_string()
    } else {
        format!("{}\n({}%)", weather.label(), rain_percentage)
    }
}

/// Build the weather live point from a decoded `PacketSessionData` body.
///
/// Unknown weather codes drop the affected field only.
pub fn weather_fields(session: &Record) -> Fields {
    let mut fields = Fields::new();

    match session.u64("weather").map(|code| (code, Weather::from_code(code))) {
        Some((_, Some(weather))) => fields.push(("weather".to_string(), weather.label().into())),
        Some((code, None)) => debug!(code, "Unknown weather code"),
        None => debug!("Session body has no weather field"),
    }

    let declared = session.u64("num_weather_forecast_samples").unwrap_or(0);
    let samples = session.array("weather_forecast_samples").unwrap_or(&[]);
    let count = usize::try_from(declared).unwrap_or(usize::MAX).min(MAX_FORECAST_SAMPLES).min(samples.len());

    for (i, sample) in samples.iter().take(count).enumerate() {
        let Some(sample) = sample.as_record() else { continue };
        let Some(code) = sample.u64("weather") else { continue };
        let Some(weather) = Weather::from_code(code) else {
            debug!(code, sample = i, "Unknown forecast weather code");
            continue;
        };
        let rain = sample.u64("rain_percentage").unwrap_or(0);
        fields.push((format!("forecast_{}", i), FieldValue::Str(forecast_label(weather, rain))));
    }

    fields
}
