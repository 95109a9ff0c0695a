//! Collector configuration
//!
//! Configuration is a small YAML document; every field has a default, so an
//! empty document is valid:
//!
//! ```yaml
//! listen: 0.0.0.0:20777
//! spec: specs/f1_2021.h     # omit to use the embedded F1 2021 specification
//! packet_format: 2021
//! max_datagram_size: 2048
//! sink:
//!   bucket: f1-telemetry
//!   org: my-org
//!   tags:
//!     rig: sim-1
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::schema::{F1_2021_SPEC, LayoutRegistry};
use crate::{Result, TelemetryError};

/// UDP port the game sends telemetry to by default.
pub const DEFAULT_PORT: u16 = 20777;

/// Largest datagram the game sends for the supported formats, rounded up.
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 2048;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the UDP socket binds to
    pub listen: SocketAddr,
    /// Wire-format specification file; the embedded F1 2021 one when absent
    pub spec: Option<PathBuf>,
    /// `packetFormat` the dispatch table is keyed on
    pub packet_format: u16,
    /// Receive buffer size in bytes
    pub max_datagram_size: usize,
    pub sink: SinkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            spec: None,
            packet_format: 2021,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            sink: SinkConfig::default(),
        }
    }
}

/// Destination settings for written points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SinkConfig {
    pub bucket: String,
    pub org: Option<String>,
    /// Static tags attached to every point
    pub tags: BTreeMap<String, String>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self { bucket: "f1-telemetry".to_string(), org: None, tags: BTreeMap::new() }
    }
}

impl Config {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty mapping
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml_ng::from_str(yaml)
            .map_err(|e| TelemetryError::config(format!("YAML parsing failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| TelemetryError::io(format!("reading config {}", path.display()), e))?;
        debug!(path = %path.display(), "Loaded configuration file");
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sink.bucket.trim().is_empty() {
            return Err(TelemetryError::config("sink.bucket must not be empty"));
        }
        if self.max_datagram_size == 0 {
            return Err(TelemetryError::config("max_datagram_size must be greater than zero"));
        }
        if self.sink.tags.keys().any(|key| key.trim().is_empty()) {
            return Err(TelemetryError::config("sink.tags keys must not be empty"));
        }
        Ok(())
    }

    /// Compile the configured specification, or the embedded one.
    pub fn compile_spec(&self) -> Result<LayoutRegistry> {
        match &self.spec {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| TelemetryError::io(format!("reading spec {}", path.display()), e))?;
                LayoutRegistry::compile(&text)
            }
            None => LayoutRegistry::compile(F1_2021_SPEC),
        }
    }
}
