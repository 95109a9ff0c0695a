//! Error types for telemetry ingestion.
//!
//! Every failure the collector can observe is a variant of [`TelemetryError`].
//! The variants fall into two groups:
//!
//! - **Startup faults**: the wire-format specification does not compile, or the
//!   configuration is unusable. These abort startup; no registry is published.
//! - **Datagram faults**: a single datagram (or record) could not be used. UDP
//!   loss and corruption are normal operating conditions, so these are dropped
//!   and the receive loop carries on with the next datagram.
//!
//! ```rust
//! use boxbox::TelemetryError;
//!
//! let error = TelemetryError::size_mismatch("PacketLapData", 970, 969);
//! assert!(!error.is_fatal());
//!
//! let error = TelemetryError::spec_syntax(12, "expected ';' after field name");
//! assert!(error.is_fatal());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Specification syntax error at line {line}: {details}")]
    SpecSyntax { line: usize, details: String },

    #[error("Unresolved type '{name}' referenced by '{referenced_by}'")]
    UnresolvedType { name: String, referenced_by: String },

    #[error("Invalid layout '{layout}': {details}")]
    InvalidLayout { layout: String, details: String },

    #[error("Unknown packet kind: format={format}, version={version}, id={packet_id}")]
    UnknownPacket { format: u16, version: u8, packet_id: u8 },

    #[error("Structural size mismatch in {layout}: expected {expected} bytes, got {actual}")]
    SizeMismatch { layout: String, expected: usize, actual: usize },

    #[error("Datagram truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Car index {index} out of range for {len} decoded records")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Car telemetry received without a paired motion sample")]
    UnpairedTelemetry,

    #[error("Field '{field}' missing or mistyped in {context}")]
    FieldNotFound { field: String, context: String },

    #[error("Sink write failed: {reason}")]
    Sink {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {details}")]
    Config { details: String },
}

impl TelemetryError {
    /// Returns whether this error must abort startup.
    ///
    /// Only specification and configuration faults are fatal; every other
    /// error drops the offending datagram or record.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TelemetryError::SpecSyntax { .. }
                | TelemetryError::UnresolvedType { .. }
                | TelemetryError::InvalidLayout { .. }
                | TelemetryError::Config { .. }
        )
    }

    /// Returns whether the operation that produced this error may succeed if retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Io { .. } => true,
            TelemetryError::Sink { .. } => false,
            TelemetryError::SpecSyntax { .. } => false,
            TelemetryError::UnresolvedType { .. } => false,
            TelemetryError::InvalidLayout { .. } => false,
            TelemetryError::UnknownPacket { .. } => false,
            TelemetryError::SizeMismatch { .. } => false,
            TelemetryError::Truncated { .. } => false,
            TelemetryError::IndexOutOfRange { .. } => false,
            TelemetryError::UnpairedTelemetry => false,
            TelemetryError::FieldNotFound { .. } => false,
            TelemetryError::Config { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::SpecSyntax { .. } => vec![
                "Check the specification for a missing ';', '{' or '}'",
                "Make sure array sizes are plain integers",
            ],
            TelemetryError::UnresolvedType { .. } => vec![
                "Declare structures before the structures that use them",
                "Check the spelling of the type name",
            ],
            TelemetryError::InvalidLayout { .. } => vec![
                "Give every array at least one element",
                "Check for fields whose names collide after m_ prefix stripping",
            ],
            TelemetryError::UnknownPacket { .. } => vec![
                "Set the game's UDP format to match the configured packet format",
                "Ignore if the game sends packet kinds the collector does not track",
            ],
            TelemetryError::SizeMismatch { .. } | TelemetryError::Truncated { .. } => vec![
                "Verify the specification matches the game's UDP format version",
                "Check for datagrams truncated by a small receive buffer",
            ],
            TelemetryError::IndexOutOfRange { .. } => {
                vec!["Check the player car index reported in the packet header"]
            }
            TelemetryError::UnpairedTelemetry => {
                vec!["Enable motion packets in the game's telemetry settings"]
            }
            TelemetryError::FieldNotFound { .. } => vec![
                "Verify the specification declares the fields the tracker reads",
                "Check field names after m_ prefix stripping and snake_case conversion",
            ],
            TelemetryError::Sink { .. } => vec![
                "Check the sink destination is reachable and writable",
                "Points dropped by the sink are not retried",
            ],
            TelemetryError::Io { .. } => vec![
                "Check the UDP port is not already in use",
                "Check file paths and permissions",
            ],
            TelemetryError::Config { .. } => vec![
                "Check the configuration file against the documented fields",
                "Remove the file to fall back to defaults",
            ],
        }
    }

    /// Helper constructor for specification syntax errors.
    pub fn spec_syntax(line: usize, details: impl Into<String>) -> Self {
        TelemetryError::SpecSyntax { line, details: details.into() }
    }

    /// Helper constructor for unresolved type references.
    pub fn unresolved_type(name: impl Into<String>, referenced_by: impl Into<String>) -> Self {
        TelemetryError::UnresolvedType { name: name.into(), referenced_by: referenced_by.into() }
    }

    /// Helper constructor for inconsistent layouts.
    pub fn invalid_layout(layout: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::InvalidLayout { layout: layout.into(), details: details.into() }
    }

    /// Helper constructor for structural size mismatches.
    pub fn size_mismatch(layout: impl Into<String>, expected: usize, actual: usize) -> Self {
        TelemetryError::SizeMismatch { layout: layout.into(), expected, actual }
    }

    /// Helper constructor for missing or mistyped record fields.
    pub fn field_not_found(field: impl Into<String>, context: impl Into<String>) -> Self {
        TelemetryError::FieldNotFound { field: field.into(), context: context.into() }
    }

    /// Helper constructor for sink failures.
    pub fn sink_failed(reason: impl Into<String>) -> Self {
        TelemetryError::Sink { reason: reason.into(), source: None }
    }

    /// Helper constructor for sink failures with an underlying cause.
    pub fn sink_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::Sink { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for I/O errors with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TelemetryError::Io { context: context.into(), source }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        TelemetryError::Config { details: details.into() }
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(err: std::io::Error) -> Self {
        TelemetryError::Io { context: "<unknown>".to_string(), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn error_messages_carry_their_context(
                line in 1usize..10_000,
                details in ".*",
                name in "[A-Za-z_][A-Za-z0-9_]*",
                expected in 0usize..4096,
                actual in 0usize..4096,
            ) {
                let syntax = TelemetryError::spec_syntax(line, details.clone());
                let msg = syntax.to_string();
                prop_assert!(msg.contains(&line.to_string()));
                prop_assert!(msg.contains(&details));

                let unresolved = TelemetryError::unresolved_type(name.clone(), "Packet");
                prop_assert!(unresolved.to_string().contains(&name));

                let mismatch = TelemetryError::size_mismatch(name.clone(), expected, actual);
                let msg = mismatch.to_string();
                prop_assert!(msg.contains(&expected.to_string()));
                prop_assert!(msg.contains(&actual.to_string()));
            }

            #[test]
            fn only_startup_faults_are_fatal(
                format in any::<u16>(),
                version in any::<u8>(),
                packet_id in any::<u8>(),
                index in 0usize..256,
            ) {
                let unknown = TelemetryError::UnknownPacket { format, version, packet_id };
                prop_assert!(!unknown.is_fatal());

                let out_of_range = TelemetryError::IndexOutOfRange { index, len: 22 };
                prop_assert!(!out_of_range.is_fatal());

                prop_assert!(TelemetryError::config("bad").is_fatal());
                prop_assert!(TelemetryError::spec_syntax(1, "bad").is_fatal());
            }
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<TelemetryError>();

        let error = TelemetryError::UnpairedTelemetry;
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn recovery_suggestions_are_actionable() {
        let errors = vec![
            TelemetryError::spec_syntax(3, "missing '}'"),
            TelemetryError::unresolved_type("Foo", "Bar"),
            TelemetryError::invalid_layout("S", "a is an empty array"),
            TelemetryError::UnknownPacket { format: 2021, version: 1, packet_id: 3 },
            TelemetryError::size_mismatch("PacketLapData", 970, 12),
            TelemetryError::IndexOutOfRange { index: 30, len: 22 },
            TelemetryError::UnpairedTelemetry,
            TelemetryError::sink_failed("closed"),
            TelemetryError::config("empty bucket"),
        ];

        for error in &errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty(), "no suggestions for {error}");
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn sink_errors_chain_their_source() {
        let io_err = std::io::Error::other("broken pipe");
        let error = TelemetryError::sink_failed_with_source("write", Box::new(io_err));
        let source = std::error::Error::source(&error).expect("source should be preserved");
        assert_eq!(source.to_string(), "broken pipe");
        assert!(!error.is_retryable());
    }

    #[test]
    fn from_io_error_wraps_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port busy");
        let error: TelemetryError = io_err.into();
        match error {
            TelemetryError::Io { source, .. } => assert_eq!(source.to_string(), "port busy"),
            other => panic!("Expected Io error, got {other:?}"),
        }
    }
}
