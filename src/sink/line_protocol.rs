//! InfluxDB line protocol rendering

use std::fmt::Write as _;
use std::io::Write;

use chrono::Utc;
use tracing::trace;

use super::{FieldValue, Fields, Point, Sink};
use crate::config::SinkConfig;
use crate::{Result, TelemetryError};

/// Writes points as InfluxDB line protocol with millisecond timestamps.
///
/// Configured static tags are attached to every point. Non-finite float
/// fields are skipped because line protocol cannot express them.
#[derive(Debug)]
pub struct LineProtocolSink<W> {
    writer: W,
    bucket: String,
    tags: Vec<(String, String)>,
}

impl<W: Write + Send> LineProtocolSink<W> {
    pub fn new(writer: W, config: &SinkConfig) -> Self {
        let mut tags: Vec<_> = config.tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        if let Some(org) = &config.org {
            tags.retain(|(k, _)| k != "org");
            tags.push(("org".to_string(), org.clone()));
        }
        tags.sort();
        Self { writer, bucket: config.bucket.clone(), tags }
    }

    /// Bucket the points are destined for.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Render one point as a single line, without the trailing newline.
    pub fn render(&self, point: &Point) -> Result<String> {
        let mut line = escape(&point.measurement, &[',', ' ']);
        for (key, value) in &self.tags {
            let _ = write!(line, ",{}={}", escape(key, TAG_SPECIAL), escape(value, TAG_SPECIAL));
        }

        let mut separator = ' ';
        for (key, value) in &point.fields {
            let rendered = match value {
                FieldValue::Int(v) => format!("{}i", v),
                FieldValue::UInt(v) => format!("{}u", v),
                FieldValue::Float(v) if v.is_finite() => format!("{}", v),
                FieldValue::Float(_) => continue,
                FieldValue::Str(s) => format!("\"{}\"", escape_string(s)),
            };
            let _ = write!(line, "{}{}={}", separator, escape(key, TAG_SPECIAL), rendered);
            separator = ',';
        }

        if separator == ' ' {
            return Err(TelemetryError::sink_failed(format!(
                "point '{}' has no writable fields",
                point.measurement
            )));
        }

        let _ = write!(line, " {}", point.timestamp_ms);
        Ok(line)
    }

    fn write_point(&mut self, point: Point) -> Result<()> {
        let line = self.render(&point)?;
        trace!(measurement = %point.measurement, fields = point.fields.len(), "Writing point");
        writeln!(self.writer, "{}", line)
            .and_then(|_| self.writer.flush())
            .map_err(|e| TelemetryError::sink_failed_with_source("line protocol write failed", Box::new(e)))
    }
}

impl<W: Write + Send> Sink for LineProtocolSink<W> {
    fn write_lap_point(&mut self, label: &str, lap: u32, fields: Fields) -> Result<()> {
        self.write_point(Point::lap(label, lap, fields, Utc::now().timestamp_millis()))
    }

    fn write_live_point(&mut self, fields: Fields) -> Result<()> {
        self.write_point(Point::live(fields, Utc::now().timestamp_millis()))
    }
}

const TAG_SPECIAL: &[char] = &[',', '=', ' '];

fn escape(text: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            c if special.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

fn escape_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            // One point per line
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}
