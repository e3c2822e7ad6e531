//! Reading sinks
//!
//! Decoded readings leave the protocol engine through a [`ReadingSink`].
//! [`WriterSink`] formats them onto any `std::io::Write` as text, JSON
//! lines or CSV rows.

use crate::core::protocol::Reading;
use chrono::{DateTime, Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use thiserror::Error;

/// Output format for readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One human-readable line per reading
    #[default]
    Text,
    /// One JSON record per line
    Json,
    /// One CSV row per field
    Csv,
}

/// Sink error types
#[derive(Error, Debug)]
pub enum SinkError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Receiver of decoded readings
pub trait ReadingSink {
    /// Hand over one reading
    fn deliver(&mut self, reading: &Reading) -> Result<(), SinkError>;
}

/// Formats readings onto a writer
pub struct WriterSink<W: Write> {
    writer: W,
    format: OutputFormat,
    header_written: bool,
}

impl<W: Write> WriterSink<W> {
    /// Create a sink writing `format` to `writer`
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer,
            format,
            header_written: false,
        }
    }

    /// Get the underlying writer back
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Deliver with an explicit receive time
    pub fn deliver_at(&mut self, reading: &Reading, at: DateTime<Local>) -> Result<(), SinkError> {
        let timestamp = at.to_rfc3339_opts(SecondsFormat::Millis, false);

        match self.format {
            OutputFormat::Text => {
                write!(
                    self.writer,
                    "{} {} [{}]",
                    timestamp,
                    reading.message_type(),
                    reading.address
                )?;
                for field in reading.flatten() {
                    match (field.value, field.unit) {
                        (Some(v), Some(u)) => write!(self.writer, " {}={} {}", field.path, v, u)?,
                        (Some(v), None) => write!(self.writer, " {}={}", field.path, v)?,
                        (None, Some(u)) => write!(self.writer, " {}=\"{}\"", field.path, u)?,
                        (None, None) => {}
                    }
                }
                writeln!(self.writer)?;
            }
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.writer, reading)?;
                writeln!(self.writer)?;
            }
            OutputFormat::Csv => {
                if !self.header_written {
                    writeln!(self.writer, "timestamp,address,type,field,value,unit")?;
                    self.header_written = true;
                }
                for field in reading.flatten() {
                    writeln!(
                        self.writer,
                        "{},{},{},{},{},{}",
                        timestamp,
                        reading.address,
                        reading.message_type(),
                        field.path,
                        field.value.map(|v| v.to_string()).unwrap_or_default(),
                        field.unit.unwrap_or_default()
                    )?;
                }
            }
        }

        self.writer.flush()?;
        Ok(())
    }
}

impl<W: Write> ReadingSink for WriterSink<W> {
    fn deliver(&mut self, reading: &Reading) -> Result<(), SinkError> {
        self.deliver_at(reading, Local::now())
    }
}
