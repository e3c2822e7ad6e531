//! Transport layer
//!
//! The protocol engine talks to the device through a line-oriented,
//! blocking byte stream. Every read is bounded by a timeout and returns
//! an empty line when nothing arrived, so callers never block forever.
//!
//! Supports:
//! - Serial ports (RS-232, RS-485, USB-Serial) via `serialport`
//! - Scripted in-memory devices for tests and dry runs

mod scripted;
mod serial;

pub use scripted::{ScriptedOpener, ScriptedTransport};
pub use serial::{list_ports, SerialConfig, SerialOpener, SerialTransport};

use std::time::Duration;
use thiserror::Error;

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Port enumeration failed
    #[error("Cannot list serial ports: {0}")]
    Enumeration(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Disconnected
    #[error("Disconnected")]
    Disconnected,
}

/// Open, line-oriented connection to a device. Dropping it closes it.
pub trait LineTransport: Send {
    /// Write all bytes
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Read up to and including the next `\n`. Returns whatever arrived
    /// before the timeout, which is empty when the line stayed silent.
    fn read_line(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Discard anything received but not yet read
    fn flush_input(&mut self) -> Result<(), TransportError>;

    /// Get connection info string
    fn connection_info(&self) -> String;
}

/// Factory for transports, one per (port, baud) combination
pub trait PortOpener {
    /// Names of ports that may have a device attached
    fn available_ports(&self) -> Result<Vec<String>, TransportError>;

    /// Open `port` at `baud` with the given read timeout
    fn open(
        &self,
        port: &str,
        baud: u32,
        timeout: Duration,
    ) -> Result<Box<dyn LineTransport>, TransportError>;
}

/// Substring search on raw device responses
pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}
