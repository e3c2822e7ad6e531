//! Serial port transport implementation

use super::{LineTransport, PortOpener, TransportError};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::debug;

/// Serial port configuration
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name (e.g., COM3, /dev/ttyUSB0)
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Upper bound for a single line read
    pub timeout: Duration,
}

impl SerialConfig {
    /// Create a new serial configuration with a one second read timeout
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
            timeout: Duration::from_secs(1),
        }
    }

    /// Set read timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Serial port transport, 8N1 without flow control
pub struct SerialTransport {
    config: SerialConfig,
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
}

impl SerialTransport {
    /// Open the port described by `config`
    pub fn open(config: SerialConfig) -> Result<Self, TransportError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .timeout(config.timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => TransportError::PortNotFound(config.port.clone()),
                serialport::ErrorKind::Io(io_kind) => match io_kind {
                    ErrorKind::PermissionDenied => {
                        TransportError::PermissionDenied(config.port.clone())
                    }
                    ErrorKind::NotFound => TransportError::PortNotFound(config.port.clone()),
                    _ => TransportError::ConnectionFailed(e.to_string()),
                },
                _ => TransportError::ConnectionFailed(e.to_string()),
            })?;

        debug!("Opened {} @ {} baud", config.port, config.baud_rate);

        Ok(Self {
            config,
            port,
            pending: Vec::new(),
        })
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        let end = self.pending.iter().position(|&b| b == b'\n')? + 1;
        let rest = self.pending.split_off(end);
        Some(std::mem::replace(&mut self.pending, rest))
    }
}

impl LineTransport for SerialTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + self.config.timeout;
        let mut buffer = [0u8; 256];

        loop {
            if let Some(line) = self.take_line() {
                return Ok(line);
            }
            let Some(remaining) = remaining_until(deadline, Instant::now()) else {
                return Ok(std::mem::take(&mut self.pending));
            };
            self.port
                .set_timeout(remaining)
                .map_err(|e| TransportError::IoError(e.into()))?;

            match self.port.read(&mut buffer) {
                Ok(0) => return Err(TransportError::Disconnected),
                Ok(n) => self.pending.extend_from_slice(&buffer[..n]),
                Err(ref e) if e.kind() == ErrorKind::TimedOut => {
                    // Partial line or nothing at all
                    return Ok(std::mem::take(&mut self.pending));
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(TransportError::IoError(e)),
            }
        }
    }

    fn flush_input(&mut self) -> Result<(), TransportError> {
        self.pending.clear();
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| TransportError::IoError(e.into()))
    }

    fn connection_info(&self) -> String {
        format!("{} @ {} baud (8N1)", self.config.port, self.config.baud_rate)
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        debug!("Closing {}", self.config.port);
    }
}

/// Time left before `deadline`, `None` once it has passed
fn remaining_until(deadline: Instant, now: Instant) -> Option<Duration> {
    Some(deadline.saturating_duration_since(now)).filter(|d| !d.is_zero())
}

/// Opens real serial ports
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialOpener;

impl PortOpener for SerialOpener {
    fn available_ports(&self) -> Result<Vec<String>, TransportError> {
        Ok(list_ports()?.into_iter().map(|p| p.port_name).collect())
    }

    fn open(
        &self,
        port: &str,
        baud: u32,
        timeout: Duration,
    ) -> Result<Box<dyn LineTransport>, TransportError> {
        let config = SerialConfig::new(port, baud).timeout(timeout);
        Ok(Box::new(SerialTransport::open(config)?))
    }
}

/// List available serial ports
pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>, TransportError> {
    serialport::available_ports().map_err(|e| TransportError::Enumeration(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_are_bounded_by_the_line_deadline() {
        let start = Instant::now();
        let deadline = start + Duration::from_millis(1000);

        assert_eq!(remaining_until(deadline, start), Some(Duration::from_millis(1000)));
        assert_eq!(
            remaining_until(deadline, start + Duration::from_millis(900)),
            Some(Duration::from_millis(100))
        );
        assert_eq!(remaining_until(deadline, deadline), None);
        assert_eq!(remaining_until(deadline, deadline + Duration::from_millis(5)), None);
    }

    #[test]
    fn test_config_builder() {
        let config = SerialConfig::new("/dev/ttyUSB0", 19200).timeout(Duration::from_millis(250));
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 19200);
        assert_eq!(config.timeout, Duration::from_millis(250));
    }
}
