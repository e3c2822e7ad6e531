//! Automatic-mode session
//!
//! A session owns the transport to one device. Establishing it switches the
//! device into ASCII automatic mode, after which the device streams frames
//! on its own and the session only reads, verifies and decodes them.

use crate::core::discovery::{DeviceLocation, READ_TIMEOUT, SETTLE_INTERVAL};
use crate::core::protocol::{checksum, frame, message, DecodeError, Reading};
use crate::core::transport::{contains, LineTransport, PortOpener, TransportError};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Default baud rate of a device configured by port and address
pub const SESSION_BAUD: u32 = 9600;

/// Marker the device echoes when it accepts automatic mode
pub const AUTOMATIC_MODE_ACK: &[u8] = b",M=a";

/// Session error types
#[derive(Error, Debug)]
pub enum SessionError {
    /// Transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Device did not acknowledge the automatic mode command
    #[error("No answer to ASCII automatic mode setting on {port} (got {response:?})")]
    ModeNotAcknowledged {
        /// Connection the command was sent on
        port: String,
        /// Reply as text, empty on timeout
        response: String,
    },

    /// Verified frame with a structural problem
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Read timeout for every line
    pub timeout: Duration,
    /// Delay after opening the port
    pub settle: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: READ_TIMEOUT,
            settle: SETTLE_INTERVAL,
        }
    }
}

/// Session statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Non-empty lines read
    pub lines_read: u64,
    /// Reads that timed out without data
    pub empty_reads: u64,
    /// Lines dropped for a bad checksum
    pub checksum_failures: u64,
    /// Verified frames of a message type that is not decoded
    pub ignored: u64,
    /// Readings produced
    pub readings: u64,
    /// Verified frames that failed to decode
    pub decode_errors: u64,
}

/// `<address>XU,M=a\r\n`
pub fn automatic_mode_request(address: char) -> Vec<u8> {
    format!("{address}XU,M=a\r\n").into_bytes()
}

/// Live session with a device in automatic mode
pub struct Session {
    transport: Box<dyn LineTransport>,
    address: char,
    automatic: bool,
    stats: SessionStats,
}

impl Session {
    /// Open `location` at the baud rate it was found or configured at and
    /// switch the device into automatic mode
    pub fn establish(
        opener: &dyn PortOpener,
        location: &DeviceLocation,
        config: &SessionConfig,
    ) -> Result<Self, SessionError> {
        let transport = opener.open(&location.port, location.baud, config.timeout)?;
        Self::start(transport, location.address, config.settle)
    }

    /// Switch the device behind an already opened transport into automatic
    /// mode. The transport is closed if the device does not acknowledge.
    pub fn start(
        mut transport: Box<dyn LineTransport>,
        address: char,
        settle: Duration,
    ) -> Result<Self, SessionError> {
        thread::sleep(settle);
        transport.flush_input()?;
        transport.write_all(&automatic_mode_request(address))?;

        let response = transport.read_line()?;
        if !contains(&response, AUTOMATIC_MODE_ACK) {
            let port = transport.connection_info();
            drop(transport);
            error!("No answer to ASCII automatic mode setting on {}", port);
            return Err(SessionError::ModeNotAcknowledged {
                port,
                response: String::from_utf8_lossy(response.trim_ascii()).into_owned(),
            });
        }

        info!(
            "Device {} in automatic mode on {}",
            address,
            transport.connection_info()
        );

        Ok(Self {
            transport,
            address,
            automatic: true,
            stats: SessionStats::default(),
        })
    }

    /// Device address
    pub fn address(&self) -> char {
        self.address
    }

    /// Whether the device acknowledged automatic mode
    pub fn is_automatic(&self) -> bool {
        self.automatic
    }

    /// Statistics since the session started
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Get connection info string
    pub fn connection_info(&self) -> String {
        self.transport.connection_info()
    }

    /// Read one line and return it if its checksum is valid.
    ///
    /// `Ok(None)` on timeout or checksum failure. A rejected line is
    /// discarded; the next call reads the next line.
    pub fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let line = self.transport.read_line()?;
        if line.is_empty() {
            self.stats.empty_reads += 1;
            return Ok(None);
        }
        self.stats.lines_read += 1;

        if !checksum::verify(&line) {
            self.stats.checksum_failures += 1;
            warn!(
                "Dropping frame with bad checksum: {:?}",
                String::from_utf8_lossy(line.trim_ascii())
            );
            return Ok(None);
        }

        Ok(Some(line))
    }

    /// Read, verify and decode the next frame.
    ///
    /// `Ok(None)` when there is nothing to report this cycle: timeout, bad
    /// checksum or a message type that is not decoded. Structural problems
    /// in a verified frame are returned as [`SessionError::Decode`].
    pub fn next_reading(&mut self) -> Result<Option<Reading>, SessionError> {
        let Some(line) = self.read_frame()? else {
            return Ok(None);
        };

        let decoded = frame::tokenize(&line).and_then(|f| message::decode(&f));
        match decoded {
            Ok(Some(reading)) => {
                self.stats.readings += 1;
                debug!("{} reading from {}", reading.message_type(), reading.address);
                Ok(Some(reading))
            }
            Ok(None) => {
                self.stats.ignored += 1;
                Ok(None)
            }
            Err(e) => {
                self.stats.decode_errors += 1;
                Err(e.into())
            }
        }
    }

    /// Close the transport
    pub fn close(self) {
        info!(
            "Closing session with device {} ({} readings)",
            self.address, self.stats.readings
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::{encode_frame, ReadingData};
    use crate::core::transport::{ScriptedOpener, ScriptedTransport};

    fn location(port: &str, address: char) -> DeviceLocation {
        DeviceLocation {
            port: port.to_string(),
            address,
            baud: SESSION_BAUD,
        }
    }

    fn fast_config() -> SessionConfig {
        SessionConfig {
            settle: Duration::ZERO,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_establish_sends_mode_command_for_address() {
        let device = ScriptedTransport::wxt520('4');
        let opener = ScriptedOpener::new().with_device("ttyUSB0", 9600, device.clone());

        let session = Session::establish(&opener, &location("ttyUSB0", '4'), &fast_config()).unwrap();
        assert!(session.is_automatic());
        assert_eq!(session.address(), '4');
        assert_eq!(device.written(), vec![b"4XU,M=a\r\n".to_vec()]);
    }

    #[test]
    fn test_establish_opens_at_location_baud() {
        let device = ScriptedTransport::wxt520('1');
        let opener = ScriptedOpener::new().with_device("ttyUSB0", 19200, device);
        let location = DeviceLocation {
            baud: 19200,
            ..location("ttyUSB0", '1')
        };

        let session = Session::establish(&opener, &location, &fast_config()).unwrap();
        assert!(session.is_automatic());
        assert_eq!(opener.opened(), vec![("ttyUSB0".to_string(), 19200)]);
    }

    #[test]
    fn test_missing_ack_closes_transport() {
        let device = ScriptedTransport::new().reply(b"0XU,M=a\r\n", b"0XU,M=P\r\n");
        let opener = ScriptedOpener::new().with_device("ttyUSB0", 9600, device.clone());

        let err = Session::establish(&opener, &location("ttyUSB0", '0'), &fast_config())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SessionError::ModeNotAcknowledged { ref response, .. } if response == "0XU,M=P"
        ));
        assert_eq!(device.closed_count(), 1);
    }

    #[test]
    fn test_bad_checksum_does_not_poison_next_frame() {
        let payload = b"0r1,Dn=045D,Dm=090D,Dx=180D,Sn=1.1M,Sm=2.2M,Sx=3.3M";
        let good = encode_frame(payload);
        let mut bad = good.clone();
        let crc_pos = payload.len();
        bad[crc_pos] = if bad[crc_pos] == b'@' { b'A' } else { b'@' };

        let device = ScriptedTransport::wxt520('0').stream_line(&bad).stream_line(&good);
        let opener = ScriptedOpener::new().with_device("ttyUSB0", 9600, device);
        let mut session =
            Session::establish(&opener, &location("ttyUSB0", '0'), &fast_config()).unwrap();

        assert!(session.next_reading().unwrap().is_none());
        let reading = session.next_reading().unwrap().unwrap();
        assert!(matches!(reading.data, ReadingData::Wind(_)));

        // stream exhausted, reads time out
        assert!(session.next_reading().unwrap().is_none());

        let stats = session.stats();
        assert_eq!(stats.checksum_failures, 1);
        assert_eq!(stats.readings, 1);
        assert_eq!(stats.empty_reads, 1);
    }

    #[test]
    fn test_unknown_code_and_decode_error() {
        let device = ScriptedTransport::wxt520('0')
            .stream_line(&encode_frame(b"0r9,Xx=1.0X"))
            .stream_line(&encode_frame(b"0r2,Ta=23.6C"));
        let opener = ScriptedOpener::new().with_device("ttyUSB0", 9600, device);
        let mut session =
            Session::establish(&opener, &location("ttyUSB0", '0'), &fast_config()).unwrap();

        assert!(session.next_reading().unwrap().is_none());
        assert!(matches!(
            session.next_reading(),
            Err(SessionError::Decode(DecodeError::MissingField { label: "Tp", .. }))
        ));
        assert_eq!(session.stats().ignored, 1);
        assert_eq!(session.stats().decode_errors, 1);
    }
}
