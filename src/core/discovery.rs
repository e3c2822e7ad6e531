//! Device discovery
//!
//! Finds a WXT520 on an unknown port, baud rate and address. Candidates
//! (port × baud) are tried in order; each is sent the broadcast
//! query `?`, which any device on the line answers with its address, and
//! the answer is confirmed by requesting the communication settings and
//! looking for the model identifier. The scan stops at the first
//! confirmed candidate.

use crate::core::transport::{contains, LineTransport, PortOpener, TransportError};
use serde::Serialize;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Baud rates tried during discovery
pub const DEFAULT_BAUDS: &[u32] = &[9600];

/// Model identifier expected in the settings reply
pub const MODEL_ID: &str = "WXT520";

/// Delay between opening a port and talking to the device
pub const SETTLE_INTERVAL: Duration = Duration::from_millis(100);

/// Default bound on a single line read
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Broadcast address query
pub const ADDRESS_QUERY: &[u8] = b"?\r\n";

/// Discovery configuration
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Baud rates tried on every port, in order
    pub bauds: Vec<u32>,
    /// Read timeout per request
    pub timeout: Duration,
    /// Delay after opening a port
    pub settle: Duration,
    /// Substring identifying the device model in the settings reply
    pub model_id: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            bauds: DEFAULT_BAUDS.to_vec(),
            timeout: READ_TIMEOUT,
            settle: SETTLE_INTERVAL,
            model_id: MODEL_ID.to_string(),
        }
    }
}

/// Where a device was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceLocation {
    /// Port name
    pub port: String,
    /// Device address
    pub address: char,
    /// Baud rate the device answered at
    pub baud: u32,
}

/// Result of a full scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// First confirmed device
    Found(DeviceLocation),
    /// Every candidate was tried without success
    NotFound,
}

/// One (port, baud) combination to try
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Port name
    pub port: String,
    /// Baud rate
    pub baud: u32,
}

/// Result of probing one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifyOutcome {
    /// Nothing answered the address query
    NoResponse,
    /// The answer did not start with an address character
    NotAnAddress(u8),
    /// A device answered but the settings reply lacks the model identifier
    IdentityMismatch {
        /// Address that answered
        address: char,
        /// Settings reply as text
        response: String,
    },
    /// Device confirmed at this address
    Confirmed(char),
}

/// Candidates in scan order: every baud rate of the first port, then the next port
pub fn candidates<'a>(ports: &'a [String], bauds: &'a [u32]) -> impl Iterator<Item = Candidate> + 'a {
    ports.iter().flat_map(move |port| {
        bauds.iter().map(move |&baud| Candidate {
            port: port.clone(),
            baud,
        })
    })
}

/// Identify the device behind an opened transport
pub fn identify(
    transport: &mut dyn LineTransport,
    config: &DiscoveryConfig,
) -> Result<IdentifyOutcome, TransportError> {
    thread::sleep(config.settle);
    transport.flush_input()?;
    transport.write_all(ADDRESS_QUERY)?;

    let response = transport.read_line()?;
    let Some(&first) = response.first() else {
        return Ok(IdentifyOutcome::NoResponse);
    };
    if !first.is_ascii_alphanumeric() {
        return Ok(IdentifyOutcome::NotAnAddress(first));
    }
    let address = char::from(first);

    transport.flush_input()?;
    transport.write_all(&settings_request(address))?;
    let settings = transport.read_line()?;

    if contains(&settings, config.model_id.as_bytes()) {
        Ok(IdentifyOutcome::Confirmed(address))
    } else {
        Ok(IdentifyOutcome::IdentityMismatch {
            address,
            response: String::from_utf8_lossy(settings.trim_ascii()).into_owned(),
        })
    }
}

/// `<address>XU\r\n`
pub fn settings_request(address: char) -> Vec<u8> {
    format!("{address}XU\r\n").into_bytes()
}

fn try_candidate(
    opener: &dyn PortOpener,
    candidate: &Candidate,
    config: &DiscoveryConfig,
) -> Option<DeviceLocation> {
    let mut transport = match opener.open(&candidate.port, candidate.baud, config.timeout) {
        Ok(transport) => transport,
        Err(e) => {
            warn!("Skipping {} @ {} baud: {}", candidate.port, candidate.baud, e);
            return None;
        }
    };

    match identify(transport.as_mut(), config) {
        Ok(IdentifyOutcome::Confirmed(address)) => {
            info!(
                "Found {} at address {} on {}",
                config.model_id,
                address,
                transport.connection_info()
            );
            Some(DeviceLocation {
                port: candidate.port.clone(),
                address,
                baud: candidate.baud,
            })
        }
        Ok(outcome) => {
            debug!("{} @ {} baud: {:?}", candidate.port, candidate.baud, outcome);
            None
        }
        Err(e) => {
            warn!("Query of {} @ {} baud failed: {}", candidate.port, candidate.baud, e);
            None
        }
    }
}

/// Scan every available port at every configured baud rate.
///
/// Ports that fail to open are skipped. Each queried transport is closed
/// before the next candidate is opened.
pub fn discover(
    opener: &dyn PortOpener,
    config: &DiscoveryConfig,
) -> Result<Discovery, TransportError> {
    let ports = opener.available_ports()?;
    info!("Scanning {} port(s) for a {}", ports.len(), config.model_id);

    let found = candidates(&ports, &config.bauds)
        .find_map(|candidate| try_candidate(opener, &candidate, config));

    Ok(match found {
        Some(location) => Discovery::Found(location),
        None => {
            info!("No {} found", config.model_id);
            Discovery::NotFound
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::{ScriptedOpener, ScriptedTransport};
    use mockall::mock;

    mock! {
        Opener {}
        impl PortOpener for Opener {
            fn available_ports(&self) -> Result<Vec<String>, TransportError>;
            fn open(
                &self,
                port: &str,
                baud: u32,
                timeout: Duration,
            ) -> Result<Box<dyn LineTransport>, TransportError>;
        }
    }

    fn fast_config(bauds: &[u32]) -> DiscoveryConfig {
        DiscoveryConfig {
            bauds: bauds.to_vec(),
            settle: Duration::ZERO,
            timeout: Duration::from_millis(10),
            ..DiscoveryConfig::default()
        }
    }

    #[test]
    fn test_candidates_order() {
        let ports = vec!["a".to_string(), "b".to_string()];
        let order: Vec<(String, u32)> = candidates(&ports, &[9600, 19200])
            .map(|c| (c.port, c.baud))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a".to_string(), 9600),
                ("a".to_string(), 19200),
                ("b".to_string(), 9600),
                ("b".to_string(), 19200),
            ]
        );
    }

    #[test]
    fn test_identify_confirms_device() {
        let mut device = ScriptedTransport::wxt520('A');
        let outcome = identify(&mut device, &fast_config(&[9600])).unwrap();
        assert_eq!(outcome, IdentifyOutcome::Confirmed('A'));
        assert_eq!(device.written(), vec![b"?\r\n".to_vec(), b"AXU\r\n".to_vec()]);
    }

    #[test]
    fn test_identify_outcomes() {
        let config = fast_config(&[9600]);

        let mut silent = ScriptedTransport::new();
        assert_eq!(identify(&mut silent, &config).unwrap(), IdentifyOutcome::NoResponse);

        let mut garbage = ScriptedTransport::new().reply(b"?\r\n", b"\r\n");
        assert_eq!(identify(&mut garbage, &config).unwrap(), IdentifyOutcome::NotAnAddress(b'\r'));

        let mut other = ScriptedTransport::new()
            .reply(b"?\r\n", b"0\r\n")
            .reply(b"0XU\r\n", b"0XU,N=PTB330\r\n");
        assert_eq!(
            identify(&mut other, &config).unwrap(),
            IdentifyOutcome::IdentityMismatch {
                address: '0',
                response: "0XU,N=PTB330".to_string()
            }
        );
    }

    #[test]
    fn test_discover_stops_at_first_match() {
        let opener = ScriptedOpener::new()
            .with_silent_port("ttyS0")
            .with_device("ttyUSB0", 19200, ScriptedTransport::wxt520('1'))
            .with_device("ttyUSB1", 9600, ScriptedTransport::wxt520('2'));

        let result = discover(&opener, &fast_config(&[9600, 19200])).unwrap();
        assert_eq!(
            result,
            Discovery::Found(DeviceLocation {
                port: "ttyUSB0".to_string(),
                address: '1',
                baud: 19200,
            })
        );
        assert_eq!(
            opener.opened(),
            vec![
                ("ttyS0".to_string(), 9600),
                ("ttyS0".to_string(), 19200),
                ("ttyUSB0".to_string(), 9600),
                ("ttyUSB0".to_string(), 19200),
            ]
        );
    }

    #[test]
    fn test_discover_not_found() {
        let opener = ScriptedOpener::new()
            .with_silent_port("ttyS0")
            .with_silent_port("ttyS1");
        assert_eq!(discover(&opener, &fast_config(&[9600])).unwrap(), Discovery::NotFound);
        assert_eq!(opener.opened().len(), 2);
    }

    #[test]
    fn test_discover_skips_ports_that_fail_to_open() {
        let mut opener = MockOpener::new();
        opener
            .expect_available_ports()
            .returning(|| Ok(vec!["busy".to_string(), "ttyUSB0".to_string()]));
        opener.expect_open().times(2).returning(|port, _, _| {
            if port.starts_with("busy") {
                Err(TransportError::PermissionDenied("busy".to_string()))
            } else {
                Ok(Box::new(ScriptedTransport::wxt520('0')) as Box<dyn LineTransport>)
            }
        });

        let result = discover(&opener, &fast_config(&[9600])).unwrap();
        assert_eq!(
            result,
            Discovery::Found(DeviceLocation {
                port: "ttyUSB0".to_string(),
                address: '0',
                baud: 9600,
            })
        );
    }

    #[test]
    fn test_port_listing_failure_propagates() {
        let mut opener = MockOpener::new();
        opener
            .expect_available_ports()
            .returning(|| Err(TransportError::Enumeration("no udev".to_string())));
        opener.expect_open().never();

        assert!(matches!(
            discover(&opener, &fast_config(&[9600])),
            Err(TransportError::Enumeration(_))
        ));
    }
}
