//! Scripted in-memory transport
//!
//! Replays canned device responses: each written request may trigger one
//! reply line, and a queue of unsolicited lines stands in for the frames a
//! device streams in automatic mode. Clones share one log of written
//! requests and closed handles so tests can inspect a transport after it
//! was moved into a session.

use super::{LineTransport, PortOpener, TransportError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct ScriptLog {
    written: Vec<Vec<u8>>,
    closed: usize,
}

/// In-memory device
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    replies: Vec<(Vec<u8>, Vec<u8>)>,
    stream: VecDeque<Vec<u8>>,
    pending: VecDeque<Vec<u8>>,
    log: Arc<Mutex<ScriptLog>>,
    handed_out: bool,
}

impl ScriptedTransport {
    /// A device that never answers
    pub fn new() -> Self {
        Self::default()
    }

    /// A WXT520 at `address` answering the address query, settings and
    /// automatic-mode requests
    pub fn wxt520(address: char) -> Self {
        Self::new()
            .reply(b"?\r\n", format!("{address}\r\n").as_bytes())
            .reply(
                format!("{address}XU\r\n").as_bytes(),
                format!(
                    "{address}XU,A={address},M=P,T=0,C=2,I=0,B=19200,D=8,P=N,S=1,L=25,N=WXT520,V=3.64\r\n"
                )
                .as_bytes(),
            )
            .reply(
                format!("{address}XU,M=a\r\n").as_bytes(),
                format!("{address}XU,M=a\r\n").as_bytes(),
            )
    }

    /// Answer `request` with `reply`. A later rule for the same request wins.
    #[must_use]
    pub fn reply(mut self, request: &[u8], reply: &[u8]) -> Self {
        self.replies.insert(0, (request.to_vec(), reply.to_vec()));
        self
    }

    /// Queue an unsolicited line, read once no reply is pending
    #[must_use]
    pub fn stream_line(mut self, line: &[u8]) -> Self {
        self.stream.push_back(line.to_vec());
        self
    }

    /// Requests written so far, across all clones
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.log.lock().written.clone()
    }

    /// Number of handles returned by [`ScriptedOpener::open`] that were
    /// dropped again
    pub fn closed_count(&self) -> usize {
        self.log.lock().closed
    }
}

impl LineTransport for ScriptedTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.log.lock().written.push(data.to_vec());
        if let Some((_, reply)) = self.replies.iter().find(|(request, _)| request == data) {
            self.pending.push_back(reply.clone());
        }
        Ok(())
    }

    fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
        Ok(self
            .pending
            .pop_front()
            .or_else(|| self.stream.pop_front())
            .unwrap_or_default())
    }

    fn flush_input(&mut self) -> Result<(), TransportError> {
        self.pending.clear();
        Ok(())
    }

    fn connection_info(&self) -> String {
        "scripted device".to_string()
    }
}

impl Drop for ScriptedTransport {
    fn drop(&mut self) {
        if self.handed_out {
            self.log.lock().closed += 1;
        }
    }
}

#[derive(Debug)]
struct ScriptedPort {
    name: String,
    device: Option<(u32, ScriptedTransport)>,
}

/// Opener over a fixed set of named ports
#[derive(Debug, Default)]
pub struct ScriptedOpener {
    ports: Vec<ScriptedPort>,
    opened: Mutex<Vec<(String, u32)>>,
}

impl ScriptedOpener {
    /// No ports at all
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a port with `device` answering at `baud`. Other baud rates
    /// give a silent line.
    #[must_use]
    pub fn with_device(mut self, port: &str, baud: u32, device: ScriptedTransport) -> Self {
        self.ports.push(ScriptedPort {
            name: port.to_string(),
            device: Some((baud, device)),
        });
        self
    }

    /// Add a port with nothing attached
    #[must_use]
    pub fn with_silent_port(mut self, port: &str) -> Self {
        self.ports.push(ScriptedPort {
            name: port.to_string(),
            device: None,
        });
        self
    }

    /// Every (port, baud) opened so far, in order
    pub fn opened(&self) -> Vec<(String, u32)> {
        self.opened.lock().clone()
    }
}

impl PortOpener for ScriptedOpener {
    fn available_ports(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.ports.iter().map(|p| p.name.clone()).collect())
    }

    fn open(
        &self,
        port: &str,
        baud: u32,
        _timeout: Duration,
    ) -> Result<Box<dyn LineTransport>, TransportError> {
        let entry = self
            .ports
            .iter()
            .find(|p| p.name == port)
            .ok_or_else(|| TransportError::PortNotFound(port.to_string()))?;
        self.opened.lock().push((port.to_string(), baud));

        let mut transport = match &entry.device {
            Some((device_baud, device)) if *device_baud == baud => device.clone(),
            _ => ScriptedTransport::new(),
        };
        transport.handed_out = true;
        Ok(Box::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_then_stream() {
        let mut device = ScriptedTransport::wxt520('0').stream_line(b"frame\r\n");
        assert_eq!(device.read_line().unwrap(), b"frame\r\n");
        assert!(device.read_line().unwrap().is_empty());

        device.write_all(b"?\r\n").unwrap();
        assert_eq!(device.read_line().unwrap(), b"0\r\n");
        assert_eq!(device.written(), vec![b"?\r\n".to_vec()]);
    }

    #[test]
    fn test_flush_drops_pending_reply() {
        let mut device = ScriptedTransport::wxt520('3');
        device.write_all(b"?\r\n").unwrap();
        device.flush_input().unwrap();
        assert!(device.read_line().unwrap().is_empty());
    }

    #[test]
    fn test_opener_tracks_close() {
        let device = ScriptedTransport::wxt520('0');
        let opener = ScriptedOpener::new().with_device("ttyS0", 9600, device.clone());

        let handle = opener.open("ttyS0", 9600, Duration::from_millis(10)).unwrap();
        assert_eq!(device.closed_count(), 0);
        drop(handle);
        assert_eq!(device.closed_count(), 1);

        assert!(opener.open("ttyS9", 9600, Duration::from_millis(10)).is_err());
        assert_eq!(opener.opened(), vec![("ttyS0".to_string(), 9600)]);
    }
}
