//! # WXT520 Core Library
//!
//! Protocol engine for the Vaisala WXT520 weather transmitter:
//! - Frame checksum (CRC-16 packed into three printable characters)
//! - Frame tokenizer and unit resolver
//! - Wind, PTU, rain and status message decoding
//! - Device discovery over serial ports, baud rates and addresses
//! - Automatic-mode sessions
//!
//! ## Example
//!
//! ```rust,no_run
//! use wxt520_core::{discover, Discovery, DiscoveryConfig, SerialOpener, Session, SessionConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let opener = SerialOpener;
//!     let Discovery::Found(location) = discover(&opener, &DiscoveryConfig::default())? else {
//!         anyhow::bail!("no WXT520 attached");
//!     };
//!
//!     let mut session = Session::establish(&opener, &location, &SessionConfig::default())?;
//!     loop {
//!         if let Some(reading) = session.next_reading()? {
//!             println!("{}", serde_json::to_string(&reading)?);
//!         }
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes};
pub use crate::config::AppConfig;
pub use crate::core::discovery::{discover, DeviceLocation, Discovery, DiscoveryConfig};
pub use crate::core::protocol::{DecodeError, MessageType, Reading, ReadingData, Unit, UnitValue};
pub use crate::core::session::{Session, SessionConfig, SessionError};
pub use crate::core::sink::{OutputFormat, ReadingSink, WriterSink};
pub use crate::core::transport::{
    LineTransport, PortOpener, ScriptedOpener, ScriptedTransport, SerialOpener, TransportError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
