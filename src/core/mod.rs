//! Core module containing the protocol engine
//!
//! This module provides:
//! - Protocol decoding (checksum, tokenizer, unit resolver, message decoder)
//! - Transport layer for serial and scripted devices
//! - Device discovery across ports and baud rates
//! - Automatic-mode session management
//! - Reading sinks

pub mod discovery;
pub mod protocol;
pub mod session;
pub mod sink;
pub mod transport;
