//! WXT520 ASCII protocol
//!
//! Provides the decoding pipeline for automatic-mode frames:
//! - Checksum verification (CRC-16 packed into three printable characters)
//! - Frame tokenizing into header and `label=value` fields
//! - Unit resolution per field group
//! - Message decoding into typed readings

pub mod checksum;
pub mod error;
pub mod frame;
pub mod message;
pub mod units;

pub use checksum::{compute as compute_checksum, verify as verify_checksum};
pub use error::DecodeError;
pub use frame::{encode_frame, tokenize, Frame, Header, Token};
pub use message::{decode, decode_line, FlatField, MessageType, Reading, ReadingData};
pub use units::{resolve, FieldGroup, Unit, UnitValue};
