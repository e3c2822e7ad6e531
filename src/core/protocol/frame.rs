//! Frame tokenizer
//!
//! Splits a checksum-verified automatic-mode line such as
//! `0r1,Dn=045D,Dm=090D,...<crc>\r\n` into its header (address and message
//! code) and the ordered `label=value` tokens that follow it.

use super::checksum::{self, CHECKSUM_LEN, MIN_FRAME_LEN};
use super::error::DecodeError;
use super::message::MessageType;
use std::collections::HashMap;

/// Line terminator used by the device in both directions
pub const TERMINATOR: &[u8] = b"\r\n";

/// Leading piece of a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Device address
    pub address: char,
    /// Message code, e.g. `r1`
    pub code: String,
}

/// One `label=value` field. The value still carries its unit character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Field label, e.g. `Sm`
    pub label: String,
    /// Raw value, e.g. `2.2M`
    pub value: String,
}

/// Tokenized frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Address and message code
    pub header: Header,
    /// Fields in wire order
    pub tokens: Vec<Token>,
}

impl Frame {
    /// Message type named by the header, `None` for codes this crate does not decode
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_code(&self.header.code)
    }

    /// Raw values keyed by label. A repeated label keeps its last value.
    pub fn fields(&self) -> HashMap<&str, &str> {
        self.tokens
            .iter()
            .map(|t| (t.label.as_str(), t.value.as_str()))
            .collect()
    }
}

/// Tokenize a frame that has already passed [`checksum::verify`].
pub fn tokenize(frame: &[u8]) -> Result<Frame, DecodeError> {
    let frame = frame.trim_ascii();
    if frame.len() < MIN_FRAME_LEN {
        return Err(DecodeError::Malformed(format!(
            "{} bytes is too short for a frame",
            frame.len()
        )));
    }

    let body = &frame[..frame.len() - CHECKSUM_LEN];
    if !body.is_ascii() {
        return Err(DecodeError::Malformed("frame contains non-ASCII bytes".to_string()));
    }
    let text = std::str::from_utf8(body).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let mut pieces = text.split(',');
    let header = pieces.next().unwrap_or_default();
    let mut chars = header.chars();
    let address = chars
        .next()
        .ok_or_else(|| DecodeError::Malformed("empty header".to_string()))?;
    let header = Header {
        address,
        code: chars.as_str().to_string(),
    };

    let tokens = pieces
        .filter_map(|piece| piece.split_once('='))
        .map(|(label, value)| Token {
            label: label.to_string(),
            value: value.to_string(),
        })
        .collect();

    Ok(Frame { header, tokens })
}

/// Append checksum and terminator to a frame body
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut line = Vec::with_capacity(payload.len() + CHECKSUM_LEN + TERMINATOR.len());
    line.extend_from_slice(payload);
    line.extend_from_slice(&checksum::compute(payload));
    line.extend_from_slice(TERMINATOR);
    line
}
