//! Structural decoding errors
//!
//! These indicate a protocol or firmware mismatch. Checksum failures and
//! unrecognized message codes are not errors and never show up here.

use thiserror::Error;

/// Decoding error for a frame that passed checksum verification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame could not be split into a header and fields
    #[error("Malformed frame: {0}")]
    Malformed(String),

    /// A recognized message type lacks one of its required fields
    #[error("{message} message is missing field {label}")]
    MissingField {
        /// Message type name
        message: &'static str,
        /// Missing label
        label: &'static str,
    },

    /// Unit character not valid for the field it modifies
    #[error("Cannot parse unit character '{unit}' of field {label}")]
    UnknownUnit {
        /// Field label
        label: String,
        /// Offending unit character
        unit: char,
    },

    /// Numeric part of a field value is not a number
    #[error("Could not convert {label}: '{raw}' to float")]
    InvalidMagnitude {
        /// Field label
        label: String,
        /// Raw value text without the unit character
        raw: String,
    },

    /// Field value is empty, so there is no unit character
    #[error("Field {label} has an empty value")]
    MissingUnit {
        /// Field label
        label: String,
    },
}
