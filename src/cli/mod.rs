//! CLI Module
//!
//! Provides command-line interface support:
//! - Exit codes for automation
//! - Mapping of engine errors onto exit codes

pub mod exit_codes;

pub use exit_codes::{exit_code_description, print_exit_codes, CliResult, ExitCodes};
