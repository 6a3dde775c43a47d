//! Error types for the bluegatt library
//!
//! This module defines the single error enum used throughout the library.

use thiserror::Error;

/// Errors that can occur while running the peripheral
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to open management socket: {0}")]
    Socket(std::io::Error),

    #[error("Failed to bind management socket: {0}")]
    Bind(std::io::Error),

    #[error("Management socket I/O failure: {0}")]
    Io(std::io::Error),

    #[error("Management socket is closed")]
    Closed,

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Command 0x{opcode:04x} on controller {index} timed out")]
    Timeout { opcode: u16, index: u16 },

    #[error("Command 0x{opcode:04x} failed with status 0x{status:02x}")]
    CommandFailed { opcode: u16, status: u8 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No such member: {path} {interface}.{method}")]
    NotFound {
        path: String,
        interface: String,
        method: String,
    },

    #[error("Data store has no value for '{0}'")]
    DataStoreMiss(String),
}

pub type Result<T> = std::result::Result<T, Error>;
