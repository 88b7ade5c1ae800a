//! Error types for the non-real-time parts of mclksync.
//!
//! Nothing in the per-cycle path returns these: real-time failures (full
//! buffers, contended locks) drop the affected event instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MIDI backend error: {0}")]
    MidiInit(String),

    #[error("MIDI device '{0}' not found")]
    DeviceNotFound(String),

    #[error("MIDI connection error: {0}")]
    Connection(String),

    #[error("MIDI send error: {0}")]
    Send(String),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Logger initialization failed: {0}")]
    Logger(String),
}

impl From<midir::InitError> for Error {
    fn from(e: midir::InitError) -> Self {
        Error::MidiInit(e.to_string())
    }
}

impl From<midir::PortInfoError> for Error {
    fn from(e: midir::PortInfoError) -> Self {
        Error::MidiInit(e.to_string())
    }
}

impl From<midir::ConnectError<midir::MidiOutput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiOutput>) -> Self {
        Error::Connection(e.to_string())
    }
}

impl From<midir::ConnectError<midir::MidiInput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiInput>) -> Self {
        Error::Connection(e.to_string())
    }
}

impl From<midir::SendError> for Error {
    fn from(e: midir::SendError) -> Self {
        Error::Send(e.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
