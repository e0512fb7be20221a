//! Error handling for grblsend
//!
//! Provides the error taxonomy shared by every layer of the sender:
//! - Connection errors (port cannot be opened, handshake failed)
//! - Transmission errors (a write to an open port failed)
//! - Controller errors (firmware rejections, acknowledgment timeouts)
//! - Program errors (input G-code file problems)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Represents failures to establish or keep the serial link to the controller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectionError {
    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// An operation that needs a live session was attempted without one
    #[error("Controller not connected")]
    NotConnected,

    /// The controller did not answer the build-info query in time
    #[error("Handshake timed out after {timeout_ms}ms")]
    HandshakeTimeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The controller answered, but not with the expected firmware signature
    #[error("Firmware signature '{expected}' not found in handshake response: {received}")]
    SignatureMismatch {
        /// The signature substring that was expected.
        expected: String,
        /// The lines received during the handshake.
        received: String,
    },

    /// Connection lost
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// The reason the connection was lost.
        reason: String,
    },

    /// Serial devices could not be enumerated
    #[error("Failed to enumerate ports: {reason}")]
    Enumeration {
        /// The reason enumeration failed.
        reason: String,
    },
}

/// Transmission error type
///
/// A write to an already open port failed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Failed to transmit '{command}': {reason}")]
pub struct TransmissionError {
    /// The command (or realtime byte) being written.
    pub command: String,
    /// The reason the write failed.
    pub reason: String,
}

impl TransmissionError {
    /// Create a new transmission error
    pub fn new(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            reason: reason.into(),
        }
    }
}

/// Controller error type
///
/// Represents failures reported by, or waiting on, the controller firmware.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    /// The firmware answered `error:<payload>`
    #[error("Controller rejected command: error:{payload}{}", description_suffix(.description))]
    Rejected {
        /// The text after `error:`.
        payload: String,
        /// Decoded description when the payload is a known numeric code.
        description: Option<String>,
    },

    /// No acknowledgment arrived within the allotted window
    #[error("Controller operation timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// A command was issued while the previous one is still unacknowledged
    #[error("Command '{pending}' is still awaiting acknowledgment")]
    CommandInFlight {
        /// The command that has not been acknowledged yet.
        pending: String,
    },

    /// A blocking wait was aborted by the caller
    #[error("Operation interrupted")]
    Interrupted,
}

fn description_suffix(description: &Option<String>) -> String {
    match description {
        Some(d) => format!(" ({})", d),
        None => String::new(),
    }
}

/// Program error type
///
/// Problems with the G-code input before any line is streamed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProgramError {
    /// Input file is missing
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that does not exist.
        path: String,
    },

    /// Input file exists but could not be read
    #[error("Failed to read {path}: {reason}")]
    Read {
        /// The path that failed to read.
        path: String,
        /// The reason reading failed.
        reason: String,
    },
}

/// Main error type for grblsend
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Transmission error
    #[error(transparent)]
    Transmission(#[from] TransmissionError),

    /// Controller error
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Program error
    #[error(transparent)]
    Program(#[from] ProgramError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Controller(ControllerError::Timeout { .. })
                | Error::Connection(ConnectionError::HandshakeTimeout { .. })
        )
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is a controller error
    pub fn is_controller_error(&self) -> bool {
        matches!(self, Error::Controller(_))
    }

    /// Check if this error came from an aborted wait
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Controller(ControllerError::Interrupted))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
