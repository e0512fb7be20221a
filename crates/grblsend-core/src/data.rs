//! Session and transfer data types

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state of a controller session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No usable link; only `connect` is permitted
    #[default]
    Disconnected,
    /// Handshake completed; commands and queries are permitted
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Outcome of one streaming run
#[derive(Debug)]
pub struct TransferResult {
    /// Commands acknowledged with `ok`
    pub lines_sent: usize,
    /// True when every command was acknowledged
    pub succeeded: bool,
    /// 1-based position in the input of the line that failed
    pub failure_line: Option<usize>,
    /// Normalized text of the command that failed
    pub failure_command: Option<String>,
    /// Why the transfer stopped
    pub error: Option<Error>,
}

impl TransferResult {
    /// A transfer that acknowledged every command
    pub fn completed(lines_sent: usize) -> Self {
        Self {
            lines_sent,
            succeeded: true,
            failure_line: None,
            failure_command: None,
            error: None,
        }
    }

    /// A transfer that stopped on `error`
    pub fn failed(
        lines_sent: usize,
        failure_line: Option<usize>,
        failure_command: Option<String>,
        error: Error,
    ) -> Self {
        Self {
            lines_sent,
            succeeded: false,
            failure_line,
            failure_command,
            error: Some(error),
        }
    }
}

impl fmt::Display for TransferResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.succeeded {
            return write!(f, "transfer complete, {} lines sent", self.lines_sent);
        }
        write!(f, "transfer failed after {} lines", self.lines_sent)?;
        if let Some(line) = self.failure_line {
            write!(f, " at line {}", line)?;
        }
        if let Some(cmd) = &self.failure_command {
            write!(f, " '{}'", cmd)?;
        }
        if let Some(err) = &self.error {
            write!(f, ": {}", err)?;
        }
        Ok(())
    }
}
